//! Cluster context parser.
//!
//! The context file carries a `cluster-data` table (network identifiers and
//! the zone to subnet mapping) and an optional `stack` table overriding the
//! fixed resource names. TOML and JSON are both accepted; JSON files may use
//! the `cdk.json` shape where `cluster-data` sits under a `context` object.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::arn::Arn;
use crate::error::{ConfigError, ConfigResult};

/// Key of the cluster table inside a context file.
pub const CLUSTER_DATA_KEY: &str = "cluster-data";

/// A fully parsed and validated context file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFile {
    #[serde(rename = "cluster-data")]
    pub cluster_data: ClusterData,
    #[serde(default)]
    pub stack: StackSettings,
}

/// Typed `cluster-data` context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterData {
    pub vpc_id: String,
    /// Availability zone to subnet id, in file order.
    pub subnets: IndexMap<String, String>,
    /// Public domain name served by the load balancer. Requires `hosted_zone`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_zone: Option<DnsZoneRef>,
    /// Existing ACM certificate for the HTTPS listener.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_arn: Option<String>,
    /// Extra environment variables for the collector container.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub collector_environment: IndexMap<String, String>,
}

/// Reference to an externally managed Route 53 hosted zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsZoneRef {
    pub id: String,
    pub name: String,
}

/// Names of the resources this stack declares or references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSettings {
    pub stack_name: String,
    pub cluster_name: String,
    pub service_name: String,
    pub execution_role_name: String,
    /// Image repository holding the collector images.
    pub collector_repository: String,
    /// Image repository holding the configured nginx images.
    pub proxy_repository: String,
    pub image_tag: String,
    pub access_log_bucket_arn: String,
}

impl Default for StackSettings {
    fn default() -> Self {
        StackSettings {
            stack_name: "NginxOtelEcsStack".to_string(),
            cluster_name: "otel-gateway".to_string(),
            service_name: "otel-gateway-service".to_string(),
            execution_role_name: "otelgateway-execution-role".to_string(),
            collector_repository: "your-repository-name-with-collector-images".to_string(),
            proxy_repository: "your-repository-name-with-nginx-images".to_string(),
            image_tag: "latest".to_string(),
            access_log_bucket_arn: "arn:aws:s3:::beacon-otel-gateway-alb-logs".to_string(),
        }
    }
}

// ── Raw (unvalidated) shapes ────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawContext {
    #[serde(rename = "cluster-data")]
    cluster_data: Option<RawClusterData>,
    /// `cdk.json` nesting.
    context: Option<RawCdkContext>,
    #[serde(default)]
    stack: StackSettings,
}

#[derive(Debug, Deserialize)]
struct RawCdkContext {
    #[serde(rename = "cluster-data")]
    cluster_data: Option<RawClusterData>,
}

#[derive(Debug, Deserialize)]
struct RawClusterData {
    vpc_id: Option<String>,
    subnets: Option<IndexMap<String, String>>,
    #[serde(default, alias = "domain-name")]
    domain_name: Option<String>,
    #[serde(default)]
    hosted_zone: Option<DnsZoneRef>,
    #[serde(default)]
    certificate_arn: Option<String>,
    #[serde(default)]
    collector_environment: IndexMap<String, String>,
}

impl ContextFile {
    /// Load a context file, picking the parser from the file extension.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_err = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };
        let raw: RawContext = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?
            }
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ));
            }
        };
        Self::from_raw(raw)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let raw: RawContext = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })?;
        Self::from_raw(raw)
    }

    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let raw: RawContext = serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawContext) -> ConfigResult<Self> {
        let cluster = raw
            .cluster_data
            .or_else(|| raw.context.and_then(|c| c.cluster_data))
            .ok_or_else(|| ConfigError::MissingKey(CLUSTER_DATA_KEY.to_string()))?;
        let cluster_data = ClusterData::from_raw(cluster)?;
        Ok(ContextFile {
            cluster_data,
            stack: raw.stack,
        })
    }
}

impl ClusterData {
    /// Minimal context: a VPC and its zone to subnet mapping.
    pub fn new(vpc_id: impl Into<String>, subnets: IndexMap<String, String>) -> Self {
        ClusterData {
            vpc_id: vpc_id.into(),
            subnets,
            domain_name: None,
            hosted_zone: None,
            certificate_arn: None,
            collector_environment: IndexMap::new(),
        }
    }

    fn from_raw(raw: RawClusterData) -> ConfigResult<Self> {
        let vpc_id = raw
            .vpc_id
            .ok_or_else(|| ConfigError::MissingKey(format!("{CLUSTER_DATA_KEY}.vpc_id")))?;
        let subnets = raw
            .subnets
            .ok_or_else(|| ConfigError::MissingKey(format!("{CLUSTER_DATA_KEY}.subnets")))?;
        let data = ClusterData {
            vpc_id,
            subnets,
            domain_name: raw.domain_name,
            hosted_zone: raw.hosted_zone,
            certificate_arn: raw.certificate_arn,
            collector_environment: raw.collector_environment,
        };
        data.validate()?;
        Ok(data)
    }

    /// Check identifier shapes and field pairings. An empty subnet mapping is
    /// left to the network resolver.
    pub fn validate(&self) -> ConfigResult<()> {
        check_resource_id("cluster-data.vpc_id", &self.vpc_id, "vpc-")?;
        for (zone, subnet) in &self.subnets {
            if zone.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "cluster-data.subnets",
                    "availability zone name is empty",
                ));
            }
            check_resource_id(&format!("cluster-data.subnets.{zone}"), subnet, "subnet-")?;
        }

        match (&self.domain_name, &self.hosted_zone) {
            (Some(_), None) => {
                return Err(ConfigError::invalid(
                    "cluster-data.domain_name",
                    "a domain name needs `hosted_zone` to be set",
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::invalid(
                    "cluster-data.hosted_zone",
                    "a hosted zone needs `domain_name` to be set",
                ));
            }
            (Some(domain), Some(zone)) => {
                let domain = domain.trim_end_matches('.');
                let zone_name = zone.name.trim_end_matches('.');
                if domain.trim().is_empty() {
                    return Err(ConfigError::invalid("cluster-data.domain_name", "empty"));
                }
                if zone_name.trim().is_empty() {
                    return Err(ConfigError::invalid("cluster-data.hosted_zone.name", "empty"));
                }
                if zone.id.is_empty() {
                    return Err(ConfigError::invalid("cluster-data.hosted_zone.id", "empty"));
                }
                if domain != zone_name && !domain.ends_with(&format!(".{zone_name}")) {
                    return Err(ConfigError::invalid(
                        "cluster-data.domain_name",
                        format!("`{domain}` is not inside hosted zone `{zone_name}`"),
                    ));
                }
            }
            (None, None) => {}
        }

        if let Some(arn) = &self.certificate_arn {
            Arn::parse_for(arn, "acm")?;
        }

        Ok(())
    }
}

/// Validate a `<prefix><alphanumeric>` resource identifier.
fn check_resource_id(field: &str, value: &str, prefix: &str) -> ConfigResult<()> {
    let rest = value.strip_prefix(prefix).ok_or_else(|| {
        ConfigError::invalid(field, format!("`{value}` does not start with `{prefix}`"))
    })?;
    if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ConfigError::invalid(
            field,
            format!("`{value}` is not a valid identifier"),
        ));
    }
    Ok(())
}
