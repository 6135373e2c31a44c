//! Amazon Resource Name parsing for externally owned resources.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// A parsed ARN: `arn:<partition>:<service>:<region>:<account>:<resource>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    /// Empty for global services such as S3 and IAM.
    pub region: String,
    /// Empty for S3 buckets.
    pub account: String,
    pub resource: String,
}

impl Arn {
    pub fn parse(arn: &str) -> ConfigResult<Self> {
        let mut parts = arn.splitn(6, ':');
        if parts.next() != Some("arn") {
            return Err(ConfigError::InvalidArn(arn.to_string()));
        }
        let (Some(partition), Some(service), Some(region), Some(account), Some(resource)) =
            (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ConfigError::InvalidArn(arn.to_string()));
        };
        if partition.is_empty() || service.is_empty() || resource.is_empty() {
            return Err(ConfigError::InvalidArn(arn.to_string()));
        }
        Ok(Arn {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account: account.to_string(),
            resource: resource.to_string(),
        })
    }

    /// Parse and require a specific service namespace.
    pub fn parse_for(arn: &str, service: &str) -> ConfigResult<Self> {
        let parsed = Self::parse(arn)?;
        if parsed.service != service {
            return Err(ConfigError::InvalidArn(format!(
                "{arn} (expected an `{service}` ARN, got `{}`)",
                parsed.service
            )));
        }
        Ok(parsed)
    }

    /// Bucket name of an S3 bucket ARN. Object ARNs (`bucket/key`) and
    /// non-S3 ARNs are rejected.
    pub fn s3_bucket_name(&self) -> ConfigResult<&str> {
        if self.service != "s3" || self.resource.contains('/') {
            return Err(ConfigError::InvalidArn(format!(
                "{self} is not an S3 bucket ARN"
            )));
        }
        Ok(&self.resource)
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account, self.resource
        )
    }
}
