//! Topology descriptors.
//!
//! Every value here is built once per synthesis run and never mutated after
//! it is attached to its parent. The stack crate turns them into template
//! resources.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::arn::Arn;
use crate::config::DnsZoneRef;

// ── Network ────────────────────────────────────────────────────────

/// Resolved network placement. `subnet_ids[i]` lives in `zones[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkContext {
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
    pub zones: Vec<String>,
}

impl NetworkContext {
    /// Iterate `(zone, subnet_id)` pairs in resolution order.
    pub fn placements(&self) -> impl Iterator<Item = (&str, &str)> {
        self.zones
            .iter()
            .map(String::as_str)
            .zip(self.subnet_ids.iter().map(String::as_str))
    }
}

// ── Identity ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// One IAM policy statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

/// Role assumed by the container platform to pull images and ship logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionIdentity {
    pub name: String,
    /// Service principal allowed to assume the role.
    pub trusted_principal: String,
    pub statements: Vec<PolicyStatement>,
}

impl ExecutionIdentity {
    /// `(resource, action)` pairs granted with `Allow`.
    pub fn permissions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.statements
            .iter()
            .filter(|s| s.effect == Effect::Allow)
            .flat_map(|s| {
                s.resources.iter().flat_map(move |r| {
                    s.actions.iter().map(move |a| (r.as_str(), a.as_str()))
                })
            })
    }

    pub fn allows(&self, action: &str) -> bool {
        self.permissions().any(|(_, a)| a == action)
    }
}

// ── Containers ─────────────────────────────────────────────────────

/// Container state another container waits for before starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyCondition {
    Start,
    Complete,
    Success,
    Healthy,
}

impl DependencyCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyCondition::Start => "START",
            DependencyCondition::Complete => "COMPLETE",
            DependencyCondition::Success => "SUCCESS",
            DependencyCondition::Healthy => "HEALTHY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDependency {
    pub container: String,
    pub condition: DependencyCondition,
}

/// Image in a registry repository owned outside this stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    Tcp,
    Udp,
}

impl PortProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortProtocol::Tcp => "tcp",
            PortProtocol::Udp => "udp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub protocol: PortProtocol,
}

impl PortMapping {
    pub fn tcp(container_port: u16) -> Self {
        PortMapping {
            container_port,
            protocol: PortProtocol::Tcp,
        }
    }
}

/// Log group a container's output is shipped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDestination {
    pub log_group_name: String,
    pub stream_prefix: String,
    pub retention_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: ImageRef,
    /// Termination of an essential container stops the whole task.
    pub essential: bool,
    pub port_mappings: Vec<PortMapping>,
    pub log: LogDestination,
    pub depends_on: Vec<ContainerDependency>,
    pub environment: IndexMap<String, String>,
}

impl ContainerSpec {
    pub fn ports(&self) -> Vec<u16> {
        self.port_mappings.iter().map(|p| p.container_port).collect()
    }
}

// ── Task ───────────────────────────────────────────────────────────

/// Task specification: co-located containers plus shared resource limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub family: String,
    /// CPU units (1024 = one vCPU).
    pub cpu: u32,
    pub memory_mib: u32,
    /// Name of the execution identity; the identity itself is shared.
    pub execution_role: String,
    pub containers: Vec<ContainerSpec>,
}

impl TaskTemplate {
    pub fn container(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.name == name)
    }
}

// ── Service ────────────────────────────────────────────────────────

/// Inclusive range of HTTP status codes counted as healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpCodeRange {
    pub start: u16,
    pub end: u16,
}

impl std::fmt::Display for HttpCodeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckPolicy {
    pub path: String,
    pub port: u16,
    pub healthy_http_codes: HttpCodeRange,
    /// Consecutive failures before a target is taken out of rotation.
    pub unhealthy_threshold: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListenerProtocol {
    Http,
    Https,
}

impl ListenerProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerProtocol::Http => "HTTP",
            ListenerProtocol::Https => "HTTPS",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            ListenerProtocol::Http => 80,
            ListenerProtocol::Https => 443,
        }
    }
}

/// Where the HTTPS listener gets its certificate from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateSource {
    /// An existing certificate, by ARN.
    Existing(String),
    /// A certificate for `domain_name`, DNS-validated in the hosted zone.
    DnsValidated { domain_name: String, zone: DnsZoneRef },
    /// Supplied by the operator as a template parameter at deploy time.
    Parameter,
}

/// Public DNS name pointing at the load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainBinding {
    pub domain_name: String,
    pub zone: DnsZoneRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposurePolicy {
    pub protocol: ListenerProtocol,
    /// Answer plain HTTP with a redirect to HTTPS.
    pub redirect_http: bool,
    /// Tasks get public addresses; the network has no outbound NAT.
    pub assign_public_ip: bool,
    pub certificate: Option<CertificateSource>,
    pub domain: Option<DomainBinding>,
}

/// Replica bounds and target utilizations. The platform scales to the
/// larger of the two triggers' desired counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub target_cpu_percent: u32,
    pub target_memory_percent: u32,
}

/// Pre-existing bucket receiving load balancer access logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogSink {
    pub bucket_arn: Arn,
    pub bucket_name: String,
}

/// A load-balanced service wrapping one task template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDeclaration {
    pub name: String,
    pub cluster_name: String,
    pub task: TaskTemplate,
    /// Container registered behind the load balancer.
    pub target_container: String,
    pub desired_count: u32,
    pub health_check_grace_secs: u32,
    pub health: HealthCheckPolicy,
    pub exposure: ExposurePolicy,
    pub network: NetworkContext,
    pub scaling: Option<ScalingPolicy>,
    pub access_logs: Option<AccessLogSink>,
}

impl ServiceDeclaration {
    /// Attach an autoscaling policy.
    pub fn with_scaling(mut self, policy: ScalingPolicy) -> Self {
        self.scaling = Some(policy);
        self
    }

    /// Attach an access log destination.
    pub fn with_access_logs(mut self, sink: AccessLogSink) -> Self {
        self.access_logs = Some(sink);
        self
    }

    /// The container the load balancer forwards to.
    pub fn target(&self) -> Option<&ContainerSpec> {
        self.task.container(&self.target_container)
    }
}
