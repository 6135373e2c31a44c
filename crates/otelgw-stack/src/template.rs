//! CloudFormation template model.
//!
//! Only the resource types and properties this stack declares are modelled.
//! Keys serialize in declaration order so the emitted JSON is stable across
//! runs.

use indexmap::IndexMap;
use serde::Serialize;

pub const FORMAT_VERSION: &str = "2010-09-09";

/// A property value: a literal or an intrinsic function.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Expr {
    Literal(String),
    Ref {
        #[serde(rename = "Ref")]
        target: String,
    },
    GetAtt {
        #[serde(rename = "Fn::GetAtt")]
        target: (String, String),
    },
    Sub {
        #[serde(rename = "Fn::Sub")]
        template: String,
    },
}

impl Expr {
    pub fn lit(value: impl Into<String>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Expr::Ref {
            target: logical_id.into(),
        }
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Expr::GetAtt {
            target: (logical_id.into(), attribute.into()),
        }
    }

    pub fn sub(template: impl Into<String>) -> Self {
        Expr::Sub {
            template: template.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    pub description: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, Parameter>,
    pub resources: IndexMap<String, Resource>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, Output>,
}

impl Template {
    pub fn new(description: impl Into<String>) -> Self {
        Template {
            format_version: FORMAT_VERSION.to_string(),
            description: description.into(),
            parameters: IndexMap::new(),
            resources: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Logical ids of all resources of one CloudFormation type.
    pub fn resources_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a str> {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == type_name)
            .map(|(id, _)| id.as_str())
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub param_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub description: String,
    pub value: Expr,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: &'static str,
    #[serde(rename = "Properties")]
    pub properties: Properties,
    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new(properties: Properties) -> Self {
        Resource {
            resource_type: properties.type_name(),
            properties,
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on(mut self, logical_ids: &[&str]) -> Self {
        self.depends_on = logical_ids.iter().map(|id| id.to_string()).collect();
        self
    }
}

/// Typed properties, one variant per resource type.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Properties {
    Cluster(EcsCluster),
    Role(IamRole),
    Policy(IamPolicy),
    LogGroup(LogGroup),
    TaskDefinition(TaskDefinition),
    SecurityGroup(SecurityGroup),
    LoadBalancer(LoadBalancer),
    TargetGroup(TargetGroup),
    Listener(Listener),
    Certificate(Certificate),
    Service(EcsService),
    ScalableTarget(ScalableTarget),
    ScalingPolicy(ScalingPolicy),
    RecordSet(RecordSet),
}

impl Properties {
    pub fn type_name(&self) -> &'static str {
        match self {
            Properties::Cluster(_) => "AWS::ECS::Cluster",
            Properties::Role(_) => "AWS::IAM::Role",
            Properties::Policy(_) => "AWS::IAM::Policy",
            Properties::LogGroup(_) => "AWS::Logs::LogGroup",
            Properties::TaskDefinition(_) => "AWS::ECS::TaskDefinition",
            Properties::SecurityGroup(_) => "AWS::EC2::SecurityGroup",
            Properties::LoadBalancer(_) => "AWS::ElasticLoadBalancingV2::LoadBalancer",
            Properties::TargetGroup(_) => "AWS::ElasticLoadBalancingV2::TargetGroup",
            Properties::Listener(_) => "AWS::ElasticLoadBalancingV2::Listener",
            Properties::Certificate(_) => "AWS::CertificateManager::Certificate",
            Properties::Service(_) => "AWS::ECS::Service",
            Properties::ScalableTarget(_) => "AWS::ApplicationAutoScaling::ScalableTarget",
            Properties::ScalingPolicy(_) => "AWS::ApplicationAutoScaling::ScalingPolicy",
            Properties::RecordSet(_) => "AWS::Route53::RecordSet",
        }
    }
}

// ── IAM ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Principal {
    pub service: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IamRole {
    pub role_name: String,
    pub assume_role_policy_document: PolicyDocument,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IamPolicy {
    pub policy_name: String,
    pub policy_document: PolicyDocument,
    pub roles: Vec<Expr>,
}

// ── ECS ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EcsCluster {
    pub cluster_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogGroup {
    pub log_group_name: String,
    pub retention_in_days: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskDefinition {
    pub family: String,
    /// CloudFormation takes task sizes as strings.
    pub cpu: String,
    pub memory: String,
    pub network_mode: String,
    pub requires_compatibilities: Vec<String>,
    pub execution_role_arn: Expr,
    pub container_definitions: Vec<ContainerDefinition>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerDefinition {
    pub name: String,
    pub image: Expr,
    pub essential: bool,
    pub port_mappings: Vec<ContainerPortMapping>,
    pub log_configuration: LogConfiguration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ContainerDependsOn>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<KeyValuePair>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerPortMapping {
    pub container_port: u16,
    pub protocol: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogConfiguration {
    pub log_driver: String,
    pub options: IndexMap<String, Expr>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerDependsOn {
    pub container_name: String,
    pub condition: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyValuePair {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EcsService {
    pub service_name: String,
    pub cluster: Expr,
    pub launch_type: String,
    pub task_definition: Expr,
    pub desired_count: u32,
    pub health_check_grace_period_seconds: u32,
    pub network_configuration: NetworkConfiguration,
    pub load_balancers: Vec<ServiceLoadBalancer>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkConfiguration {
    pub awsvpc_configuration: AwsvpcConfiguration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AwsvpcConfiguration {
    pub assign_public_ip: String,
    pub subnets: Vec<String>,
    pub security_groups: Vec<Expr>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceLoadBalancer {
    pub container_name: String,
    pub container_port: u16,
    pub target_group_arn: Expr,
}

// ── EC2 / ELB ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroup {
    pub group_description: String,
    pub vpc_id: String,
    pub security_group_ingress: Vec<IngressRule>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IngressRule {
    pub ip_protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_security_group_id: Option<Expr>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadBalancer {
    #[serde(rename = "Type")]
    pub lb_type: String,
    pub scheme: String,
    pub subnets: Vec<String>,
    pub security_groups: Vec<Expr>,
    pub load_balancer_attributes: Vec<KeyValueAttribute>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyValueAttribute {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetGroup {
    pub port: u16,
    pub protocol: String,
    pub target_type: String,
    pub vpc_id: String,
    pub health_check_path: String,
    pub health_check_port: String,
    pub matcher: Matcher,
    pub unhealthy_threshold_count: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Matcher {
    pub http_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Listener {
    pub load_balancer_arn: Expr,
    pub port: u16,
    pub protocol: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<ListenerCertificate>,
    pub default_actions: Vec<ListenerAction>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListenerCertificate {
    pub certificate_arn: Expr,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListenerAction {
    #[serde(rename = "Type")]
    pub action_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_group_arn: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_config: Option<RedirectConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RedirectConfig {
    pub protocol: String,
    pub port: String,
    pub status_code: String,
}

// ── ACM / Route 53 ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Certificate {
    pub domain_name: String,
    pub validation_method: String,
    pub domain_validation_options: Vec<DomainValidationOption>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DomainValidationOption {
    pub domain_name: String,
    pub hosted_zone_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordSet {
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    pub hosted_zone_id: String,
    pub alias_target: AliasTarget,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AliasTarget {
    #[serde(rename = "DNSName")]
    pub dns_name: Expr,
    pub hosted_zone_id: Expr,
}

// ── Application Auto Scaling ───────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScalableTarget {
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub resource_id: Expr,
    #[serde(rename = "RoleARN")]
    pub role_arn: Expr,
    pub scalable_dimension: String,
    pub service_namespace: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScalingPolicy {
    pub policy_name: String,
    pub policy_type: String,
    pub scaling_target_id: Expr,
    pub target_tracking_scaling_policy_configuration: TargetTrackingConfiguration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetTrackingConfiguration {
    pub predefined_metric_specification: PredefinedMetricSpecification,
    pub target_value: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PredefinedMetricSpecification {
    pub predefined_metric_type: String,
}
