//! Descriptor to CloudFormation rendering.

use indexmap::IndexMap;
use otelgw_core::{
    CertificateSource, ContainerSpec, Effect, ExecutionIdentity, ListenerProtocol,
    ServiceDeclaration, StackSettings,
};

use crate::error::{SynthError, SynthResult};
use crate::template::{
    AliasTarget, AwsvpcConfiguration, Certificate, ContainerDefinition, ContainerDependsOn,
    ContainerPortMapping, DomainValidationOption, EcsCluster, EcsService, Expr, IamPolicy,
    IamRole, IngressRule, KeyValueAttribute, KeyValuePair, Listener, ListenerAction,
    ListenerCertificate, LoadBalancer, LogConfiguration, LogGroup, Matcher, NetworkConfiguration,
    Output, Parameter, PolicyDocument, PredefinedMetricSpecification, Principal, Properties,
    RecordSet, RedirectConfig, Resource, ScalableTarget, ScalingPolicy, SecurityGroup,
    ServiceLoadBalancer, Statement, TargetGroup, TargetTrackingConfiguration, TaskDefinition,
    Template,
};
use crate::Topology;

/// Logical ids of the emitted resources.
pub mod ids {
    pub const CLUSTER: &str = "OtelGatewayCluster";
    pub const EXECUTION_ROLE: &str = "ExecutionRole";
    pub const EXECUTION_ROLE_POLICY: &str = "ExecutionRoleDefaultPolicy";
    pub const TASK_DEFINITION: &str = "TaskDefinition";
    pub const LB_SECURITY_GROUP: &str = "LoadBalancerSecurityGroup";
    pub const SERVICE_SECURITY_GROUP: &str = "ServiceSecurityGroup";
    pub const LOAD_BALANCER: &str = "LoadBalancer";
    pub const TARGET_GROUP: &str = "TargetGroup";
    pub const LISTENER: &str = "PublicListener";
    pub const REDIRECT_LISTENER: &str = "PublicRedirectListener";
    pub const CERTIFICATE: &str = "Certificate";
    pub const SERVICE: &str = "Service";
    pub const SCALABLE_TARGET: &str = "ServiceTaskCountTarget";
    pub const CPU_SCALING: &str = "CpuScaling";
    pub const MEMORY_SCALING: &str = "MemoryScaling";
    pub const DNS_RECORD: &str = "DnsRecord";

    pub const CERTIFICATE_PARAMETER: &str = "CertificateArn";

    pub const OUTPUT_LOAD_BALANCER_DNS: &str = "LoadBalancerDns";
    pub const OUTPUT_SERVICE_URL: &str = "ServiceUrl";

    /// Log group id for a container, e.g. `proxy` -> `ProxyLogGroup`.
    pub fn log_group(container: &str) -> String {
        let mut id = String::new();
        for part in container.split(|c: char| !c.is_ascii_alphanumeric()) {
            let mut chars = part.chars();
            if let Some(first) = chars.next() {
                id.push(first.to_ascii_uppercase());
                id.push_str(chars.as_str());
            }
        }
        id.push_str("LogGroup");
        id
    }
}

const IAM_POLICY_VERSION: &str = "2012-10-17";
const AUTOSCALING_ROLE: &str = "arn:${AWS::Partition}:iam::${AWS::AccountId}:role/aws-service-role/ecs.application-autoscaling.amazonaws.com/AWSServiceRoleForApplicationAutoScaling_ECSService";

/// Render a validated topology into a template.
pub fn render(settings: &StackSettings, topology: &Topology) -> SynthResult<Template> {
    let service = &topology.service;
    let mut template = Template::new(format!(
        "{}: nginx reverse proxy with an OpenTelemetry collector sidecar on Fargate",
        settings.stack_name
    ));

    template.resources.insert(
        ids::CLUSTER.to_string(),
        Resource::new(Properties::Cluster(EcsCluster {
            cluster_name: service.cluster_name.clone(),
        })),
    );

    render_identity(&mut template, &topology.identity);
    render_task(&mut template, service);
    render_load_balancer(&mut template, service)?;
    render_service(&mut template, service)?;
    render_scaling(&mut template, service);
    render_dns(&mut template, service);

    Ok(template)
}

fn render_identity(template: &mut Template, identity: &ExecutionIdentity) {
    template.resources.insert(
        ids::EXECUTION_ROLE.to_string(),
        Resource::new(Properties::Role(IamRole {
            role_name: identity.name.clone(),
            assume_role_policy_document: PolicyDocument {
                version: IAM_POLICY_VERSION.to_string(),
                statement: vec![Statement {
                    effect: "Allow".to_string(),
                    principal: Some(Principal {
                        service: identity.trusted_principal.clone(),
                    }),
                    action: vec!["sts:AssumeRole".to_string()],
                    resource: Vec::new(),
                }],
            },
        })),
    );

    let statement = identity
        .statements
        .iter()
        .map(|s| Statement {
            effect: match s.effect {
                Effect::Allow => "Allow".to_string(),
                Effect::Deny => "Deny".to_string(),
            },
            principal: None,
            action: s.actions.clone(),
            resource: s.resources.clone(),
        })
        .collect();

    template.resources.insert(
        ids::EXECUTION_ROLE_POLICY.to_string(),
        Resource::new(Properties::Policy(IamPolicy {
            policy_name: ids::EXECUTION_ROLE_POLICY.to_string(),
            policy_document: PolicyDocument {
                version: IAM_POLICY_VERSION.to_string(),
                statement,
            },
            roles: vec![Expr::reference(ids::EXECUTION_ROLE)],
        })),
    );
}

fn render_task(template: &mut Template, service: &ServiceDeclaration) {
    let task = &service.task;

    for container in &task.containers {
        template.resources.insert(
            ids::log_group(&container.name),
            Resource::new(Properties::LogGroup(LogGroup {
                log_group_name: container.log.log_group_name.clone(),
                retention_in_days: container.log.retention_days,
            })),
        );
    }

    let container_definitions = task.containers.iter().map(container_definition).collect();

    template.resources.insert(
        ids::TASK_DEFINITION.to_string(),
        Resource::new(Properties::TaskDefinition(TaskDefinition {
            family: task.family.clone(),
            cpu: task.cpu.to_string(),
            memory: task.memory_mib.to_string(),
            network_mode: "awsvpc".to_string(),
            requires_compatibilities: vec!["FARGATE".to_string()],
            execution_role_arn: Expr::get_att(ids::EXECUTION_ROLE, "Arn"),
            container_definitions,
        }))
        // The role cannot pull images until its policy is attached.
        .depends_on(&[ids::EXECUTION_ROLE_POLICY]),
    );
}

fn container_definition(container: &ContainerSpec) -> ContainerDefinition {
    let mut options = IndexMap::new();
    options.insert(
        "awslogs-group".to_string(),
        Expr::reference(ids::log_group(&container.name)),
    );
    options.insert(
        "awslogs-stream-prefix".to_string(),
        Expr::lit(&container.log.stream_prefix),
    );
    options.insert("awslogs-region".to_string(), Expr::reference("AWS::Region"));

    ContainerDefinition {
        name: container.name.clone(),
        image: Expr::sub(format!(
            "${{AWS::AccountId}}.dkr.ecr.${{AWS::Region}}.${{AWS::URLSuffix}}/{}:{}",
            container.image.repository, container.image.tag
        )),
        essential: container.essential,
        port_mappings: container
            .port_mappings
            .iter()
            .map(|p| ContainerPortMapping {
                container_port: p.container_port,
                protocol: p.protocol.as_str().to_string(),
            })
            .collect(),
        log_configuration: LogConfiguration {
            log_driver: "awslogs".to_string(),
            options,
        },
        depends_on: container
            .depends_on
            .iter()
            .map(|d| ContainerDependsOn {
                container_name: d.container.clone(),
                condition: d.condition.as_str().to_string(),
            })
            .collect(),
        environment: container
            .environment
            .iter()
            .map(|(name, value)| KeyValuePair {
                name: name.clone(),
                value: value.clone(),
            })
            .collect(),
    }
}

/// Port the load balancer forwards to on the target container.
fn target_port(service: &ServiceDeclaration) -> SynthResult<u16> {
    service
        .target()
        .and_then(|c| c.port_mappings.first())
        .map(|p| p.container_port)
        .ok_or_else(|| {
            SynthError::policy(
                "service",
                format!("target container `{}` maps no port", service.target_container),
            )
        })
}

fn render_load_balancer(template: &mut Template, service: &ServiceDeclaration) -> SynthResult<()> {
    let exposure = &service.exposure;
    let network = &service.network;
    let listener_port = exposure.protocol.default_port();
    let redirect = exposure.redirect_http && exposure.protocol == ListenerProtocol::Https;

    let mut ingress = vec![IngressRule {
        ip_protocol: "tcp".to_string(),
        from_port: listener_port,
        to_port: listener_port,
        cidr_ip: Some("0.0.0.0/0".to_string()),
        source_security_group_id: None,
        description: format!("Allow from anyone on port {listener_port}"),
    }];
    if redirect {
        let http = ListenerProtocol::Http.default_port();
        ingress.push(IngressRule {
            ip_protocol: "tcp".to_string(),
            from_port: http,
            to_port: http,
            cidr_ip: Some("0.0.0.0/0".to_string()),
            source_security_group_id: None,
            description: format!("Allow from anyone on port {http}"),
        });
    }
    template.resources.insert(
        ids::LB_SECURITY_GROUP.to_string(),
        Resource::new(Properties::SecurityGroup(SecurityGroup {
            group_description: format!("{} load balancer", service.name),
            vpc_id: network.vpc_id.clone(),
            security_group_ingress: ingress,
        })),
    );

    let mut attributes = Vec::new();
    if let Some(sink) = &service.access_logs {
        attributes.push(KeyValueAttribute {
            key: "access_logs.s3.enabled".to_string(),
            value: "true".to_string(),
        });
        attributes.push(KeyValueAttribute {
            key: "access_logs.s3.bucket".to_string(),
            value: sink.bucket_name.clone(),
        });
    }
    template.resources.insert(
        ids::LOAD_BALANCER.to_string(),
        Resource::new(Properties::LoadBalancer(LoadBalancer {
            lb_type: "application".to_string(),
            scheme: "internet-facing".to_string(),
            subnets: network.subnet_ids.clone(),
            security_groups: vec![Expr::get_att(ids::LB_SECURITY_GROUP, "GroupId")],
            load_balancer_attributes: attributes,
        })),
    );

    let port = target_port(service)?;
    let health = &service.health;
    template.resources.insert(
        ids::TARGET_GROUP.to_string(),
        Resource::new(Properties::TargetGroup(TargetGroup {
            port,
            protocol: "HTTP".to_string(),
            target_type: "ip".to_string(),
            vpc_id: network.vpc_id.clone(),
            health_check_path: health.path.clone(),
            health_check_port: health.port.to_string(),
            matcher: Matcher {
                http_code: health.healthy_http_codes.to_string(),
            },
            unhealthy_threshold_count: health.unhealthy_threshold,
        })),
    );

    let certificates = match (&exposure.protocol, &exposure.certificate) {
        (ListenerProtocol::Http, _) => Vec::new(),
        (ListenerProtocol::Https, None) => {
            return Err(SynthError::policy(
                "load balancer",
                "an HTTPS listener needs a certificate",
            ));
        }
        (ListenerProtocol::Https, Some(source)) => {
            vec![ListenerCertificate {
                certificate_arn: certificate_arn(template, source),
            }]
        }
    };

    template.resources.insert(
        ids::LISTENER.to_string(),
        Resource::new(Properties::Listener(Listener {
            load_balancer_arn: Expr::reference(ids::LOAD_BALANCER),
            port: listener_port,
            protocol: exposure.protocol.as_str().to_string(),
            certificates,
            default_actions: vec![ListenerAction {
                action_type: "forward".to_string(),
                target_group_arn: Some(Expr::reference(ids::TARGET_GROUP)),
                redirect_config: None,
            }],
        })),
    );

    if redirect {
        template.resources.insert(
            ids::REDIRECT_LISTENER.to_string(),
            Resource::new(Properties::Listener(Listener {
                load_balancer_arn: Expr::reference(ids::LOAD_BALANCER),
                port: ListenerProtocol::Http.default_port(),
                protocol: ListenerProtocol::Http.as_str().to_string(),
                certificates: Vec::new(),
                default_actions: vec![ListenerAction {
                    action_type: "redirect".to_string(),
                    target_group_arn: None,
                    redirect_config: Some(RedirectConfig {
                        protocol: ListenerProtocol::Https.as_str().to_string(),
                        port: listener_port.to_string(),
                        status_code: "HTTP_301".to_string(),
                    }),
                }],
            })),
        );
    }

    template.outputs.insert(
        ids::OUTPUT_LOAD_BALANCER_DNS.to_string(),
        Output {
            description: "Load balancer DNS name".to_string(),
            value: Expr::get_att(ids::LOAD_BALANCER, "DNSName"),
        },
    );
    let scheme = exposure.protocol.as_str().to_ascii_lowercase();
    let url = match &exposure.domain {
        Some(binding) => Expr::lit(format!("{scheme}://{}", binding.domain_name)),
        None => Expr::sub(format!("{scheme}://${{{}.DNSName}}", ids::LOAD_BALANCER)),
    };
    template.outputs.insert(
        ids::OUTPUT_SERVICE_URL.to_string(),
        Output {
            description: "Public service URL".to_string(),
            value: url,
        },
    );

    Ok(())
}

/// Declare whatever the certificate source needs and return its ARN.
fn certificate_arn(template: &mut Template, source: &CertificateSource) -> Expr {
    match source {
        CertificateSource::Existing(arn) => Expr::lit(arn),
        CertificateSource::DnsValidated { domain_name, zone } => {
            template.resources.insert(
                ids::CERTIFICATE.to_string(),
                Resource::new(Properties::Certificate(Certificate {
                    domain_name: domain_name.clone(),
                    validation_method: "DNS".to_string(),
                    domain_validation_options: vec![DomainValidationOption {
                        domain_name: domain_name.clone(),
                        hosted_zone_id: zone.id.clone(),
                    }],
                })),
            );
            Expr::reference(ids::CERTIFICATE)
        }
        CertificateSource::Parameter => {
            template.parameters.insert(
                ids::CERTIFICATE_PARAMETER.to_string(),
                Parameter {
                    param_type: "String".to_string(),
                    description: "ARN of the certificate served by the HTTPS listener"
                        .to_string(),
                },
            );
            Expr::reference(ids::CERTIFICATE_PARAMETER)
        }
    }
}

fn render_service(template: &mut Template, service: &ServiceDeclaration) -> SynthResult<()> {
    let port = target_port(service)?;

    template.resources.insert(
        ids::SERVICE_SECURITY_GROUP.to_string(),
        Resource::new(Properties::SecurityGroup(SecurityGroup {
            group_description: format!("{} tasks", service.name),
            vpc_id: service.network.vpc_id.clone(),
            security_group_ingress: vec![IngressRule {
                ip_protocol: "tcp".to_string(),
                from_port: port,
                to_port: port,
                cidr_ip: None,
                source_security_group_id: Some(Expr::get_att(ids::LB_SECURITY_GROUP, "GroupId")),
                description: "Load balancer to target".to_string(),
            }],
        })),
    );

    let mut depends_on = vec![ids::LISTENER];
    if template.resources.contains_key(ids::REDIRECT_LISTENER) {
        depends_on.push(ids::REDIRECT_LISTENER);
    }

    template.resources.insert(
        ids::SERVICE.to_string(),
        Resource::new(Properties::Service(EcsService {
            service_name: service.name.clone(),
            cluster: Expr::reference(ids::CLUSTER),
            launch_type: "FARGATE".to_string(),
            task_definition: Expr::reference(ids::TASK_DEFINITION),
            desired_count: service.desired_count,
            health_check_grace_period_seconds: service.health_check_grace_secs,
            network_configuration: NetworkConfiguration {
                awsvpc_configuration: AwsvpcConfiguration {
                    assign_public_ip: if service.exposure.assign_public_ip {
                        "ENABLED".to_string()
                    } else {
                        "DISABLED".to_string()
                    },
                    subnets: service.network.subnet_ids.clone(),
                    security_groups: vec![Expr::get_att(ids::SERVICE_SECURITY_GROUP, "GroupId")],
                },
            },
            load_balancers: vec![ServiceLoadBalancer {
                container_name: service.target_container.clone(),
                container_port: port,
                target_group_arn: Expr::reference(ids::TARGET_GROUP),
            }],
        }))
        // Target groups must be attached to a listener before the service registers.
        .depends_on(&depends_on),
    );

    Ok(())
}

fn render_scaling(template: &mut Template, service: &ServiceDeclaration) {
    let Some(policy) = &service.scaling else {
        return;
    };

    template.resources.insert(
        ids::SCALABLE_TARGET.to_string(),
        Resource::new(Properties::ScalableTarget(ScalableTarget {
            min_capacity: policy.min_replicas,
            max_capacity: policy.max_replicas,
            resource_id: Expr::sub(format!(
                "service/${{{}}}/${{{}.Name}}",
                ids::CLUSTER,
                ids::SERVICE
            )),
            role_arn: Expr::sub(AUTOSCALING_ROLE),
            scalable_dimension: "ecs:service:DesiredCount".to_string(),
            service_namespace: "ecs".to_string(),
        })),
    );

    for (logical_id, metric, target) in [
        (
            ids::CPU_SCALING,
            "ECSServiceAverageCPUUtilization",
            policy.target_cpu_percent,
        ),
        (
            ids::MEMORY_SCALING,
            "ECSServiceAverageMemoryUtilization",
            policy.target_memory_percent,
        ),
    ] {
        template.resources.insert(
            logical_id.to_string(),
            Resource::new(Properties::ScalingPolicy(ScalingPolicy {
                policy_name: format!("{}{}", service.name, logical_id),
                policy_type: "TargetTrackingScaling".to_string(),
                scaling_target_id: Expr::reference(ids::SCALABLE_TARGET),
                target_tracking_scaling_policy_configuration: TargetTrackingConfiguration {
                    predefined_metric_specification: PredefinedMetricSpecification {
                        predefined_metric_type: metric.to_string(),
                    },
                    target_value: f64::from(target),
                },
            })),
        );
    }
}

fn render_dns(template: &mut Template, service: &ServiceDeclaration) {
    let Some(binding) = &service.exposure.domain else {
        return;
    };
    template.resources.insert(
        ids::DNS_RECORD.to_string(),
        Resource::new(Properties::RecordSet(RecordSet {
            name: binding.domain_name.clone(),
            record_type: "A".to_string(),
            hosted_zone_id: binding.zone.id.clone(),
            alias_target: AliasTarget {
                dns_name: Expr::get_att(ids::LOAD_BALANCER, "DNSName"),
                hosted_zone_id: Expr::get_att(ids::LOAD_BALANCER, "CanonicalHostedZoneID"),
            },
        })),
    );
}
