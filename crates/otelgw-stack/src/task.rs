//! Task template: the nginx reverse proxy and the collector sidecar.
//!
//! The proxy forwards every request to the collector over localhost, so it
//! must not start before the collector process does. The dependency only
//! waits for the collector to be *started*, not healthy: a collector that
//! is up but has not yet bound its listeners can still fail the first
//! forwarded requests.

use otelgw_core::{
    ClusterData, ContainerDependency, ContainerSpec, DependencyCondition, ExecutionIdentity,
    ImageRef, LogDestination, PortMapping, StackSettings, TaskTemplate,
};
use tracing::debug;

pub const PROXY_CONTAINER: &str = "proxy";
pub const COLLECTOR_CONTAINER: &str = "collector";

pub const PROXY_PORT: u16 = 80;
/// OTLP/HTTP, OTLP/gRPC, and the collector health-check extension.
pub const COLLECTOR_PORTS: [u16; 3] = [4318, 4317, 13133];

pub const TASK_CPU: u32 = 256;
pub const TASK_MEMORY_MIB: u32 = 512;
pub const LOG_RETENTION_DAYS: u32 = 7;

pub const TASK_FAMILY: &str = "otel-gateway";

/// Build the two-container task template.
pub fn task_template(
    settings: &StackSettings,
    cluster: &ClusterData,
    identity: &ExecutionIdentity,
) -> TaskTemplate {
    let collector = collector_container(settings, cluster);
    let proxy = proxy_container(settings, &collector);

    debug!(
        family = TASK_FAMILY,
        cpu = TASK_CPU,
        memory_mib = TASK_MEMORY_MIB,
        "built task template"
    );

    TaskTemplate {
        family: TASK_FAMILY.to_string(),
        cpu: TASK_CPU,
        memory_mib: TASK_MEMORY_MIB,
        execution_role: identity.name.clone(),
        containers: vec![proxy, collector],
    }
}

fn proxy_container(settings: &StackSettings, collector: &ContainerSpec) -> ContainerSpec {
    ContainerSpec {
        name: PROXY_CONTAINER.to_string(),
        image: ImageRef {
            repository: settings.proxy_repository.clone(),
            tag: settings.image_tag.clone(),
        },
        essential: true,
        port_mappings: vec![PortMapping::tcp(PROXY_PORT)],
        log: LogDestination {
            log_group_name: "/aws/fargate/nginx-otel-gateway".to_string(),
            stream_prefix: "nginx-otel-gateway".to_string(),
            retention_days: LOG_RETENTION_DAYS,
        },
        depends_on: vec![ContainerDependency {
            container: collector.name.clone(),
            condition: DependencyCondition::Start,
        }],
        environment: Default::default(),
    }
}

fn collector_container(settings: &StackSettings, cluster: &ClusterData) -> ContainerSpec {
    ContainerSpec {
        name: COLLECTOR_CONTAINER.to_string(),
        image: ImageRef {
            repository: settings.collector_repository.clone(),
            tag: settings.image_tag.clone(),
        },
        essential: false,
        port_mappings: COLLECTOR_PORTS.iter().copied().map(PortMapping::tcp).collect(),
        log: LogDestination {
            log_group_name: "/aws/fargate/otel-gateway".to_string(),
            stream_prefix: "otel-gateway".to_string(),
            retention_days: LOG_RETENTION_DAYS,
        },
        depends_on: Vec::new(),
        environment: cluster.collector_environment.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::execution_identity;
    use indexmap::IndexMap;

    fn build() -> TaskTemplate {
        let cluster = ClusterData::new(
            "vpc-1",
            IndexMap::from([("us-east-1a".to_string(), "subnet-1".to_string())]),
        );
        task_template(
            &StackSettings::default(),
            &cluster,
            &execution_identity("otelgateway-execution-role"),
        )
    }

    #[test]
    fn has_two_distinct_containers() {
        let task = build();
        assert_eq!(task.containers.len(), 2);
        assert_ne!(task.containers[0].name, task.containers[1].name);
    }

    #[test]
    fn proxy_is_essential_collector_is_not() {
        let task = build();
        assert!(task.container(PROXY_CONTAINER).unwrap().essential);
        assert!(!task.container(COLLECTOR_CONTAINER).unwrap().essential);
    }

    #[test]
    fn proxy_waits_for_collector_start() {
        let task = build();
        let proxy = task.container(PROXY_CONTAINER).unwrap();
        assert_eq!(
            proxy.depends_on,
            [ContainerDependency {
                container: COLLECTOR_CONTAINER.to_string(),
                condition: DependencyCondition::Start,
            }]
        );
        let collector = task.container(COLLECTOR_CONTAINER).unwrap();
        assert!(collector.depends_on.is_empty());
    }

    #[test]
    fn port_mappings() {
        let task = build();
        assert_eq!(task.container(PROXY_CONTAINER).unwrap().ports(), [80]);
        assert_eq!(
            task.container(COLLECTOR_CONTAINER).unwrap().ports(),
            [4318, 4317, 13133]
        );
    }

    #[test]
    fn logs_go_to_separate_groups_with_one_week_retention() {
        let task = build();
        let proxy = &task.container(PROXY_CONTAINER).unwrap().log;
        let collector = &task.container(COLLECTOR_CONTAINER).unwrap().log;
        assert_ne!(proxy.log_group_name, collector.log_group_name);
        assert_eq!(proxy.retention_days, 7);
        assert_eq!(collector.retention_days, 7);
        assert_eq!(collector.stream_prefix, "otel-gateway");
    }

    #[test]
    fn references_execution_role_and_limits() {
        let task = build();
        assert_eq!(task.execution_role, "otelgateway-execution-role");
        assert_eq!(task.cpu, 256);
        assert_eq!(task.memory_mib, 512);
    }

    #[test]
    fn collector_environment_is_passed_through() {
        let mut cluster = ClusterData::new(
            "vpc-1",
            IndexMap::from([("us-east-1a".to_string(), "subnet-1".to_string())]),
        );
        cluster
            .collector_environment
            .insert("BEACON_ENVIRONMENT".to_string(), "staging".to_string());
        let task = task_template(&StackSettings::default(), &cluster, &execution_identity("r"));

        let collector = task.container(COLLECTOR_CONTAINER).unwrap();
        assert_eq!(collector.environment["BEACON_ENVIRONMENT"], "staging");
        assert!(task.container(PROXY_CONTAINER).unwrap().environment.is_empty());
    }
}
