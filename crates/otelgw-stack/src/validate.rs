//! Platform limit checks run before a template is emitted.

use std::collections::HashSet;

use otelgw_core::{ScalingPolicy, ServiceDeclaration, TaskTemplate};

use crate::error::{SynthError, SynthResult};

/// Retention values the log service accepts.
const LOG_RETENTION_DAYS: [u32; 22] = [
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

/// Validate a fully attached service declaration.
pub fn validate_service(service: &ServiceDeclaration) -> SynthResult<()> {
    validate_task(&service.task)?;

    if service.network.subnet_ids.len() != service.network.zones.len() {
        return Err(SynthError::policy(
            "network",
            "subnet and zone lists are not aligned",
        ));
    }

    let target = service.target().ok_or_else(|| {
        SynthError::policy(
            "service",
            format!("target container `{}` is not in the task", service.target_container),
        )
    })?;
    if !target.ports().contains(&service.health.port) {
        return Err(SynthError::policy(
            "health check",
            format!(
                "port {} is not mapped by container `{}`",
                service.health.port, target.name
            ),
        ));
    }

    let health = &service.health;
    if !health.path.starts_with('/') {
        return Err(SynthError::policy(
            "health check",
            format!("path `{}` must start with `/`", health.path),
        ));
    }
    if !(2..=10).contains(&health.unhealthy_threshold) {
        return Err(SynthError::policy(
            "health check",
            format!(
                "unhealthy threshold {} outside 2..=10",
                health.unhealthy_threshold
            ),
        ));
    }
    let codes = health.healthy_http_codes;
    if codes.start > codes.end || codes.start < 200 || codes.end > 499 {
        return Err(SynthError::policy(
            "health check",
            format!("success codes {codes} outside 200-499"),
        ));
    }

    if let Some(scaling) = &service.scaling {
        validate_scaling(scaling)?;
        if !(scaling.min_replicas..=scaling.max_replicas).contains(&service.desired_count) {
            return Err(SynthError::policy(
                "service",
                format!(
                    "desired count {} outside replica bounds [{}, {}]",
                    service.desired_count, scaling.min_replicas, scaling.max_replicas
                ),
            ));
        }
    }

    Ok(())
}

pub fn validate_scaling(policy: &ScalingPolicy) -> SynthResult<()> {
    if policy.max_replicas == 0 || policy.min_replicas > policy.max_replicas {
        return Err(SynthError::policy(
            "scaling",
            format!(
                "invalid replica bounds [{}, {}]",
                policy.min_replicas, policy.max_replicas
            ),
        ));
    }
    for (metric, target) in [
        ("cpu", policy.target_cpu_percent),
        ("memory", policy.target_memory_percent),
    ] {
        if !(1..=100).contains(&target) {
            return Err(SynthError::policy(
                "scaling",
                format!("{metric} target {target}% outside 1..=100"),
            ));
        }
    }
    Ok(())
}

pub fn validate_task(task: &TaskTemplate) -> SynthResult<()> {
    if !fargate_size_supported(task.cpu, task.memory_mib) {
        return Err(SynthError::policy(
            "task",
            format!(
                "cpu {} with {} MiB memory is not a supported task size",
                task.cpu, task.memory_mib
            ),
        ));
    }

    if !task.containers.iter().any(|c| c.essential) {
        return Err(SynthError::policy("task", "no essential container"));
    }

    let mut names = HashSet::new();
    let mut ports = HashSet::new();
    for container in &task.containers {
        if !names.insert(container.name.as_str()) {
            return Err(SynthError::policy(
                "task",
                format!("duplicate container name `{}`", container.name),
            ));
        }
        // Containers share one network namespace.
        for port in container.ports() {
            if port == 0 {
                return Err(SynthError::policy(
                    "task",
                    format!("container `{}` maps port 0", container.name),
                ));
            }
            if !ports.insert(port) {
                return Err(SynthError::policy(
                    "task",
                    format!("port {port} is mapped more than once"),
                ));
            }
        }
        if !LOG_RETENTION_DAYS.contains(&container.log.retention_days) {
            return Err(SynthError::policy(
                "task",
                format!(
                    "log retention of {} days is not supported",
                    container.log.retention_days
                ),
            ));
        }
    }

    for container in &task.containers {
        for dep in &container.depends_on {
            if dep.container == container.name {
                return Err(SynthError::policy(
                    "task",
                    format!("container `{}` depends on itself", container.name),
                ));
            }
            if !names.contains(dep.container.as_str()) {
                return Err(SynthError::policy(
                    "task",
                    format!(
                        "container `{}` depends on unknown container `{}`",
                        container.name, dep.container
                    ),
                ));
            }
        }
    }
    check_acyclic(task)
}

/// Depth-first search over start-order dependencies.
fn check_acyclic(task: &TaskTemplate) -> SynthResult<()> {
    fn visit<'a>(
        task: &'a TaskTemplate,
        name: &'a str,
        stack: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> SynthResult<()> {
        if done.contains(name) {
            return Ok(());
        }
        if stack.contains(&name) {
            stack.push(name);
            return Err(SynthError::policy(
                "task",
                format!("dependency cycle: {}", stack.join(" -> ")),
            ));
        }
        stack.push(name);
        if let Some(container) = task.container(name) {
            for dep in &container.depends_on {
                visit(task, &dep.container, stack, done)?;
            }
        }
        stack.pop();
        done.insert(name);
        Ok(())
    }

    let mut done = HashSet::new();
    for container in &task.containers {
        visit(task, &container.name, &mut Vec::new(), &mut done)?;
    }
    Ok(())
}

fn fargate_size_supported(cpu: u32, memory_mib: u32) -> bool {
    let gib = |n: u32| n * 1024;
    match cpu {
        256 => matches!(memory_mib, 512 | 1024 | 2048),
        512 => (gib(1)..=gib(4)).contains(&memory_mib) && memory_mib % 1024 == 0,
        1024 => (gib(2)..=gib(8)).contains(&memory_mib) && memory_mib % 1024 == 0,
        2048 => (gib(4)..=gib(16)).contains(&memory_mib) && memory_mib % 1024 == 0,
        4096 => (gib(8)..=gib(30)).contains(&memory_mib) && memory_mib % 1024 == 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_topology, scaling::scaling_policy, task::COLLECTOR_CONTAINER};
    use otelgw_core::{
        ClusterData, ContainerDependency, ContextFile, DependencyCondition, PortMapping,
        StackSettings,
    };
    use indexmap::IndexMap;

    fn service() -> ServiceDeclaration {
        let ctx = ContextFile {
            cluster_data: ClusterData::new(
                "vpc-1",
                IndexMap::from([
                    ("us-east-1a".to_string(), "subnet-1".to_string()),
                    ("us-east-1b".to_string(), "subnet-2".to_string()),
                ]),
            ),
            stack: StackSettings::default(),
        };
        build_topology(&ctx).unwrap().service
    }

    fn assert_violation(result: SynthResult<()>, needle: &str) {
        match result {
            Err(SynthError::PolicyViolation { reason, .. }) => {
                assert!(reason.contains(needle), "`{reason}` does not mention `{needle}`")
            }
            other => panic!("expected policy violation, got {other:?}"),
        }
    }

    #[test]
    fn default_topology_is_valid() {
        validate_service(&service()).unwrap();
    }

    #[test]
    fn rejects_inverted_replica_bounds() {
        let policy = ScalingPolicy {
            min_replicas: 3,
            max_replicas: 2,
            ..scaling_policy()
        };
        assert_violation(validate_scaling(&policy), "replica bounds");
    }

    #[test]
    fn rejects_out_of_range_target() {
        let policy = ScalingPolicy {
            target_memory_percent: 0,
            ..scaling_policy()
        };
        assert_violation(validate_scaling(&policy), "memory target");
    }

    #[test]
    fn rejects_unsupported_task_size() {
        let mut svc = service();
        svc.task.memory_mib = 4096;
        assert_violation(validate_service(&svc), "task size");
    }

    #[test]
    fn rejects_shared_port() {
        let mut svc = service();
        svc.task.containers[1].port_mappings.push(PortMapping::tcp(80));
        assert_violation(validate_service(&svc), "port 80");
    }

    #[test]
    fn rejects_unknown_dependency() {
        let mut svc = service();
        svc.task.containers[0].depends_on[0].container = "sidecar".to_string();
        assert_violation(validate_service(&svc), "unknown container");
    }

    #[test]
    fn rejects_dependency_cycle() {
        let mut svc = service();
        let proxy = svc.task.containers[0].name.clone();
        let collector = svc
            .task
            .containers
            .iter_mut()
            .find(|c| c.name == COLLECTOR_CONTAINER)
            .unwrap();
        collector.depends_on.push(ContainerDependency {
            container: proxy,
            condition: DependencyCondition::Start,
        });
        assert_violation(validate_service(&svc), "cycle");
    }

    #[test]
    fn rejects_threshold_above_platform_max() {
        let mut svc = service();
        svc.health.unhealthy_threshold = 11;
        assert_violation(validate_service(&svc), "unhealthy threshold");
    }

    #[test]
    fn rejects_health_port_not_on_target() {
        let mut svc = service();
        svc.health.port = 4318;
        assert_violation(validate_service(&svc), "not mapped");
    }

    #[test]
    fn fargate_sizes() {
        assert!(fargate_size_supported(256, 512));
        assert!(fargate_size_supported(1024, 3072));
        assert!(!fargate_size_supported(256, 4096));
        assert!(!fargate_size_supported(300, 512));
    }
}
