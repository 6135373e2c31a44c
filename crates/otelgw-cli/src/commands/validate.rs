use std::path::Path;

use anyhow::Context;
use otelgw_core::ContextFile;
use otelgw_stack::Topology;

/// Run `otelgw validate`: build every descriptor and print a summary.
pub fn validate(context: &Path) -> anyhow::Result<()> {
    let ctx = ContextFile::from_file(context)?;
    let topology = otelgw_stack::build_topology(&ctx)
        .with_context(|| format!("validation failed for {}", context.display()))?;
    for line in summary(&topology) {
        println!("{line}");
    }
    Ok(())
}

fn summary(topology: &Topology) -> Vec<String> {
    let network = &topology.network;
    let service = &topology.service;
    let mut lines = vec![
        format!(
            "✓ network   {} across {} zone(s): {}",
            network.vpc_id,
            network.zones.len(),
            network
                .placements()
                .map(|(zone, subnet)| format!("{zone}={subnet}"))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        format!(
            "✓ identity  {} trusted by {} ({} actions)",
            topology.identity.name,
            topology.identity.trusted_principal,
            topology.identity.permissions().count()
        ),
    ];

    for container in &service.task.containers {
        let deps = container
            .depends_on
            .iter()
            .map(|d| format!("{}:{}", d.container, d.condition.as_str()))
            .collect::<Vec<_>>();
        lines.push(format!(
            "✓ container {} essential={} ports={:?}{}",
            container.name,
            container.essential,
            container.ports(),
            if deps.is_empty() {
                String::new()
            } else {
                format!(" after {}", deps.join(","))
            }
        ));
    }

    lines.push(format!(
        "✓ service   {} {} health={} codes={} threshold={}",
        service.name,
        service.exposure.protocol.as_str(),
        service.health.path,
        service.health.healthy_http_codes,
        service.health.unhealthy_threshold
    ));
    if let Some(scaling) = &service.scaling {
        lines.push(format!(
            "✓ scaling   replicas [{}, {}] cpu {}% memory {}%",
            scaling.min_replicas,
            scaling.max_replicas,
            scaling.target_cpu_percent,
            scaling.target_memory_percent
        ));
    }
    if let Some(sink) = &service.access_logs {
        lines.push(format!("✓ logs      s3://{}", sink.bucket_name));
    }
    lines
}
