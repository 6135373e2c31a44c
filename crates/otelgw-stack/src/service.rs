//! Load-balanced service declaration.

use otelgw_core::{
    CertificateSource, ClusterData, DomainBinding, ExposurePolicy, HealthCheckPolicy,
    HttpCodeRange, ListenerProtocol, NetworkContext, ServiceDeclaration, StackSettings,
    TaskTemplate,
};
use tracing::debug;

use crate::task::{PROXY_CONTAINER, PROXY_PORT};

pub const HEALTH_CHECK_PATH: &str = "/health";
pub const HEALTHY_HTTP_CODES: HttpCodeRange = HttpCodeRange { start: 200, end: 299 };
pub const UNHEALTHY_THRESHOLD: u32 = 10;

pub const DESIRED_COUNT: u32 = 1;
pub const HEALTH_CHECK_GRACE_SECS: u32 = 60;

/// Health check against the proxy's mapped port.
pub fn health_check() -> HealthCheckPolicy {
    HealthCheckPolicy {
        path: HEALTH_CHECK_PATH.to_string(),
        port: PROXY_PORT,
        healthy_http_codes: HEALTHY_HTTP_CODES,
        unhealthy_threshold: UNHEALTHY_THRESHOLD,
    }
}

/// HTTPS at the edge with HTTP redirected, public IPs on tasks.
///
/// The certificate comes from `certificate_arn` when set, otherwise from a
/// DNS-validated request in the hosted zone, otherwise from a deploy-time
/// parameter.
pub fn exposure(cluster: &ClusterData) -> ExposurePolicy {
    let domain = match (&cluster.domain_name, &cluster.hosted_zone) {
        (Some(domain_name), Some(zone)) => Some(DomainBinding {
            domain_name: domain_name.clone(),
            zone: zone.clone(),
        }),
        _ => None,
    };

    let certificate = match (&cluster.certificate_arn, &domain) {
        (Some(arn), _) => CertificateSource::Existing(arn.clone()),
        (None, Some(binding)) => CertificateSource::DnsValidated {
            domain_name: binding.domain_name.clone(),
            zone: binding.zone.clone(),
        },
        (None, None) => CertificateSource::Parameter,
    };

    ExposurePolicy {
        protocol: ListenerProtocol::Https,
        redirect_http: true,
        assign_public_ip: true,
        certificate: Some(certificate),
        domain,
    }
}

/// Wrap the task template in a service. Scaling and access logs are
/// attached afterwards.
pub fn service_declaration(
    settings: &StackSettings,
    cluster: &ClusterData,
    network: &NetworkContext,
    task: TaskTemplate,
) -> ServiceDeclaration {
    let exposure = exposure(cluster);
    debug!(
        service = %settings.service_name,
        protocol = exposure.protocol.as_str(),
        domain = ?exposure.domain.as_ref().map(|d| d.domain_name.as_str()),
        "built service declaration"
    );

    ServiceDeclaration {
        name: settings.service_name.clone(),
        cluster_name: settings.cluster_name.clone(),
        task,
        target_container: PROXY_CONTAINER.to_string(),
        desired_count: DESIRED_COUNT,
        health_check_grace_secs: HEALTH_CHECK_GRACE_SECS,
        health: health_check(),
        exposure,
        network: network.clone(),
        scaling: None,
        access_logs: None,
    }
}
