//! otelgw-stack: topology builders and template synthesis.
//!
//! Synthesis is a single linear pass over pure builders:
//!
//! ```text
//! resolve network -> execution identity -> task template -> service
//!     -> attach scaling -> attach access logs -> validate -> render
//! ```
//!
//! Each step returns an immutable descriptor consumed by the next. The
//! rendered [`Template`] is handed to an external deployment tool; nothing
//! here talks to the cloud platform.

pub mod access_logs;
pub mod error;
pub mod identity;
pub mod network;
pub mod render;
pub mod scaling;
pub mod service;
pub mod task;
pub mod template;
pub mod validate;

use otelgw_core::{ContextFile, ExecutionIdentity, NetworkContext, ServiceDeclaration};
use tracing::info;

pub use error::{SynthError, SynthResult};
pub use template::Template;

/// Every descriptor produced by one build.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    pub network: NetworkContext,
    pub identity: ExecutionIdentity,
    /// Owns the task template, scaling policy, and access log sink.
    pub service: ServiceDeclaration,
}

/// Output of [`synthesize`].
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub topology: Topology,
    pub template: Template,
}

/// Build and validate all descriptors without rendering.
pub fn build_topology(ctx: &ContextFile) -> SynthResult<Topology> {
    let network = network::resolve(&ctx.cluster_data)?;
    ctx.cluster_data.validate()?;

    let identity = identity::execution_identity(&ctx.stack.execution_role_name);
    let task = task::task_template(&ctx.stack, &ctx.cluster_data, &identity);
    let service = service::service_declaration(&ctx.stack, &ctx.cluster_data, &network, task)
        .with_scaling(scaling::scaling_policy())
        .with_access_logs(access_logs::access_log_sink(&ctx.stack)?);

    validate::validate_service(&service)?;

    Ok(Topology {
        network,
        identity,
        service,
    })
}

/// Build, validate, and render the stack template.
pub fn synthesize(ctx: &ContextFile) -> SynthResult<Synthesis> {
    let topology = build_topology(ctx)?;
    let template = render::render(&ctx.stack, &topology)?;

    info!(
        stack = %ctx.stack.stack_name,
        resources = template.resources.len(),
        zones = topology.network.zones.len(),
        "synthesized template"
    );

    Ok(Synthesis { topology, template })
}
