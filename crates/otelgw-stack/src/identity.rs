//! Task execution role.

use otelgw_core::{Effect, ExecutionIdentity, PolicyStatement};
use tracing::debug;

/// Service principal of the container task platform.
pub const TASK_EXECUTION_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Actions the platform needs to pull images and write container logs.
pub const EXECUTION_ACTIONS: [&str; 6] = [
    "ecr:GetAuthorizationToken",
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
    "logs:CreateLogStream",
    "logs:PutLogEvents",
];

/// Build the execution identity. Every action is granted on `*`.
pub fn execution_identity(name: &str) -> ExecutionIdentity {
    debug!(role = name, "built execution identity");
    ExecutionIdentity {
        name: name.to_string(),
        trusted_principal: TASK_EXECUTION_PRINCIPAL.to_string(),
        statements: vec![PolicyStatement {
            effect: Effect::Allow,
            actions: EXECUTION_ACTIONS.iter().map(|a| a.to_string()).collect(),
            resources: vec!["*".to_string()],
        }],
    }
}
