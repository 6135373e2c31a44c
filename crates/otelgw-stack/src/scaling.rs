//! Autoscaling policy inputs.
//!
//! Two independent target-tracking triggers (CPU, memory). The platform
//! computes a desired replica count per trigger and applies the larger one,
//! clamped to the replica bounds. Nothing here evaluates metrics.

use otelgw_core::ScalingPolicy;

pub const MIN_REPLICAS: u32 = 1;
pub const MAX_REPLICAS: u32 = 2;
pub const TARGET_CPU_PERCENT: u32 = 60;
pub const TARGET_MEMORY_PERCENT: u32 = 60;

/// Fixed scaling policy; independent of the cluster context.
pub fn scaling_policy() -> ScalingPolicy {
    ScalingPolicy {
        min_replicas: MIN_REPLICAS,
        max_replicas: MAX_REPLICAS,
        target_cpu_percent: TARGET_CPU_PERCENT,
        target_memory_percent: TARGET_MEMORY_PERCENT,
    }
}
