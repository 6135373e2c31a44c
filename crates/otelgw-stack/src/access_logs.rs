//! Access log destination for the load balancer.

use otelgw_core::{AccessLogSink, Arn, StackSettings};
use tracing::debug;

use crate::error::SynthResult;

/// Reference the pre-existing access log bucket. Lifecycle and rotation of
/// the bucket are managed outside this stack.
pub fn access_log_sink(settings: &StackSettings) -> SynthResult<AccessLogSink> {
    let bucket_arn = Arn::parse_for(&settings.access_log_bucket_arn, "s3")?;
    let bucket_name = bucket_arn.s3_bucket_name()?.to_string();
    debug!(bucket = %bucket_name, "attached access log sink");
    Ok(AccessLogSink {
        bucket_arn,
        bucket_name,
    })
}
