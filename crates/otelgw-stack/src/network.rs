//! Network resolution: zone to subnet mapping into aligned placement lists.

use otelgw_core::{ClusterData, ConfigError, NetworkContext};
use tracing::{debug, warn};

use crate::error::SynthResult;

/// Resolve the existing VPC and split the zone mapping into index-aligned
/// subnet and zone lists, preserving the mapping's iteration order.
///
/// Fails with [`ConfigError::NoZones`] when the mapping is empty. Whether
/// the VPC actually exists is only known to the platform at deploy time.
pub fn resolve(cluster: &ClusterData) -> SynthResult<NetworkContext> {
    if cluster.subnets.is_empty() {
        return Err(ConfigError::NoZones.into());
    }
    if cluster.vpc_id.is_empty() {
        return Err(ConfigError::MissingKey("cluster-data.vpc_id".to_string()).into());
    }

    let (zones, subnet_ids): (Vec<String>, Vec<String>) = cluster
        .subnets
        .iter()
        .map(|(zone, subnet)| (zone.clone(), subnet.clone()))
        .unzip();

    if zones.len() == 1 {
        // Application load balancers want two zones; the platform decides.
        warn!(zone = %zones[0], "deploying into a single availability zone");
    }
    debug!(vpc = %cluster.vpc_id, zones = zones.len(), "resolved network");

    Ok(NetworkContext {
        vpc_id: cluster.vpc_id.clone(),
        subnet_ids,
        zones,
    })
}
