use rand::Rng;

use crate::catalog::Cluster;
use crate::error::{MeshError, Result};

/// Strategy for picking one cluster among equally-valid candidates.
///
/// Implementations can be swapped for load-aware or affinity-aware
/// strategies without touching the resolver or admission controller.
pub trait ClusterLoadBalancer: Send + Sync {
    fn select_cluster<'a>(&self, candidates: &'a [Cluster]) -> Result<&'a Cluster>;
}

/// Default strategy: uniform random selection.
#[derive(Debug, Default)]
pub struct RandomLoadBalancer;

impl ClusterLoadBalancer for RandomLoadBalancer {
    fn select_cluster<'a>(&self, candidates: &'a [Cluster]) -> Result<&'a Cluster> {
        if candidates.is_empty() {
            return Err(MeshError::PreconditionFailed(
                "no candidate clusters to select from".to_string(),
            ));
        }
        let index = rand::thread_rng().gen_range(0..candidates.len());
        Ok(&candidates[index])
    }
}
