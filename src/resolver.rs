use std::sync::Arc;

use crate::catalog::{Catalog, Cluster, Command, Criterion};

/// Resolves a job's ordered cluster criteria and command criterion to the
/// set of (cluster, command) pairs the job could run on.
///
/// Criteria are evaluated strictly in order and the first criterion that
/// matches any cluster wins; later criteria are never consulted, even if
/// they would match "better" by some other measure. Client-supplied order
/// is the only preference signal.
pub struct Resolver {
    catalog: Arc<dyn Catalog>,
}

impl Resolver {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Returns one (cluster, command) pair per surviving cluster. For each
    /// cluster from the winning criterion, the matching attached command
    /// with the lowest list position is selected; clusters with no matching
    /// attached command are dropped. An empty result is an expected
    /// outcome, not an error.
    pub async fn resolve(
        &self,
        cluster_criteria: &[Criterion],
        command_criterion: &Criterion,
    ) -> Vec<(Cluster, Command)> {
        for criterion in cluster_criteria {
            let clusters = self.catalog.find_clusters(criterion).await;
            if clusters.is_empty() {
                continue;
            }
            tracing::debug!(
                candidates = clusters.len(),
                "Cluster criterion matched; resolving commands"
            );

            let mut resolved = Vec::with_capacity(clusters.len());
            for cluster in clusters {
                let commands = self.catalog.find_commands(command_criterion, &cluster).await;
                if let Some(command) = commands.into_iter().next() {
                    resolved.push((cluster, command));
                }
            }
            return resolved;
        }
        Vec::new()
    }
}
