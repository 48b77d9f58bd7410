pub mod criterion;
pub mod model;

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

pub use criterion::Criterion;
pub use model::{Cluster, ClusterStatus, Command, CommandStatus};

use crate::error::Result;

/// Read access to the cluster/command catalog.
///
/// Each call operates on a point-in-time snapshot; callers do not need to
/// coordinate with concurrent catalog mutations.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Clusters matching the criterion, in catalog order.
    async fn find_clusters(&self, criterion: &Criterion) -> Vec<Cluster>;

    /// Commands attached to `cluster` that match the criterion, in the
    /// cluster's priority order. Attached ids with no catalog entry are
    /// skipped.
    async fn find_commands(&self, criterion: &Criterion, cluster: &Cluster) -> Vec<Command>;
}

#[derive(Debug, Default)]
struct CatalogData {
    clusters: Vec<Cluster>,
    commands: HashMap<String, Command>,
}

/// In-memory catalog backing a single node, loadable from a JSON file.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    data: RwLock<CatalogData>,
}

/// On-disk catalog format: flat lists of clusters and commands; clusters
/// reference commands by id.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    #[serde(default)]
    pub commands: Vec<Command>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_cluster(&self, cluster: Cluster) {
        let mut data = self.data.write().await;
        data.clusters.retain(|c| c.id != cluster.id);
        data.clusters.push(cluster);
    }

    pub async fn add_command(&self, command: Command) {
        let mut data = self.data.write().await;
        data.commands.insert(command.id.clone(), command);
    }

    /// Load clusters and commands from a JSON catalog file, replacing any
    /// entries with the same ids. Returns (clusters, commands) loaded.
    pub async fn load_file(&self, path: &Path) -> Result<(usize, usize)> {
        let raw = tokio::fs::read(path).await?;
        let file: CatalogFile = serde_json::from_slice(&raw)?;
        let counts = (file.clusters.len(), file.commands.len());
        for command in file.commands {
            self.add_command(command).await;
        }
        for cluster in file.clusters {
            self.add_cluster(cluster).await;
        }
        Ok(counts)
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn find_clusters(&self, criterion: &Criterion) -> Vec<Cluster> {
        self.data
            .read()
            .await
            .clusters
            .iter()
            .filter(|c| criterion.matches_cluster(c))
            .cloned()
            .collect()
    }

    async fn find_commands(&self, criterion: &Criterion, cluster: &Cluster) -> Vec<Command> {
        let data = self.data.read().await;
        cluster
            .commands
            .iter()
            .filter_map(|id| data.commands.get(id))
            .filter(|c| criterion.matches_command(c))
            .cloned()
            .collect()
    }
}
