use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::job::JobStore;

/// Load report returned by a node's load endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeLoad {
    pub host_name: String,
    pub running_jobs: usize,
}

/// Reports running-job counts for this node and its peers.
#[async_trait]
pub trait FleetStatusProvider: Send + Sync {
    /// Number of jobs currently admitted and not yet finished on this node.
    async fn local_running_jobs(&self) -> Result<usize>;

    /// Host name of the fleet member best suited to take new work: the
    /// host with the fewest running jobs, provided that count is below
    /// `threshold`. Falls back to the local host when no member qualifies,
    /// so callers can short-circuit forwarding.
    async fn idlest_peer(&self, threshold: usize) -> Result<String>;
}

/// Fleet status built from the local job store and peer load endpoints.
pub struct HttpFleetStatus {
    host_name: String,
    peers: Vec<String>,
    store: Arc<dyn JobStore>,
    client: reqwest::Client,
}

impl HttpFleetStatus {
    pub fn new(
        host_name: impl Into<String>,
        peers: Vec<String>,
        store: Arc<dyn JobStore>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            host_name: host_name.into(),
            peers,
            store,
            client,
        })
    }

    async fn peer_load(&self, peer: &str) -> Result<NodeLoad> {
        let load = self
            .client
            .get(format!("http://{peer}/api/v1/node/load"))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json::<NodeLoad>()
            .await?;
        Ok(load)
    }
}

#[async_trait]
impl FleetStatusProvider for HttpFleetStatus {
    async fn local_running_jobs(&self) -> Result<usize> {
        Ok(self.store.count_active().await)
    }

    async fn idlest_peer(&self, threshold: usize) -> Result<String> {
        // Local host seeds the search and wins ties.
        let mut best_host = self.host_name.clone();
        let mut best_count = self.store.count_active().await;

        for peer in &self.peers {
            match self.peer_load(peer).await {
                Ok(load) => {
                    if load.running_jobs < best_count {
                        best_host = load.host_name;
                        best_count = load.running_jobs;
                    }
                }
                Err(e) => {
                    tracing::warn!(peer = %peer, error = %e, "Failed to query peer load; skipping");
                }
            }
        }

        if best_count < threshold {
            Ok(best_host)
        } else {
            tracing::debug!(
                threshold,
                best_count,
                "No fleet member below idle threshold; staying local"
            );
            Ok(self.host_name.clone())
        }
    }
}
