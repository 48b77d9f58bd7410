use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::admission::AdmissionController;
use crate::balancer::{ClusterLoadBalancer, RandomLoadBalancer};
use crate::catalog::{Catalog, InMemoryCatalog};
use crate::config::NodeConfig;
use crate::error::Result;
use crate::execution::{CompletionEvent, ExecutionSubsystem, ProcessExecutor};
use crate::fleet::HttpFleetStatus;
use crate::http::{router, ApiState, HttpPeerClient, PeerClient};
use crate::job::{InMemoryJobStore, JobStore};
use crate::lifecycle::JobLifecycle;
use crate::resolver::Resolver;
use crate::shutdown::install_shutdown_handler;
use crate::stats::NodeStats;

/// Main node that wires the store, catalog, admission controller, job
/// lifecycle and executor together and runs the API server.
pub struct Node {
    pub config: Arc<NodeConfig>,
    pub store: Arc<dyn JobStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub stats: Arc<NodeStats>,
    pub admission: Arc<AdmissionController>,
    pub lifecycle: Arc<JobLifecycle>,
    events: mpsc::UnboundedReceiver<CompletionEvent>,
}

impl Node {
    pub fn new(config: NodeConfig) -> Result<Self> {
        let config = Arc::new(config);
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let stats = Arc::new(NodeStats::new());

        let peers: Arc<dyn PeerClient> =
            Arc::new(HttpPeerClient::new(config.forward_timeout())?);
        let fleet = Arc::new(HttpFleetStatus::new(
            config.host_name.clone(),
            config.peers.clone(),
            store.clone(),
            config.forward_timeout(),
        )?);
        let balancer: Arc<dyn ClusterLoadBalancer> = Arc::new(RandomLoadBalancer);
        let resolver = Resolver::new(catalog.clone() as Arc<dyn Catalog>);
        let (executor, events) = ProcessExecutor::new(resolver, balancer);
        let executor: Arc<dyn ExecutionSubsystem> = Arc::new(executor);

        let admission = Arc::new(AdmissionController::new(
            config.clone(),
            store.clone(),
            fleet,
            peers.clone(),
            executor.clone(),
            stats.clone(),
        ));
        let lifecycle = Arc::new(JobLifecycle::new(
            config.clone(),
            store.clone(),
            executor,
            peers,
            stats.clone(),
        ));

        Ok(Self {
            config,
            store,
            catalog,
            stats,
            admission,
            lifecycle,
            events,
        })
    }

    /// Run the node:
    /// 1. Loads the catalog file, when configured
    /// 2. Spawns the completion reaper (process exits -> finalization)
    /// 3. Spawns the zombie janitor
    /// 4. Runs the API server (blocking) until SIGTERM/SIGINT
    pub async fn run(self) -> Result<()> {
        if let Some(path) = &self.config.catalog_path {
            let (clusters, commands) = self.catalog.load_file(path).await?;
            tracing::info!(
                path = %path.display(),
                clusters,
                commands,
                "Loaded catalog"
            );
        }

        let shutdown = install_shutdown_handler();

        // Completion reaper: drain process exits into finalization
        let lifecycle = self.lifecycle.clone();
        let mut events = self.events;
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = lifecycle.finalize(&event.job_id, event.exit_code).await {
                    tracing::warn!(job_id = %event.job_id, error = %e, "Failed to finalize job");
                }
            }
        });

        // Zombie janitor
        let lifecycle = self.lifecycle.clone();
        let window = self.config.zombie_window();
        let interval = self.config.janitor_interval();
        let janitor_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick is immediate; skip it
            loop {
                tokio::select! {
                    _ = janitor_shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        match lifecycle.mark_zombies(window).await {
                            Ok(0) => {}
                            Ok(marked) => tracing::warn!(marked, "Janitor marked zombie jobs"),
                            Err(e) => tracing::warn!(error = %e, "Janitor pass failed"),
                        }
                    }
                }
            }
        });

        let state = ApiState {
            config: self.config.clone(),
            admission: self.admission,
            lifecycle: self.lifecycle,
            store: self.store,
            stats: self.stats,
        };
        let app = router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr = %addr, host_name = %self.config.host_name, "Starting jobmesh API server");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;
        Ok(())
    }
}
