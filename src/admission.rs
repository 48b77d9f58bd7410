use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::NodeConfig;
use crate::error::{MeshError, Result};
use crate::execution::ExecutionSubsystem;
use crate::fleet::FleetStatusProvider;
use crate::http::PeerClient;
use crate::job::{Job, JobRequest, JobStatus, JobStore};
use crate::stats::NodeStats;

/// Outcome of the throttle decision taken inside the admission lock.
/// Forwarding and execution hand-off happen after the lock is released.
enum Decision {
    Forward(String),
    Accepted(Job),
}

/// Decides, under concurrent submission load, whether a job runs locally,
/// is forwarded to a less-loaded peer, or is rejected because the fleet is
/// saturated.
///
/// The read-decide-insert sequence runs under a single per-node lock so
/// two concurrent submissions cannot both observe spare capacity and
/// jointly exceed `max_running_jobs`. The lock is never held across the
/// forwarding call or the execution hand-off.
pub struct AdmissionController {
    config: Arc<NodeConfig>,
    store: Arc<dyn JobStore>,
    fleet: Arc<dyn FleetStatusProvider>,
    peers: Arc<dyn PeerClient>,
    executor: Arc<dyn ExecutionSubsystem>,
    stats: Arc<NodeStats>,
    admission_lock: Mutex<()>,
}

impl AdmissionController {
    pub fn new(
        config: Arc<NodeConfig>,
        store: Arc<dyn JobStore>,
        fleet: Arc<dyn FleetStatusProvider>,
        peers: Arc<dyn PeerClient>,
        executor: Arc<dyn ExecutionSubsystem>,
        stats: Arc<NodeStats>,
    ) -> Self {
        Self {
            config,
            store,
            fleet,
            peers,
            executor,
            stats,
            admission_lock: Mutex::new(()),
        }
    }

    /// Validate, admit and launch a job submission. A rejected submission
    /// leaves no trace; an accepted one is persisted in INIT before the
    /// execution hand-off, and a hand-off failure leaves it FAILED rather
    /// than stuck.
    pub async fn submit(&self, mut request: JobRequest) -> Result<Job> {
        request.validate()?;
        let mut job = Job::from_request(&request)?;

        let decision = {
            let _guard = self.admission_lock.lock().await;

            let running = self.fleet.local_running_jobs().await?;
            tracing::info!(running, job_id = %job.id, "Admission check");
            let throttle = &self.config.throttle;

            // Find a host with fewer than (running - delta) jobs; when this
            // node is already saturated, search aggressively but cap the
            // threshold at its configured maximum.
            let mut idle_threshold =
                running.saturating_sub(throttle.idle_host_threshold_delta);
            if idle_threshold > throttle.max_idle_host_threshold
                || running >= throttle.max_running_jobs
            {
                idle_threshold = throttle.max_idle_host_threshold;
            }

            let mut forward_target = None;
            if running >= throttle.forward_threshold && !job.forwarded {
                tracing::info!(
                    running,
                    threshold = throttle.forward_threshold,
                    "Over forwarding threshold; looking for an idler peer"
                );
                let idle_host = self.fleet.idlest_peer(idle_threshold).await?;
                if idle_host != self.config.host_name {
                    forward_target = Some(idle_host);
                }
                // else: no idler peer found; run here if capacity allows
            }

            if let Some(host) = forward_target {
                job.forwarded = true;
                Decision::Forward(host)
            } else if running >= throttle.max_running_jobs {
                self.stats.incr_rejected();
                return Err(MeshError::CapacityExceeded(format!(
                    "number of running jobs has reached the system limit ({}) - \
                     try another node or retry later",
                    throttle.max_running_jobs
                )));
            } else {
                job.host_name = Some(self.config.host_name.clone());
                job.output_uri = Some(self.config.output_uri(&job.id));
                job.kill_uri = Some(self.config.job_uri(&job.id));
                // the insert is part of the critical section: a concurrent
                // submission must observe this job in the running count
                self.store.insert_if_absent(job.clone()).await?;
                Decision::Accepted(job.clone())
            }
        };

        match decision {
            Decision::Forward(host) => {
                self.stats.incr_forwarded();
                // carry the server-assigned id and the forwarded marker so
                // the peer cannot forward a second hop
                request.id = Some(job.id.clone());
                request.forwarded = true;
                let target = format!(
                    "http://{}:{}/{}",
                    host, self.config.port, self.config.job_resource_prefix
                );
                tracing::info!(job_id = %job.id, peer = %host, "Forwarding job submission");
                self.peers.forward_submit(&target, &request).await
            }
            Decision::Accepted(job) => {
                self.stats.incr_submitted();
                self.launch(job).await
            }
        }
    }

    async fn launch(&self, job: Job) -> Result<Job> {
        match self.executor.launch(&job).await {
            Ok(outcome) => {
                let job = self
                    .store
                    .update_with(
                        &job.id,
                        Box::new(move |j| {
                            j.process_handle = Some(outcome.pid);
                            j.command_id = Some(outcome.command_id);
                            j.command_name = Some(outcome.command_name);
                            j.execution_cluster_id = Some(outcome.cluster_id);
                            j.execution_cluster_name = Some(outcome.cluster_name);
                            j.started_at = Some(chrono::Utc::now());
                            j.set_status(JobStatus::Running, "Job is running");
                        }),
                    )
                    .await?;
                Ok(job)
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to launch job");
                self.stats.incr_failed();
                let message = e.to_string();
                let job = self
                    .store
                    .update_with(
                        &job.id,
                        Box::new(move |j| j.set_status(JobStatus::Failed, message)),
                    )
                    .await?;
                Ok(job)
            }
        }
    }
}
