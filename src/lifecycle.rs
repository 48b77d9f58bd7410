use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::config::NodeConfig;
use crate::error::{MeshError, Result};
use crate::execution::ExecutionSubsystem;
use crate::http::PeerClient;
use crate::job::{Job, JobStatus, JobStore, EXIT_CODE_KILLED, EXIT_CODE_ZOMBIE};
use crate::stats::NodeStats;

/// Governs job status transitions: INIT -> RUNNING -> one of SUCCEEDED,
/// FAILED, KILLED. Terminal states admit no further transitions.
///
/// Both finalization paths (kill and process completion) persist through
/// the store's atomic update, so a racing kill and completion cannot
/// interleave destructively; once KILLED is written it stays KILLED.
pub struct JobLifecycle {
    config: Arc<NodeConfig>,
    store: Arc<dyn JobStore>,
    executor: Arc<dyn ExecutionSubsystem>,
    peers: Arc<dyn PeerClient>,
    stats: Arc<NodeStats>,
}

impl JobLifecycle {
    pub fn new(
        config: Arc<NodeConfig>,
        store: Arc<dyn JobStore>,
        executor: Arc<dyn ExecutionSubsystem>,
        peers: Arc<dyn PeerClient>,
        stats: Arc<NodeStats>,
    ) -> Self {
        Self {
            config,
            store,
            executor,
            peers,
            stats,
        }
    }

    pub async fn get_status(&self, id: &str) -> Result<JobStatus> {
        Ok(self.store.get(id).await?.status)
    }

    /// Kill a job, forwarding to the owning node when this node is not
    /// executing it. Killing an already-finished job is an idempotent
    /// no-op that returns the current record.
    pub async fn kill(&self, id: &str) -> Result<Job> {
        let job = self.store.get(id).await?;

        if job.status.is_terminal() {
            // already exited; return current status to the caller
            return Ok(job);
        }

        if job.status == JobStatus::Init || job.process_handle.is_none() {
            return Err(MeshError::PreconditionFailed(format!(
                "job {id} is still initializing and cannot be killed yet"
            )));
        }

        let kill_uri = job.kill_uri.clone().ok_or_else(|| {
            MeshError::Internal(format!("no kill URI recorded for job {id}"))
        })?;
        let local_uri = self.config.job_uri(id);
        if kill_uri != local_uri {
            tracing::debug!(job_id = %id, kill_uri = %kill_uri, "Forwarding kill request");
            return self.peers.forward_kill(&kill_uri).await;
        }

        tracing::debug!(job_id = %id, "Killing job on this node");
        self.executor.kill(&job).await?;

        let job = self
            .store
            .update_with(
                id,
                Box::new(|j| {
                    j.set_status(JobStatus::Killed, "Job killed on user request");
                    j.exit_code = Some(EXIT_CODE_KILLED);
                    j.finished_at = Some(Utc::now());
                }),
            )
            .await?;
        self.stats.incr_killed();
        tracing::info!(job_id = %id, "Job killed");
        Ok(job)
    }

    /// Record the exit of a job's process. A KILLED job keeps its status
    /// and sentinel exit code; the kill path owns that terminal state.
    pub async fn finalize(&self, id: &str, exit_code: Option<i32>) -> Result<JobStatus> {
        let current = self.store.get(id).await?;
        if current.status.is_terminal() {
            // nothing to do; a KILLED job in particular keeps its sentinel
            // exit code and message
            return Ok(current.status);
        }

        let job = self
            .store
            .update_with(
                id,
                Box::new(move |j| {
                    // re-check under the store lock; a concurrent kill may
                    // have finalized the job first and its write wins
                    if j.status.is_terminal() {
                        return;
                    }
                    j.exit_code = exit_code;
                    j.finished_at = Some(Utc::now());
                    match exit_code {
                        Some(0) => j.set_status(
                            JobStatus::Succeeded,
                            "Job finished successfully",
                        ),
                        Some(code) => j.set_status(
                            JobStatus::Failed,
                            format!("Failed to execute job, exit code: {code}"),
                        ),
                        None => j.set_status(
                            JobStatus::Failed,
                            "Job process terminated by signal",
                        ),
                    }
                }),
            )
            .await?;

        match job.status {
            JobStatus::Succeeded => self.stats.incr_succeeded(),
            JobStatus::Failed => self.stats.incr_failed(),
            _ => {}
        }
        tracing::info!(job_id = %id, status = %job.status, exit_code = ?job.exit_code, "Job finalized");
        Ok(job.status)
    }

    /// Fail INIT/RUNNING jobs that have not been updated within the zombie
    /// window. Returns the number of jobs marked.
    pub async fn mark_zombies(&self, window: Duration) -> Result<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(window)
                .map_err(|e| MeshError::Internal(format!("invalid zombie window: {e}")))?;

        let mut marked = 0;
        for job in self.store.all().await {
            if job.status.is_terminal() || job.updated_at >= cutoff {
                continue;
            }
            let result = self
                .store
                .update_with(
                    &job.id,
                    Box::new(move |j| {
                        // re-check under the store lock; the job may have
                        // finished since the scan
                        if j.status.is_terminal() || j.updated_at >= cutoff {
                            return;
                        }
                        j.exit_code = Some(EXIT_CODE_ZOMBIE);
                        j.finished_at = Some(Utc::now());
                        j.set_status(JobStatus::Failed, "Job has been marked as a zombie");
                    }),
                )
                .await?;
            if result.status == JobStatus::Failed
                && result.exit_code == Some(EXIT_CODE_ZOMBIE)
            {
                tracing::warn!(job_id = %job.id, "Marked zombie job as failed");
                self.stats.incr_failed();
                marked += 1;
            }
        }
        Ok(marked)
    }
}
