pub mod process;

use async_trait::async_trait;

use crate::error::Result;
use crate::job::Job;

pub use process::ProcessExecutor;

/// Where and what a launched job is running.
#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    pub pid: u32,
    pub cluster_id: String,
    pub cluster_name: String,
    pub command_id: String,
    pub command_name: String,
}

/// Emitted when a launched job's process exits. `exit_code` is absent when
/// the process was terminated by a signal.
#[derive(Debug, Clone)]
pub struct CompletionEvent {
    pub job_id: String,
    pub exit_code: Option<i32>,
}

/// The subsystem that actually runs jobs.
#[async_trait]
pub trait ExecutionSubsystem: Send + Sync {
    /// Start executing an accepted job. Returns where it runs and its pid.
    async fn launch(&self, job: &Job) -> Result<LaunchOutcome>;

    /// Ask the subsystem to terminate a job's process. Does not mutate job
    /// state; the caller owns the status transition.
    async fn kill(&self, job: &Job) -> Result<()>;
}
