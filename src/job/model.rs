use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::Criterion;
use crate::error::{MeshError, Result};

/// Exit code recorded when a job is killed on user request.
pub const EXIT_CODE_KILLED: i32 = 211;
/// Exit code recorded when the janitor marks a stuck job as a zombie.
pub const EXIT_CODE_ZOMBIE: i32 = 212;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Init,
    Running,
    Succeeded,
    Failed,
    Killed,
}

impl JobStatus {
    /// Parse a client-supplied status string. Unrecognized values are an
    /// invalid request, not a silent default.
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "INIT" => Ok(JobStatus::Init),
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCEEDED" => Ok(JobStatus::Succeeded),
            "FAILED" => Ok(JobStatus::Failed),
            "KILLED" => Ok(JobStatus::Killed),
            other => Err(MeshError::InvalidRequest(format!(
                "unknown job status: {other}"
            ))),
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Killed
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Init => write!(f, "INIT"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Succeeded => write!(f, "SUCCEEDED"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::Killed => write!(f, "KILLED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    Hadoop,
    Hive,
    Pig,
}

impl JobType {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "HADOOP" => Ok(JobType::Hadoop),
            "HIVE" => Ok(JobType::Hive),
            "PIG" => Ok(JobType::Pig),
            other => Err(MeshError::InvalidRequest(format!(
                "unknown job type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobType::Hadoop => write!(f, "HADOOP"),
            JobType::Hive => write!(f, "HIVE"),
            JobType::Pig => write!(f, "PIG"),
        }
    }
}

/// A client job submission. The job type travels as a string and is
/// validated into [`JobType`] at the boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequest {
    /// Optional client-supplied id; the server assigns a UUID when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub owner: String,
    pub job_type: String,
    pub args: Vec<String>,
    #[serde(default)]
    pub command_id: Option<String>,
    #[serde(default)]
    pub command_name: Option<String>,
    #[serde(default)]
    pub command_tags: BTreeSet<String>,
    /// Ordered cluster selection criteria; earlier entries are preferred.
    #[serde(default)]
    pub cluster_criteria: Vec<Criterion>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Set by the node that auto-forwards this submission; a forwarded job
    /// is never forwarded a second time.
    #[serde(default)]
    pub forwarded: bool,
}

impl JobRequest {
    pub fn validate(&self) -> Result<()> {
        let has_command_id = self
            .command_id
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty());
        let has_command_name = self
            .command_name
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty());
        if !has_command_id && !has_command_name {
            return Err(MeshError::InvalidRequest(
                "either command_id or command_name is required".to_string(),
            ));
        }
        if self.owner.trim().is_empty() {
            return Err(MeshError::InvalidRequest(
                "owner is required".to_string(),
            ));
        }
        if self.args.is_empty() {
            return Err(MeshError::InvalidRequest(
                "command arguments are required".to_string(),
            ));
        }
        JobType::parse(&self.job_type)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: Option<String>,
    pub owner: String,
    pub job_type: JobType,
    pub args: Vec<String>,
    pub command_id: Option<String>,
    pub command_name: Option<String>,
    pub command_tags: BTreeSet<String>,
    pub cluster_criteria: Vec<Criterion>,
    pub tags: BTreeSet<String>,
    pub status: JobStatus,
    pub status_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub host_name: Option<String>,
    pub output_uri: Option<String>,
    pub kill_uri: Option<String>,
    pub forwarded: bool,
    pub exit_code: Option<i32>,
    /// Pid of the launched process; absent until execution starts.
    pub process_handle: Option<u32>,
    pub execution_cluster_id: Option<String>,
    pub execution_cluster_name: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Build a job from a validated request, assigning an id when the
    /// client did not supply one.
    pub fn from_request(request: &JobRequest) -> Result<Self> {
        let job_type = JobType::parse(&request.job_type)?;
        let id = match request.id.as_deref() {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        let now = Utc::now();
        Ok(Self {
            id,
            name: request.name.clone(),
            owner: request.owner.clone(),
            job_type,
            args: request.args.clone(),
            command_id: request.command_id.clone(),
            command_name: request.command_name.clone(),
            command_tags: request.command_tags.clone(),
            cluster_criteria: request.cluster_criteria.clone(),
            tags: request.tags.clone(),
            status: JobStatus::Init,
            status_message: "Initializing job".to_string(),
            created_at: now,
            updated_at: now,
            host_name: None,
            output_uri: None,
            kill_uri: None,
            forwarded: request.forwarded,
            exit_code: None,
            process_handle: None,
            execution_cluster_id: None,
            execution_cluster_name: None,
            started_at: None,
            finished_at: None,
        })
    }

    /// Set status and message together, bumping the update time.
    pub fn set_status(&mut self, status: JobStatus, message: impl Into<String>) {
        self.status = status;
        self.status_message = message.into();
        self.updated_at = Utc::now();
    }

    /// The command criterion this job's submission implies, evaluated
    /// against the commands attached to a matched cluster.
    pub fn command_criterion(&self) -> Criterion {
        Criterion {
            id: self.command_id.clone(),
            name: self.command_name.clone(),
            version: None,
            status: None,
            tags: self.command_tags.clone(),
        }
    }
}
