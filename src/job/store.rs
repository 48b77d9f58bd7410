use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{MeshError, Result};
use crate::job::model::{Job, JobStatus};

/// Persistence contract for job records.
///
/// `update_with` applies a mutation atomically with respect to every other
/// update on the same store: the read-modify-write runs under the store's
/// writer lock, so a kill-triggered finalization and a completion-triggered
/// one cannot interleave destructively. Last writer wins.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a job keyed by id. Fails with `Conflict` if the id exists.
    async fn insert_if_absent(&self, job: Job) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Job>;

    /// Atomic read-modify-write of one job record. Returns the updated job.
    async fn update_with(
        &self,
        id: &str,
        mutate: Box<dyn for<'a> FnOnce(&'a mut Job) + Send>,
    ) -> Result<Job>;

    /// All jobs, oldest first.
    async fn all(&self) -> Vec<Job>;

    /// Number of jobs currently in INIT or RUNNING state.
    async fn count_active(&self) -> usize;
}

/// In-memory job store backing a single node.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert_if_absent(&self, job: Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(MeshError::Conflict(format!(
                "job already exists for id {}",
                job.id
            )));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Job> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| MeshError::NotFound(format!("no job exists for id {id}")))
    }

    async fn update_with(
        &self,
        id: &str,
        mutate: Box<dyn for<'a> FnOnce(&'a mut Job) + Send>,
    ) -> Result<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| MeshError::NotFound(format!("no job exists for id {id}")))?;
        mutate(job);
        Ok(job.clone())
    }

    async fn all(&self) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        all.sort_by_key(|j| j.created_at);
        all
    }

    async fn count_active(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| matches!(j.status, JobStatus::Init | JobStatus::Running))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::model::JobRequest;

    fn job(id: &str) -> Job {
        let request = JobRequest {
            id: Some(id.to_string()),
            owner: "etl".to_string(),
            job_type: "PIG".to_string(),
            args: vec!["script.pig".to_string()],
            command_name: Some("pig".to_string()),
            ..Default::default()
        };
        Job::from_request(&request).unwrap()
    }

    #[tokio::test]
    async fn insert_then_get() {
        let store = InMemoryJobStore::new();
        store.insert_if_absent(job("a")).await.unwrap();
        let fetched = store.get("a").await.unwrap();
        assert_eq!(fetched.id, "a");
        assert_eq!(fetched.status, JobStatus::Init);
    }

    #[tokio::test]
    async fn insert_duplicate_id_conflicts() {
        let store = InMemoryJobStore::new();
        store.insert_if_absent(job("a")).await.unwrap();
        assert!(matches!(
            store.insert_if_absent(job("a")).await,
            Err(MeshError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let store = InMemoryJobStore::new();
        assert!(matches!(
            store.get("missing").await,
            Err(MeshError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_with_mutates_and_returns() {
        let store = InMemoryJobStore::new();
        store.insert_if_absent(job("a")).await.unwrap();
        let updated = store
            .update_with(
                "a",
                Box::new(|j| j.set_status(JobStatus::Running, "Job is running")),
            )
            .await
            .unwrap();
        assert_eq!(updated.status, JobStatus::Running);
        assert_eq!(store.get("a").await.unwrap().status, JobStatus::Running);
    }

    #[tokio::test]
    async fn update_with_unknown_is_not_found() {
        let store = InMemoryJobStore::new();
        let result = store.update_with("missing", Box::new(|_| {})).await;
        assert!(matches!(result, Err(MeshError::NotFound(_))));
    }

    #[tokio::test]
    async fn count_active_tracks_init_and_running_only() {
        let store = InMemoryJobStore::new();
        store.insert_if_absent(job("a")).await.unwrap();
        store.insert_if_absent(job("b")).await.unwrap();
        store.insert_if_absent(job("c")).await.unwrap();
        assert_eq!(store.count_active().await, 3);

        store
            .update_with(
                "a",
                Box::new(|j| j.set_status(JobStatus::Running, "Job is running")),
            )
            .await
            .unwrap();
        assert_eq!(store.count_active().await, 3);

        store
            .update_with(
                "b",
                Box::new(|j| j.set_status(JobStatus::Succeeded, "done")),
            )
            .await
            .unwrap();
        assert_eq!(store.count_active().await, 2);
    }

    #[tokio::test]
    async fn all_is_sorted_by_creation_time() {
        let store = InMemoryJobStore::new();
        store.insert_if_absent(job("first")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        store.insert_if_absent(job("second")).await.unwrap();
        let all = store.all().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "first");
        assert_eq!(all[1].id, "second");
    }
}
