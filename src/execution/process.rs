use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::balancer::ClusterLoadBalancer;
use crate::error::{MeshError, Result};
use crate::execution::{CompletionEvent, ExecutionSubsystem, LaunchOutcome};
use crate::job::Job;
use crate::resolver::Resolver;

/// Executes jobs as local child processes.
///
/// Launch resolves the job's criteria to candidate (cluster, command)
/// pairs, lets the load balancer pick the cluster, then spawns the
/// command's executable with the job's arguments. Each spawned process is
/// watched by its own task; exits are reported on the completion channel
/// the node drains into job finalization.
pub struct ProcessExecutor {
    resolver: Resolver,
    balancer: Arc<dyn ClusterLoadBalancer>,
    events: mpsc::UnboundedSender<CompletionEvent>,
    // job id -> kill signal for the watcher task owning the child
    running: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl ProcessExecutor {
    pub fn new(
        resolver: Resolver,
        balancer: Arc<dyn ClusterLoadBalancer>,
    ) -> (Self, mpsc::UnboundedReceiver<CompletionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                resolver,
                balancer,
                events,
                running: Arc::new(Mutex::new(HashMap::new())),
            },
            events_rx,
        )
    }
}

#[async_trait]
impl ExecutionSubsystem for ProcessExecutor {
    async fn launch(&self, job: &Job) -> Result<LaunchOutcome> {
        let command_criterion = job.command_criterion();
        let resolved = self
            .resolver
            .resolve(&job.cluster_criteria, &command_criterion)
            .await;
        if resolved.is_empty() {
            return Err(MeshError::PreconditionFailed(format!(
                "no cluster/command pair satisfies the criteria for job {}",
                job.id
            )));
        }

        let clusters: Vec<_> = resolved.iter().map(|(c, _)| c.clone()).collect();
        let selected_id = self.balancer.select_cluster(&clusters)?.id.clone();
        let (cluster, command) = resolved
            .into_iter()
            .find(|(c, _)| c.id == selected_id)
            .ok_or_else(|| {
                MeshError::Internal("selected cluster missing from resolved set".to_string())
            })?;

        tracing::info!(
            job_id = %job.id,
            cluster = %cluster.id,
            command = %command.id,
            executable = %command.executable,
            "Launching job"
        );

        let mut child = tokio::process::Command::new(&command.executable)
            .args(&job.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let pid = child.id().ok_or_else(|| {
            MeshError::Internal(format!("spawned process for job {} has no pid", job.id))
        })?;

        let token = CancellationToken::new();
        self.running
            .lock()
            .await
            .insert(job.id.clone(), token.clone());

        let events = self.events.clone();
        let running = self.running.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = token.cancelled() => {
                    if let Err(e) = child.start_kill() {
                        tracing::warn!(job_id = %job_id, error = %e, "Failed to signal job process");
                    }
                    child.wait().await
                }
            };
            let exit_code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Failed waiting on job process");
                    None
                }
            };
            running.lock().await.remove(&job_id);
            tracing::info!(job_id = %job_id, exit_code = ?exit_code, "Job process exited");
            let _ = events.send(CompletionEvent { job_id, exit_code });
        });

        Ok(LaunchOutcome {
            pid,
            cluster_id: cluster.id,
            cluster_name: cluster.name,
            command_id: command.id,
            command_name: command.name,
        })
    }

    async fn kill(&self, job: &Job) -> Result<()> {
        let running = self.running.lock().await;
        match running.get(&job.id) {
            Some(token) => {
                token.cancel();
                Ok(())
            }
            None => Err(MeshError::Internal(format!(
                "no live process recorded for job {}",
                job.id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::balancer::RandomLoadBalancer;
    use crate::catalog::{Catalog, Cluster, ClusterStatus, Command, CommandStatus, InMemoryCatalog};
    use crate::job::JobRequest;

    async fn catalog_with(executable: &str) -> Arc<InMemoryCatalog> {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog
            .add_command(Command {
                id: "true-1".to_string(),
                name: "true".to_string(),
                version: "1.0".to_string(),
                status: CommandStatus::Active,
                tags: BTreeSet::new(),
                executable: executable.to_string(),
                check_delay_ms: 1000,
            })
            .await;
        catalog
            .add_cluster(Cluster {
                id: "local".to_string(),
                name: "local".to_string(),
                version: "1.0".to_string(),
                status: ClusterStatus::Up,
                tags: BTreeSet::new(),
                commands: vec!["true-1".to_string()],
            })
            .await;
        catalog
    }

    fn job_for(command_name: &str) -> Job {
        let request = JobRequest {
            owner: "etl".to_string(),
            job_type: "HADOOP".to_string(),
            args: vec![],
            command_name: Some(command_name.to_string()),
            cluster_criteria: vec![Default::default()],
            ..Default::default()
        };
        let mut job = Job::from_request(&request).unwrap();
        // spawn with no arguments
        job.args = vec![];
        job
    }

    #[tokio::test]
    async fn launch_reports_completion() {
        let catalog = catalog_with("/bin/true").await;
        let resolver = Resolver::new(catalog as Arc<dyn Catalog>);
        let (executor, mut events) = ProcessExecutor::new(resolver, Arc::new(RandomLoadBalancer));

        let job = job_for("true");
        let outcome = executor.launch(&job).await.unwrap();
        assert!(outcome.pid > 0);
        assert_eq!(outcome.cluster_id, "local");
        assert_eq!(outcome.command_id, "true-1");

        let event = events.recv().await.unwrap();
        assert_eq!(event.job_id, job.id);
        assert_eq!(event.exit_code, Some(0));
    }

    #[tokio::test]
    async fn launch_fails_when_nothing_resolves() {
        let catalog = catalog_with("/bin/true").await;
        let resolver = Resolver::new(catalog as Arc<dyn Catalog>);
        let (executor, _events) = ProcessExecutor::new(resolver, Arc::new(RandomLoadBalancer));

        let job = job_for("no-such-command");
        assert!(matches!(
            executor.launch(&job).await,
            Err(MeshError::PreconditionFailed(_))
        ));
    }

    #[tokio::test]
    async fn kill_without_live_process_is_internal_error() {
        let catalog = catalog_with("/bin/true").await;
        let resolver = Resolver::new(catalog as Arc<dyn Catalog>);
        let (executor, _events) = ProcessExecutor::new(resolver, Arc::new(RandomLoadBalancer));

        let job = job_for("true");
        assert!(matches!(
            executor.kill(&job).await,
            Err(MeshError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn kill_terminates_running_process() {
        let catalog = catalog_with("/bin/sleep").await;
        let resolver = Resolver::new(catalog as Arc<dyn Catalog>);
        let (executor, mut events) = ProcessExecutor::new(resolver, Arc::new(RandomLoadBalancer));

        let mut job = job_for("true");
        job.args = vec!["30".to_string()];
        executor.launch(&job).await.unwrap();

        executor.kill(&job).await.unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.job_id, job.id);
        // killed by signal, no exit code
        assert_eq!(event.exit_code, None);
    }
}
