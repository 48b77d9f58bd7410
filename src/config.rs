use std::path::PathBuf;
use std::time::Duration;

/// Admission throttling thresholds.
///
/// `forward_threshold` is expected to be below `max_running_jobs` so that a
/// busy node tries to forward work before it starts rejecting it.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Hard cap on jobs this node will run concurrently.
    pub max_running_jobs: usize,
    /// Running-job count at which submissions are auto-forwarded to an
    /// idler peer (a job is forwarded at most once).
    pub forward_threshold: usize,
    /// Upper bound on the idle-host threshold used when searching for a
    /// forwarding target.
    pub max_idle_host_threshold: usize,
    /// Subtracted from the current running-job count to derive the
    /// idle-host threshold.
    pub idle_host_threshold_delta: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_running_jobs: 30,
            forward_threshold: 20,
            max_idle_host_threshold: 10,
            idle_host_threshold_delta: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Host name peers use to reach this node. Recorded on every job this
    /// node accepts (host_name, output_uri, kill_uri).
    pub host_name: String,
    /// Port the API server listens on. All nodes in a fleet are assumed to
    /// listen on the same port.
    pub port: u16,
    /// Peer API addresses in host:port form.
    pub peers: Vec<String>,
    pub throttle: ThrottleConfig,
    /// URI prefix for the job resource, without leading or trailing slash.
    pub job_resource_prefix: String,
    /// URI prefix for job output locations.
    pub output_resource_prefix: String,
    /// Timeout applied to forwarded submissions, kills and peer load queries.
    pub forward_timeout_ms: u64,
    /// Jobs stuck in INIT/RUNNING longer than this are marked as zombies.
    pub zombie_window_ms: u64,
    /// How often the zombie janitor runs.
    pub janitor_interval_ms: u64,
    /// Optional JSON file the cluster/command catalog is loaded from at
    /// startup.
    pub catalog_path: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host_name: "localhost".to_string(),
            port: 7001,
            peers: Vec::new(),
            throttle: ThrottleConfig::default(),
            job_resource_prefix: "api/v1/jobs".to_string(),
            output_resource_prefix: "job-output".to_string(),
            forward_timeout_ms: 10_000,
            zombie_window_ms: 1_800_000,
            janitor_interval_ms: 60_000,
            catalog_path: None,
        }
    }
}

impl NodeConfig {
    pub fn new(host_name: impl Into<String>, port: u16) -> Self {
        Self {
            host_name: host_name.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_peer(mut self, addr: impl Into<String>) -> Self {
        self.peers.push(addr.into());
        self
    }

    /// Base endpoint of this node, e.g. `http://host:7001`.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.host_name, self.port)
    }

    /// Canonical job resource URI for a job id on this node. This is the
    /// URI recorded as a job's kill URI when this node accepts it.
    pub fn job_uri(&self, id: &str) -> String {
        format!("{}/{}/{}", self.endpoint(), self.job_resource_prefix, id)
    }

    pub fn output_uri(&self, id: &str) -> String {
        format!("{}/{}/{}", self.endpoint(), self.output_resource_prefix, id)
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    pub fn zombie_window(&self) -> Duration {
        Duration::from_millis(self.zombie_window_ms)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_millis(self.janitor_interval_ms)
    }
}
