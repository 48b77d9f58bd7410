use std::path::PathBuf;

use clap::Parser;
use reqwest::header;
use tracing_subscriber::EnvFilter;

use jobmesh::catalog::Criterion;
use jobmesh::config::{NodeConfig, ThrottleConfig};
use jobmesh::http::ErrorBody;
use jobmesh::job::{Job, JobRequest};
use jobmesh::node::Node;

#[derive(Parser, Debug)]
#[command(name = "jobmesh")]
#[command(version)]
#[command(about = "A distributed job submission and orchestration service")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start a jobmesh server node
    Server(ServerArgs),

    /// Job management commands
    Job {
        #[command(flatten)]
        client: ClientArgs,

        #[command(subcommand)]
        command: JobCommands,
    },
}

#[derive(Parser, Debug)]
struct ServerArgs {
    /// Host name peers use to reach this node
    #[arg(long, default_value = "localhost")]
    host_name: String,

    /// Port the API server listens on
    #[arg(long, default_value = "7001")]
    port: u16,

    /// Peer API addresses (comma-separated, host:port)
    /// Example: "node-b:7001,node-c:7001"
    #[arg(long, default_value = "")]
    peers: String,

    /// Hard cap on concurrently running jobs on this node
    #[arg(long, default_value = "30")]
    max_running_jobs: usize,

    /// Running-job count at which submissions are forwarded to idler peers
    #[arg(long, default_value = "20")]
    forward_threshold: usize,

    /// Upper bound on the idle-host search threshold
    #[arg(long, default_value = "10")]
    max_idle_host_threshold: usize,

    /// Subtracted from the running count to derive the idle-host threshold
    #[arg(long, default_value = "5")]
    idle_host_threshold_delta: usize,

    /// JSON file holding the cluster/command catalog
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ClientArgs {
    /// Server address
    #[arg(long, short = 'a', default_value = "http://127.0.0.1:7001")]
    addr: String,
}

#[derive(clap::Subcommand, Debug)]
enum JobCommands {
    /// Submit a new job
    Submit {
        /// Job owner
        #[arg(long)]
        owner: String,

        /// Job type (HADOOP, HIVE or PIG)
        #[arg(long)]
        job_type: String,

        /// Command name to run, e.g. "pig"
        #[arg(long)]
        command_name: Option<String>,

        /// Command id to run
        #[arg(long)]
        command_id: Option<String>,

        /// Tags the selected cluster must carry (repeatable); each use of
        /// this flag adds one criterion in preference order
        #[arg(long = "cluster-tag")]
        cluster_tags: Vec<String>,

        /// Arguments passed to the command executable
        args: Vec<String>,
    },
    /// Get a job record
    Get { job_id: String },
    /// Get the status of a job
    Status { job_id: String },
    /// Kill a job
    Kill { job_id: String },
    /// List all jobs on the node
    List,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let result = match args.command {
        Commands::Server(server) => run_server(server).await,
        Commands::Job { client, command } => run_job_command(client, command).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_server(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let peers: Vec<String> = args
        .peers
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    let config = NodeConfig {
        host_name: args.host_name,
        port: args.port,
        peers,
        throttle: ThrottleConfig {
            max_running_jobs: args.max_running_jobs,
            forward_threshold: args.forward_threshold,
            max_idle_host_threshold: args.max_idle_host_threshold,
            idle_host_threshold_delta: args.idle_host_threshold_delta,
        },
        catalog_path: args.catalog,
        ..Default::default()
    };

    let node = Node::new(config)?;
    node.run().await?;
    Ok(())
}

async fn run_job_command(
    client: ClientArgs,
    command: JobCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    let http = reqwest::Client::new();
    let base = format!("{}/api/v1/jobs", client.addr.trim_end_matches('/'));

    match command {
        JobCommands::Submit {
            owner,
            job_type,
            command_name,
            command_id,
            cluster_tags,
            args,
        } => {
            let cluster_criteria = if cluster_tags.is_empty() {
                vec![Criterion::default()]
            } else {
                cluster_tags
                    .into_iter()
                    .map(|tag| Criterion::with_tags([tag]))
                    .collect()
            };
            let request = JobRequest {
                owner,
                job_type,
                args,
                command_name,
                command_id,
                cluster_criteria,
                ..Default::default()
            };
            let response = http
                .post(&base)
                .header(header::ACCEPT, "application/json")
                .json(&request)
                .send()
                .await?;
            print_job_response(response).await
        }
        JobCommands::Get { job_id } => {
            let response = http
                .get(format!("{base}/{job_id}"))
                .header(header::ACCEPT, "application/json")
                .send()
                .await?;
            print_job_response(response).await
        }
        JobCommands::Status { job_id } => {
            let response = http
                .get(format!("{base}/{job_id}/status"))
                .header(header::ACCEPT, "application/json")
                .send()
                .await?;
            let body: serde_json::Value = check(response).await?.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        JobCommands::Kill { job_id } => {
            let response = http
                .delete(format!("{base}/{job_id}"))
                .header(header::ACCEPT, "application/json")
                .send()
                .await?;
            print_job_response(response).await
        }
        JobCommands::List => {
            let response = http
                .get(&base)
                .header(header::ACCEPT, "application/json")
                .send()
                .await?;
            let jobs: Vec<Job> = check(response).await?.json().await?;
            if jobs.is_empty() {
                println!("No jobs");
                return Ok(());
            }
            for job in jobs {
                println!(
                    "{}  {:<9}  owner={}  {}",
                    job.id, job.status, job.owner, job.status_message
                );
            }
            Ok(())
        }
    }
}

async fn check(
    response: reqwest::Response,
) -> Result<reqwest::Response, Box<dyn std::error::Error>> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let message = response
        .json::<ErrorBody>()
        .await
        .map(|b| b.message)
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(format!("{status}: {message}").into())
}

async fn print_job_response(
    response: reqwest::Response,
) -> Result<(), Box<dyn std::error::Error>> {
    let job: Job = check(response).await?.json().await?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}
