use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use raas_lite::api::types::{
    JobResponse, JobResultsRequest, JobsViewResponse, SubmitJobRequest,
};
use raas_lite::client::RaasClient;
use raas_lite::config::{AuthConfig, RaasConfig};
use raas_lite::server::RaasServer;
use raas_lite::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "raas-lite")]
#[command(version)]
#[command(about = "Job coordinator for a pool of remote robotics test rigs")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the coordinator
    Server(ServerArgs),

    /// Job management commands
    Job {
        #[command(flatten)]
        client: ClientArgs,

        #[command(subcommand)]
        command: JobCommands,
    },

    /// Hardware commands
    Hardware {
        #[command(flatten)]
        client: ClientArgs,

        #[command(subcommand)]
        command: HardwareCommands,
    },
}

// =============================================================================
// Server Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServerArgs {
    /// Address to serve the HTTP API on
    #[arg(long, env = "RAAS_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Hardware roster (comma-separated)
    #[arg(
        long,
        env = "RAAS_HARDWARE",
        value_delimiter = ',',
        default_value = "Beth,Goose,Nicki,Omar"
    )]
    hardware: Vec<String>,

    /// A rig counts as online this long after its last poll or heartbeat
    #[arg(long, env = "RAAS_LIVENESS_TIMEOUT_MS", default_value = "10000")]
    liveness_timeout_ms: u64,

    /// Maximum staleness of job listings
    #[arg(long, env = "RAAS_CACHE_WINDOW_MS", default_value = "1000")]
    cache_window_ms: u64,

    /// Completed jobs kept in memory
    #[arg(long, env = "RAAS_HISTORY_CAPACITY", default_value = "20")]
    history_capacity: usize,

    /// JSON file for the job store (in-memory if omitted)
    #[arg(long, env = "RAAS_STORE")]
    store: Option<PathBuf>,

    /// Shared secret required by dispatch, results, heartbeat and reset
    #[arg(long, env = "RAAS_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Caller addresses allowed on those routes (comma-separated)
    #[arg(long, env = "RAAS_ALLOW_IPS", value_delimiter = ',')]
    allow_ip: Vec<IpAddr>,
}

// =============================================================================
// Client Arguments (shared by job and hardware commands)
// =============================================================================

#[derive(Parser, Debug)]
struct ClientArgs {
    /// Server address
    #[arg(long, short = 'a', env = "RAAS_ADDR", default_value = "http://127.0.0.1:8080")]
    addr: String,

    /// Shared secret for privileged commands
    #[arg(long, env = "RAAS_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(clap::Subcommand, Debug)]
enum JobCommands {
    /// Submit a new job
    Submit {
        /// Submitting user
        #[arg(long)]
        user: String,
        /// Project name
        #[arg(long)]
        project: String,
        /// Source repository URL
        #[arg(long)]
        url: String,
    },
    /// Show a single job
    Status {
        /// The job ID (UUID)
        job_id: String,
    },
    /// List queued, running and recently completed jobs
    List,
    /// Claim the next job for a rig
    Pop {
        /// Rig name
        #[arg(long)]
        hardware: String,
    },
    /// Report results for a running job
    Report {
        /// The job ID (UUID)
        job_id: String,
        /// Captured output
        #[arg(long, default_value = "")]
        stdout: String,
        /// Result data as JSON
        #[arg(long)]
        data: Option<String>,
        /// Mark the job as failed
        #[arg(long)]
        failed: bool,
    },
}

#[derive(clap::Subcommand, Debug)]
enum HardwareCommands {
    /// Show rig liveness
    Status,
    /// Send a heartbeat for a rig
    Heartbeat {
        /// Rig name
        name: String,
    },
}

// =============================================================================
// Server Implementation
// =============================================================================

async fn run_server(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RaasConfig {
        listen_addr: args.bind,
        hardware: args.hardware,
        liveness_timeout_ms: args.liveness_timeout_ms,
        cache_window_ms: args.cache_window_ms,
        history_capacity: args.history_capacity,
        store_path: args.store,
        auth: AuthConfig {
            shared_secret: args.secret,
            allowed_ips: args.allow_ip,
        },
    };

    let shutdown = CancellationToken::new();
    install_shutdown_handler(shutdown.clone());

    let server = RaasServer::new(config).await?;
    server.run(shutdown).await?;
    Ok(())
}

// =============================================================================
// Client Command Handlers
// =============================================================================

fn print_job(job: &JobResponse) {
    println!("Job ID:     {}", job.id);
    println!("Status:     {}", job.status);
    println!("User:       {}", job.user);
    println!("Project:    {}", job.project_name);
    println!("Source:     {}", job.source_url);
    if let Some(hw) = &job.hardware_name {
        println!("Hardware:   {}", hw);
    }
    println!("Submitted:  {}", job.submit_time);
    if let Some(t) = job.start_time {
        println!("Started:    {}", t);
    }
    if let Some(t) = job.end_time {
        println!("Ended:      {}", t);
    }
    if let Some(output) = &job.output {
        println!("Output:");
        for line in output.lines() {
            println!("  {}", line);
        }
    }
}

/// An empty queue renders as `null` so scripts always get JSON back.
fn popped_json(job: Option<&JobResponse>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&job)
}

fn print_jobs_table(view: &JobsViewResponse) {
    if view.queued.is_empty() && view.running.is_empty() && view.completed.is_empty() {
        println!("No jobs found.");
        return;
    }

    println!(
        "{:<38} {:<10} {:<12} {:<10} PROJECT",
        "JOB ID", "STATUS", "USER", "HARDWARE"
    );
    println!("{}", "-".repeat(90));
    for job in view
        .queued
        .iter()
        .chain(view.running.iter())
        .chain(view.completed.iter())
    {
        let hw = job.hardware_name.as_deref().unwrap_or("-");
        println!(
            "{:<38} {:<10} {:<12} {:<10} {}",
            job.id, job.status, job.user, hw, job.project_name
        );
    }
    println!();
    println!(
        "{} queued, {} running, {} recently completed",
        view.queued.len(),
        view.running.len(),
        view.completed.len()
    );
}

async fn handle_job(
    client: &RaasClient,
    command: JobCommands,
    output: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        JobCommands::Submit { user, project, url } => {
            let resp = client
                .submit(&SubmitJobRequest {
                    user,
                    project_name: project,
                    source_url: url,
                })
                .await?;
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resp)?),
                OutputFormat::Table if resp.duplicate => {
                    println!("Project already queued or running.");
                    println!("Job ID: {}", resp.job_id);
                }
                OutputFormat::Table => {
                    println!("Job submitted successfully!");
                    println!("Job ID: {}", resp.job_id);
                }
            }
        }
        JobCommands::Status { job_id } => {
            let job = client.job(&job_id).await?;
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&job)?),
                OutputFormat::Table => print_job(&job),
            }
        }
        JobCommands::List => {
            let view = client.list().await?;
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
                OutputFormat::Table => print_jobs_table(&view),
            }
        }
        JobCommands::Pop { hardware } => {
            let job = client.pop(&hardware).await?;
            match (output, &job) {
                (OutputFormat::Json, _) => println!("{}", popped_json(job.as_ref())?),
                (OutputFormat::Table, Some(job)) => print_job(job),
                (OutputFormat::Table, None) => println!("No job available."),
            }
        }
        JobCommands::Report {
            job_id,
            stdout,
            data,
            failed,
        } => {
            let data = data.map(|d| serde_json::from_str(&d)).transpose()?;
            let resp = client
                .report(&job_id, &JobResultsRequest { stdout, data, failed })
                .await?;
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resp)?),
                OutputFormat::Table => println!("Job {} is now {}", resp.job_id, resp.status),
            }
        }
    }
    Ok(())
}

async fn handle_hardware(
    client: &RaasClient,
    command: HardwareCommands,
    output: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        HardwareCommands::Status => {
            let statuses = client.hardware().await?;
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&statuses)?),
                OutputFormat::Table => {
                    println!("{:<20} STATUS", "NAME");
                    println!("{}", "-".repeat(30));
                    for hw in statuses {
                        let icon = if hw.status == "ONLINE" { "[+]" } else { "[-]" };
                        println!("{:<20} {} {}", hw.name, icon, hw.status);
                    }
                }
            }
        }
        HardwareCommands::Heartbeat { name } => {
            client.heartbeat(&name).await?;
            println!("Heartbeat recorded for {}", name);
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Server(server_args) => {
            run_server(server_args).await?;
        }
        Commands::Job { client, command } => {
            let raas = RaasClient::new(client.addr, client.secret);
            handle_job(&raas, command, &client.output).await?;
        }
        Commands::Hardware { client, command } => {
            let raas = RaasClient::new(client.addr, client.secret);
            handle_hardware(&raas, command, &client.output).await?;
        }
    }

    Ok(())
}
