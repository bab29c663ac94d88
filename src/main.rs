use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "baton")]
#[command(version, about = "Reboot-surviving test plan orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Path to the plan file. If not provided, checks .baton/plan.json then
    /// plans/*plan*.json
    #[arg(long, global = true)]
    pub plan_file: Option<PathBuf>,

    /// Reboot command to issue when a step requests one. Overrides the
    /// BATON_REBOOT_CMD environment variable.
    #[arg(long, global = true)]
    pub reboot_cmd: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a new run, or resume the persisted one after a reboot
    Run,
    /// Show the persisted run state
    Status,
    /// List phases and steps of the active plan
    List,
    /// Delete persisted run state
    Reset {
        #[arg(long)]
        force: bool,
    },
    /// Print the reboot request marker; meant to be called from step scripts
    RequestReboot,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };

    match &cli.command {
        Commands::Run => cmd::run::run_plan(&cli, project_dir).await,
        Commands::Status => cmd::status::show_status(project_dir),
        Commands::List => cmd::status::list_plan(&cli, project_dir),
        Commands::Reset { force } => cmd::status::reset_state(project_dir, *force),
        Commands::RequestReboot => {
            cmd::status::print_reboot_request();
            Ok(())
        }
    }
}
