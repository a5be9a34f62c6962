//! sluice CLI - queue dispatcher and cron heartbeat runner.
//!
//! # Commands
//!
//! - `sluice process-queue [QUEUE]` - Drain a queue until the cap or the kill-sentinel
//! - `sluice run-cron` - Run one cron scheduler tick
//! - `sluice enqueue QUEUE WORKER` - Persist a message
//! - `sluice stop-queue` - Ask a running dispatcher to stop
//! - `sluice cron-add TITLE SCHEDULE CALLABLE` - Define a cron task
//! - `sluice cron-list` - List cron tasks and the latest run
//! - `sluice heartbeat` - Exit non-zero when cron has not run recently

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod error;
mod runtime;

use commands::{cron, queue};
use error::CliResult;
use runtime::{Overrides, Runtime};

/// sluice - durable work queue and cron heartbeat
#[derive(Parser)]
#[command(name = "sluice")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(about = "Durable work queue dispatcher and cron heartbeat runner")]
#[command(propagate_version = true)]
#[command(after_help = format!(
    "{}\n  {} sluice process-queue mail --max-executions 500\n  {} sluice stop-queue\n  {} sluice cron-add heartbeat '* * * * *' heartbeat_pulse\n  {} sluice heartbeat --max-age-secs 180",
    "Examples:".bright_cyan().bold(),
    "$".dimmed(),
    "$".dimmed(),
    "$".dimmed(),
    "$".dimmed(),
))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, JSON or .env)
    #[arg(short, long, global = true, env = "SLUICE_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL, overriding the configuration
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Directory for the lock file and the kill-sentinel
    #[arg(long, global = true)]
    runtime_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Drain a queue until the execution cap or the kill-sentinel
    #[command(alias = "work")]
    ProcessQueue(ProcessQueueArgs),

    /// Run one cron scheduler tick
    RunCron,

    /// Persist a message for a worker
    Enqueue {
        /// Queue name
        queue: String,

        /// Worker key
        worker: String,

        /// JSON payload
        #[arg(long, default_value = "{}")]
        payload: String,
    },

    /// Ask a running dispatcher to stop at its next tick
    StopQueue,

    /// Define a cron task
    CronAdd {
        title: String,

        /// Cron expression, e.g. '*/5 * * * *'
        schedule: String,

        /// Callable name
        callable: String,

        /// Store the task disabled
        #[arg(long)]
        inactive: bool,
    },

    /// List cron tasks and the latest run
    CronList,

    /// Exit with status 1 when cron has not run within the max age
    Heartbeat {
        #[arg(long, default_value_t = 120)]
        max_age_secs: u64,
    },
}

#[derive(Args)]
struct ProcessQueueArgs {
    /// Queue to drain (every queue when omitted)
    queue: Option<String>,

    /// Tick cap for this run
    #[arg(long)]
    max_executions: Option<u64>,

    /// Pause between ticks in milliseconds
    #[arg(long)]
    sleep_ms: Option<u64>,
}

async fn execute(cli: Cli) -> CliResult<()> {
    let rt = Runtime::load(Overrides {
        config_file: cli.config,
        database_url: cli.database_url,
        runtime_dir: cli.runtime_dir,
    })?;

    match cli.command {
        Commands::ProcessQueue(args) => {
            queue::process(
                &rt,
                queue::ProcessOptions {
                    queue: args.queue,
                    max_executions: args.max_executions,
                    sleep_ms: args.sleep_ms,
                },
            )
            .await
        }
        Commands::RunCron => cron::run(&rt).await,
        Commands::Enqueue {
            queue: name,
            worker,
            payload,
        } => queue::enqueue(&rt, &name, &worker, &payload).await,
        Commands::StopQueue => queue::stop(&rt),
        Commands::CronAdd {
            title,
            schedule,
            callable,
            inactive,
        } => cron::add(&rt, &title, &schedule, &callable, inactive).await,
        Commands::CronList => cron::list(&rt).await,
        Commands::Heartbeat { max_age_secs } => cron::heartbeat(&rt, max_age_secs).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    sluice_log::init();
    if cli.verbose {
        sluice_log::set_level(sluice_log::Level::Debug);
    }
    let _ = tracing::subscriber::set_global_default(sluice_log::tracing_compat::subscriber());

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n  {} {}", "Error:".red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("  {} {}", "Hint:".yellow(), hint);
            }
            eprintln!();
            ExitCode::FAILURE
        }
    }
}
