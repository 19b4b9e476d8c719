use anyhow::Result;
use clap::{Parser, Subcommand};
use hireloop_common::observability::{init_logging, LogConfig};
use hireloop_common::HireloopError;
use hireloop_config::{HireloopConfigLoader, RunConfig};
use hireloop_engine::{HistoryStore, Outcome};
use session::Session;
use std::path::PathBuf;
use std::process::ExitCode;
mod session;

#[derive(Parser)]
#[command(name = "hireloop", version, about = "Search job postings and apply through Easy Apply")]
struct Cli {
    /// Configuration file (YAML); HIRELOOP__* variables override it.
    #[arg(short, long, env = "HIRELOOP_CONFIG", default_value = "hireloop.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Search and apply until a stop condition is reached.
    Run,
    /// Print recorded outcomes as JSON lines.
    History {
        /// Only records with this outcome (submitted, rejected, failed, paused_for_review).
        #[arg(long)]
        outcome: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 1) Load config (env wins)
    let config = match HireloopConfigLoader::new().with_file(&cli.config).load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", HireloopError::Config(err.to_string()));
            return ExitCode::from(2);
        }
    };

    // 2) Logging, as configured
    if let Err(err) = init_logging(log_config(&config)) {
        eprintln!("failed to initialise logging: {err:#}");
        return ExitCode::from(2);
    }

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::History { outcome } => history(config, outcome.as_deref()).await,
    };
    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!(error = %err, "app.failed");
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: RunConfig) -> Result<u8> {
    let report = Session::build(config).await?.run().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(u8::try_from(report.exit_code()).unwrap_or(1))
}

async fn history(config: RunConfig, outcome: Option<&str>) -> Result<u8> {
    let outcome: Option<Outcome> = outcome.map(str::parse).transpose()?;
    let store = HistoryStore::open(&config.storage.database_path).await?;
    for record in store.records(outcome).await? {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(0)
}

fn log_config(config: &RunConfig) -> LogConfig {
    LogConfig {
        log_dir: config.logging.dir.clone(),
        emit_stderr: config.logging.stderr,
        format: config.logging.format,
        default_filter: config.logging.filter.clone(),
        ..LogConfig::default()
    }
}
