//! NeoSec CLI - declarative security tool orchestration from the terminal
//!
//! Exit codes:
//! - `0` — every task succeeded
//! - `1` — partial failure (some task did not succeed)
//! - `2` — configuration or validation error
//! - `130` — cancelled by user signal

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;

use neosec_adapters::NmapAdapter;
use neosec_core::config::GlobalConfig;
use neosec_core::init_tracing;
use neosec_orchestrator::{ExtensionBus, ScanEngine};

const EXIT_PARTIAL: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

/// NeoSec - orchestrate external security tools through declarative workflows
#[derive(Parser, Debug)]
#[command(
    name = "neosec",
    version,
    about = "Declarative orchestration of external security-testing tools",
    long_about = "NeoSec runs workflows of external security tools (scanners, fuzzers, \
                  probers) as a dependency graph, normalizes their output into a single \
                  asset/vulnerability model, and writes a consolidated JSON report."
)]
struct Cli {
    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a workflow against a target
    #[command(visible_alias = "s")]
    Scan(commands::scan::ScanArgs),

    /// List registered tool adapters
    #[command(name = "list-tools", visible_alias = "ls")]
    ListTools(commands::tools::ListToolsArgs),

    /// Verify that every registered adapter's binaries are present
    Validate,

    /// Write a default configuration file
    #[command(name = "init-config")]
    InitConfig(commands::init::InitConfigArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let _ = init_tracing(level);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // init-config must work before any config file exists.
    if let Commands::InitConfig(args) = &cli.command {
        return commands::init::run(args);
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Commands::Scan(args) = &cli.command {
        if let Some(dir) = &args.output_dir {
            config.data_dir = dir.clone();
        }
    }
    let engine = build_engine(config)?;

    match cli.command {
        Commands::Scan(args) => commands::scan::run(&engine, args).await,
        Commands::ListTools(args) => commands::tools::run(&engine, &args),
        Commands::Validate => commands::validate::run(&engine),
        Commands::InitConfig(_) => unreachable!("handled above"),
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<GlobalConfig> {
    match path {
        Some(path) => GlobalConfig::load(path)
            .map_err(|err| anyhow::anyhow!("cannot load config {}: {err}", path.display())),
        None => {
            let default_path = std::path::Path::new("neosec.toml");
            if default_path.exists() {
                GlobalConfig::load(default_path)
                    .map_err(|err| anyhow::anyhow!("cannot load neosec.toml: {err}"))
            } else {
                Ok(GlobalConfig::default())
            }
        }
    }
}

fn build_engine(config: GlobalConfig) -> anyhow::Result<ScanEngine> {
    let mut bus = ExtensionBus::new();
    bus.register_adapter(Arc::new(NmapAdapter::new()))
        .map_err(|err| anyhow::anyhow!("adapter registration failed: {err}"))?;

    Ok(ScanEngine::new(Arc::new(bus), Arc::new(config)))
}
