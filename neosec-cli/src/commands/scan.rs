//! `neosec scan` - run a workflow against a target

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use neosec_core::domain::scan::RunStatus;
use neosec_core::WorkflowSpec;
use neosec_orchestrator::ScanEngine;

use crate::{EXIT_CANCELLED, EXIT_CONFIG, EXIT_PARTIAL};

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Scan target: IP, CIDR, hostname, or URL
    #[arg(short, long)]
    pub target: String,

    /// Workflow YAML file
    #[arg(short, long)]
    pub workflow: PathBuf,

    /// Output directory for raw captures and the report
    #[arg(short, long = "out-dir")]
    pub output_dir: Option<PathBuf>,
}

pub async fn run(engine: &ScanEngine, args: ScanArgs) -> anyhow::Result<ExitCode> {
    let workflow = match WorkflowSpec::load(&args.workflow) {
        Ok(workflow) => workflow,
        Err(err) => {
            eprintln!("workflow rejected: {err}");
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };

    // Ctrl-C cancels the run cooperatively; a second Ctrl-C kills the
    // process the usual way.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            signal_cancel.cancel();
        }
    });

    let result = match engine.run(&workflow, &args.target, cancel).await {
        Ok(result) => result,
        Err(err) => {
            eprintln!("run rejected: {err}");
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };

    println!(
        "run {} finished: {} task(s), {} asset bundle(s), {} finding(s)",
        result.run_id,
        result.tasks.len(),
        result.assets.len(),
        result.vulnerabilities.len()
    );
    for task in &result.tasks {
        let duration = task
            .duration_ms()
            .map(|ms| format!("{ms} ms"))
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<20} {:<10} {}", task.task_id, task.state.to_string(), duration);
    }
    if let Some(severity) = result.max_severity() {
        info!(max_severity = %severity, "highest finding severity");
    }

    Ok(match result.status {
        RunStatus::Succeeded => ExitCode::SUCCESS,
        RunStatus::Cancelled => ExitCode::from(EXIT_CANCELLED),
        RunStatus::PartialFailure | RunStatus::Failed => ExitCode::from(EXIT_PARTIAL),
    })
}
