//! `neosec validate` - probe every adapter's required binaries

use std::process::ExitCode;

use neosec_orchestrator::ScanEngine;

use crate::EXIT_CONFIG;

pub fn run(engine: &ScanEngine) -> anyhow::Result<ExitCode> {
    let report = engine.validate_dependencies();
    if report.is_empty() {
        println!("no tools registered");
        return Ok(ExitCode::SUCCESS);
    }

    let mut missing = 0usize;
    let mut tools: Vec<_> = report.into_iter().collect();
    tools.sort_by(|a, b| a.0.cmp(&b.0));

    for (tool, probes) in tools {
        for probe in probes {
            if probe.available {
                let path = probe
                    .resolved_path
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                println!("{:<12} {:<24} ok  {}", tool, probe.binary, path);
            } else {
                missing += 1;
                println!("{:<12} {:<24} MISSING", tool, probe.binary);
            }
        }
    }

    if missing > 0 {
        eprintln!("{missing} required binar{} missing", if missing == 1 { "y" } else { "ies" });
        return Ok(ExitCode::from(EXIT_CONFIG));
    }
    Ok(ExitCode::SUCCESS)
}
