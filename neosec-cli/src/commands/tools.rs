//! `neosec list-tools` - show registered adapters

use std::process::ExitCode;

use clap::Args;

use neosec_core::domain::adapter::ToolCategory;
use neosec_orchestrator::ScanEngine;

use crate::EXIT_CONFIG;

#[derive(Args, Debug)]
pub struct ListToolsArgs {
    /// Only show tools in this category (recon, scanner, fuzzer, exploit, other)
    #[arg(long)]
    pub category: Option<String>,
}

pub fn run(engine: &ScanEngine, args: &ListToolsArgs) -> anyhow::Result<ExitCode> {
    let category = match args.category.as_deref() {
        None => None,
        Some("recon") => Some(ToolCategory::Recon),
        Some("scanner") => Some(ToolCategory::Scanner),
        Some("fuzzer") => Some(ToolCategory::Fuzzer),
        Some("exploit") => Some(ToolCategory::Exploit),
        Some("other") => Some(ToolCategory::Other),
        Some(unknown) => {
            eprintln!("unknown category: {unknown}");
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };

    let descriptors = engine.list_tools(category);
    if descriptors.is_empty() {
        println!("no tools registered");
        return Ok(ExitCode::SUCCESS);
    }

    println!("{:<12} {:<10} {:<30} binaries", "tool", "category", "description");
    for descriptor in descriptors {
        println!(
            "{:<12} {:<10} {:<30} {}",
            descriptor.name,
            format!("{:?}", descriptor.category).to_lowercase(),
            descriptor.description,
            descriptor.required_binaries.join(", ")
        );
    }
    Ok(ExitCode::SUCCESS)
}
