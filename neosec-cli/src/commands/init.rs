//! `neosec init-config` - write a starter configuration file

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;

use neosec_core::config::GlobalConfig;

use crate::EXIT_CONFIG;

#[derive(Args, Debug)]
pub struct InitConfigArgs {
    /// Where to write the config file
    #[arg(short, long, default_value = "neosec.toml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitConfigArgs) -> anyhow::Result<ExitCode> {
    if args.output.exists() && !args.force {
        eprintln!(
            "{} already exists; pass --force to overwrite",
            args.output.display()
        );
        return Ok(ExitCode::from(EXIT_CONFIG));
    }

    if let Err(err) = GlobalConfig::write_default(&args.output) {
        eprintln!("cannot write config: {err}");
        return Ok(ExitCode::from(EXIT_CONFIG));
    }

    println!("wrote {}", args.output.display());
    Ok(ExitCode::SUCCESS)
}
