mod cli;
mod report;
mod runner;

use bumpfix_core::BumpResult;
use bumpfix_core::extract::extract;
use bumpfix_core::orchestrator::{Orchestrator, RunSettings};
use bumpfix_core::reconcile::reconcile;
use clap::Parser;
use cli::{Cli, Command, RunArgs};
use remote_docker::RemoteDocker;
use report::RunReport;
use std::fs;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use upgrade_fix_llm::UpgradeFixLlm;

fn main() {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    if let Err(e) = run(&cli) {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> BumpResult<()> {
    match cli.command {
        Command::Run(ref args) => run_batch(cli, args),
        Command::Extract { ref log } => {
            let diagnostics = extract(&read_log(log)?);
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
            Ok(())
        }
        Command::Reconcile { ref pre, ref post } => {
            let result = reconcile(&extract(&read_log(pre)?), &extract(&read_log(post)?));
            info!("{result}");
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}

fn read_log(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))
}

fn run_batch(cli: &Cli, args: &RunArgs) -> BumpResult<()> {
    let Some(config) = cli::initialize(cli, args)? else {
        return Ok(()); // An early-exit flag was passed.
    };
    info!("Input directory: {}", config.input.display());
    info!("Output directory: {}", config.output.display());

    let datapoints = runner::select_datapoints(&config, args.specific_file.as_deref())?;
    if datapoints.is_empty() {
        info!("No datapoints to process");
        return Ok(());
    }

    let remote_config = serde_json::from_value(config.tool("remote_docker")?.clone())?;
    let mut remote = RemoteDocker::new(&remote_config)?;
    let repairer_config = serde_json::from_value(config.tool("upgrade_fix_llm")?.clone())?;
    let mut repairer = UpgradeFixLlm::new(&repairer_config)?;

    let mut orchestrator =
        Orchestrator::new(&mut remote, &mut repairer, RunSettings::from_config(&config));
    let mut sink = RunReport::new(config.output.join("run_data.csv"), config.error_files_dir());
    let summary = runner::run_batch(&mut orchestrator, &datapoints, &config.logs_dir(), &mut sink);
    summary.log();

    info!("\nOutput Files:");
    info!("  CSV results: {}", config.output.join("run_data.csv").display());
    info!("  Run logs: {}", config.logs_dir().display());
    info!("  Error files: {}", config.error_files_dir().display());
    Ok(())
}
