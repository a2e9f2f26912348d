//! Coldboot CLI entry point.
//!
//! Provides `run` and `plan` subcommands for performing the cold boot or
//! printing how the work would be split across workers.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use coldboot::coldboot::ColdBoot;
use coldboot::config::{load_config, ColdbootConfig, DEFAULT_CONFIG_PATH};
use coldboot::error::Fatal;
use coldboot::handler::LoggingHandler;
use coldboot::readiness::PropertyFile;
use coldboot::selinux::{CommandLabeler, DisabledLabeler, Labeler};
use coldboot::sysfs::SysfsUeventSource;

/// Coldboot — replay the device event backlog and relabel sysfs.
#[derive(Parser)]
#[command(name = "coldboot", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, env = "COLDBOOT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the cold boot and publish readiness.
    Run,
    /// Print the work split as JSON without forking or labeling.
    Plan,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run => handle_run(&cli.config),
        Command::Plan => handle_plan(&cli.config),
    }
}

/// Run the cold boot. A [`Fatal`] terminates the process.
fn handle_run(config_path: &std::path::Path) -> anyhow::Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    match &config.logging.dir {
        Some(dir) => coldboot::logging::init_production(dir)?,
        None => coldboot::logging::init_cli(),
    }

    info!(
        config = %config_path.display(),
        workers = config.coldboot.handler_subprocesses,
        parallel_restorecon = config.coldboot.parallel_restorecon,
        "cold boot starting"
    );

    let mut engine = build_engine(&config)?;
    let report = engine.run().unwrap_or_else(|fatal: Fatal| fatal.terminate());

    info!(
        uevents = report.uevents,
        restorecon_dirs = report.restorecon_dirs,
        elapsed_ms = report.elapsed.as_millis(),
        "cold boot done"
    );
    Ok(())
}

/// Print the work split.
fn handle_plan(config_path: &std::path::Path) -> anyhow::Result<()> {
    coldboot::logging::init_cli();

    let config = load_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let mut engine = build_engine(&config)?;
    let plan = engine.plan();
    let json = serde_json::to_string_pretty(&plan).context("failed to serialize plan")?;
    println!("{json}");
    Ok(())
}

/// Wire the collaborators named by `config` into an engine.
fn build_engine(config: &ColdbootConfig) -> anyhow::Result<ColdBoot> {
    let labeler: Box<dyn Labeler> = if config.restorecon.enabled {
        Box::new(CommandLabeler::new(config.restorecon.program.clone()))
    } else {
        Box::new(DisabledLabeler)
    };

    let mut engine = ColdBoot::new(
        config.options()?,
        Box::new(SysfsUeventSource::new(config.sysfs.root.clone())),
        labeler,
        Box::new(PropertyFile::new(&config.readiness.property_dir)),
    );
    engine.register_handler(Box::new(LoggingHandler));
    Ok(engine)
}
