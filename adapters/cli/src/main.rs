#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for checking, converting and recording build plans.

mod config;
mod replay;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use build_order_catalog::Catalog;
use build_order_core::BuildPlan;
use build_order_system_plan_grammar::{parse, to_long_text, to_short_text};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::{config::AppConfig, replay::ReplayLog};

#[derive(Debug, Parser)]
#[command(name = "build-order", version, about = "Tower defense build-order tools")]
struct Cli {
    /// Directory holding towers.toml and maps.toml; the built-in catalog is used otherwise.
    #[arg(long, global = true, value_name = "DIR")]
    catalog: Option<PathBuf>,
    /// TOML file with tracker and pip decoder tunables.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Increase log verbosity; RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a plan in either notation and list its diagnostics.
    Check {
        /// Plan file.
        file: PathBuf,
        /// Print the parsed plan as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the canonical compact form of a plan.
    Compact {
        /// Plan file.
        file: PathBuf,
    },
    /// Print the verbose form of a plan.
    Expand {
        /// Plan file.
        file: PathBuf,
    },
    /// Replay a JSON observation log through the tracker and print the transcript.
    Replay {
        /// Observation log.
        file: PathBuf,
        /// Also print the compact plan after the transcript.
        #[arg(long)]
        compact: bool,
    },
}

/// Entry point for the build-order command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let catalog = load_catalog(cli.catalog.as_deref())?;
    match cli.command {
        Command::Check { file, json } => check(&catalog, &file, json),
        Command::Compact { file } => {
            let plan = read_plan(&catalog, &file)?;
            report(&plan);
            println!("{}", to_short_text(&plan));
            ensure_valid(&plan)
        }
        Command::Expand { file } => {
            let plan = read_plan(&catalog, &file)?;
            report(&plan);
            println!("{}", to_long_text(&plan, &catalog));
            ensure_valid(&plan)
        }
        Command::Replay { file, compact } => {
            let config = AppConfig::load(cli.config.as_deref())?;
            let text = read_file(&file)?;
            let log = ReplayLog::from_json(&text)
                .with_context(|| format!("failed to load {}", file.display()))?;
            let Some(outcome) = replay::replay(&log, &catalog, &config)? else {
                bail!("could not identify the map in {}", file.display());
            };
            println!("{}", outcome.transcript);
            if compact {
                println!();
                println!("{}", to_short_text(&outcome.plan));
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("failed to install log subscriber: {error}"))
}

fn load_catalog(dir: Option<&Path>) -> Result<Catalog> {
    match dir {
        Some(dir) => Catalog::load_dir(dir)
            .with_context(|| format!("failed to load catalog from {}", dir.display())),
        None => Catalog::builtin().context("built-in catalog is invalid"),
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_plan(catalog: &Catalog, path: &Path) -> Result<BuildPlan> {
    let text = read_file(path)?;
    parse(&text, catalog).with_context(|| format!("failed to parse plan {}", path.display()))
}

fn check(catalog: &Catalog, path: &Path, json: bool) -> Result<()> {
    let plan = read_plan(catalog, path)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&plan).context("failed to encode plan")?
        );
    } else {
        for diagnostic in plan.diagnostics() {
            println!("{diagnostic}");
        }
        println!(
            "{}: {} steps, {} errors",
            plan.map(),
            plan.steps().len(),
            plan.errors().count()
        );
    }
    ensure_valid(&plan)
}

fn report(plan: &BuildPlan) {
    for diagnostic in plan.diagnostics() {
        eprintln!("{diagnostic}");
    }
}

fn ensure_valid(plan: &BuildPlan) -> Result<()> {
    let errors = plan.errors().count();
    if errors > 0 {
        bail!("plan has {errors} error(s)");
    }
    Ok(())
}
