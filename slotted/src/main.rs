//! Slot tree lifecycle harness.
//!
//! Scaffolds a scenario project, validates scenario files, and runs them
//! against a real slot tree, printing the lifecycle transcript.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use slotted::exit_codes;
use slotted::harness::Harness;
use slotted::io::config::load_config;
use slotted::io::init::{InitOptions, init_project};
use slotted::io::scenario::load_scenario;
use slotted::logging;

#[derive(Parser)]
#[command(
    name = "slotted",
    version,
    about = "Slot tree lifecycle manager and scenario harness"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `slotted.toml` and a sample scenario if missing.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Check a scenario against the schema and catalog invariants.
    Validate {
        /// Path to the scenario JSON file.
        scenario: PathBuf,
    },
    /// Run a scenario and print the lifecycle transcript.
    Run {
        /// Path to the scenario JSON file.
        scenario: PathBuf,
        /// Harness config; defaults apply if the file is missing.
        #[arg(long, default_value = "slotted.toml")]
        config: PathBuf,
        /// Print the report as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(force),
        Command::Validate { scenario } => cmd_validate(&scenario),
        Command::Run {
            scenario,
            config,
            json,
        } => cmd_run(&scenario, &config, json),
    }
}

fn cmd_init(force: bool) -> Result<i32> {
    let root = std::env::current_dir().context("resolve current directory")?;
    let paths = init_project(&root, &InitOptions { force })?;
    println!("{}", paths.config_path.display());
    println!("{}", paths.sample_scenario_path.display());
    Ok(exit_codes::OK)
}

fn cmd_validate(path: &Path) -> Result<i32> {
    let scenario = load_scenario(path)?;
    println!(
        "ok: {} places, {} steps",
        scenario.places.len(),
        scenario.steps.len()
    );
    Ok(exit_codes::OK)
}

fn cmd_run(path: &Path, config_path: &Path, json: bool) -> Result<i32> {
    let config = load_config(config_path)?;
    let scenario = load_scenario(path)?;
    let mut harness = Harness::from_scenario(&scenario, &config);
    let report = harness
        .run(&scenario.steps)
        .with_context(|| format!("run scenario {}", path.display()))?;
    if json {
        let payload = serde_json::to_string_pretty(&report).context("serialize report json")?;
        println!("{payload}");
    } else {
        print!("{}", report.render_text());
    }
    Ok(report.exit_code())
}
