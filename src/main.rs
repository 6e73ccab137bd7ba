// ReqCrab - GPL-3.0-or-later
// This file is part of ReqCrab.
//
// Copyright (C) 2025 Daniel Freiermuth
//
// ReqCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// ReqCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with ReqCrab.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use reqcrab::{AttackScenario, Engine, EngineConfig, JsonFileSource};
use serde::Serialize;
use serde_json::Value;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "ram-profiling")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

#[derive(Parser, Debug)]
#[command(name = "reqcrab")]
#[command(author = "ReqCrab Team")]
#[command(version = VERSION)]
#[command(about = "Score HTTP requests for anomalies against a learned traffic baseline", long_about = None)]
struct Args {
    /// Historical request log (JSON array or JSON lines) to build the baseline from
    #[arg(long, global = true, value_name = "FILE")]
    history: Option<PathBuf>,

    /// Engine configuration file; defaults to the per-user config if present
    #[arg(long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Path for the DHAT heap profiling output (only used when built with --features ram-profiling)
    #[cfg(feature = "ram-profiling")]
    #[arg(
        long = "profile-output",
        value_name = "PROFILE_FILE",
        default_value = "dhat-heap.json"
    )]
    profile_output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one request given as a JSON object (reads stdin when no file is given)
    Analyze {
        #[arg(value_name = "REQUEST")]
        input: Option<PathBuf>,
    },
    /// Analyze many requests given as a JSON array or JSON lines
    Batch {
        #[arg(value_name = "REQUESTS")]
        input: Option<PathBuf>,
    },
    /// Error-rate and traffic-shape insights over the baseline window
    Insights,
    /// Aggregate statistics of the baseline window
    Dashboard,
    /// Export the learned baseline and signature sets
    Baseline,
    /// List detection methods and attack signatures
    Patterns,
    /// Analyze a canned attack request
    Simulate {
        #[arg(value_enum)]
        scenario: AttackScenario,
    },
    /// Engine state after loading the history
    Status,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries JSON only.
    // Set RUST_LOG environment variable to override (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("ReqCrab starting up (version {VERSION})");

    let args = Args::parse();

    #[cfg(feature = "ram-profiling")]
    let _profiler = {
        tracing::info!("RAM profiling enabled, output: {:?}", args.profile_output);
        dhat::Profiler::builder()
            .file_name(args.profile_output.clone())
            .build()
    };

    #[cfg(feature = "cpu-profiling")]
    let _tracy = {
        tracing::info!("CPU profiling enabled with Tracy - run Tracy profiler to connect");
        tracy_client::Client::start()
    };

    let engine = build_engine(&args)?;

    match args.command {
        Command::Analyze { input } => {
            let payload: Value = serde_json::from_str(&read_input(input.as_deref())?)
                .context("Request is not valid JSON")?;
            if payload.is_array() {
                bail!("Expected a single request object; use `batch` for arrays");
            }
            emit(&engine.analyze_json(&payload))
        }
        Command::Batch { input } => {
            let payloads = parse_payloads(&read_input(input.as_deref())?)?;
            tracing::info!("Analyzing {} requests", payloads.len());
            emit(&engine.analyze_json_batch(&payloads))
        }
        Command::Insights => emit(&engine.insights(Utc::now())),
        Command::Dashboard => emit(&engine.dashboard(Utc::now())),
        Command::Baseline => emit(&engine.baseline_report()),
        Command::Patterns => emit(&engine.attack_patterns()),
        Command::Simulate { scenario } => emit(&engine.simulate(scenario, Utc::now())),
        Command::Status => emit(&engine.status()),
    }
}

fn build_engine(args: &Args) -> anyhow::Result<Engine> {
    let config = match &args.config {
        Some(path) => EngineConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::load(),
    };
    let engine = Engine::with_config(config).context("Invalid engine configuration")?;

    if let Some(history) = &args.history {
        let summary = engine
            .initialize(&JsonFileSource::new(history))
            .with_context(|| format!("Failed to initialize from {}", history.display()))?;
        tracing::info!(
            "Baseline ready: {} requests, model trained: {}",
            summary.requests_analyzed,
            summary.is_trained
        );
    } else {
        tracing::warn!("No --history given, analyzing against fallback baseline values");
    }
    Ok(engine)
}

fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// Accept a JSON array or one JSON object per line
fn parse_payloads(content: &str) -> anyhow::Result<Vec<Value>> {
    if content.trim_start().starts_with('[') {
        return serde_json::from_str(content).context("Requests are not a valid JSON array");
    }
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Request on line {} is not valid JSON", idx + 1))
        })
        .collect()
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).context("Failed to serialize output")?;
    writeln!(stdout).context("Failed to write output")?;
    Ok(())
}
