//! proximum - positioning-network simulation front end

mod logging;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use proximum_core::config::{
    field_unit_label, ConfigNormalizer, FormFields, ValidationErrors, DEFAULT_N_MEASUREMENTS,
};
use proximum_core::driver::{DriverConfig, RunOutcome, SimulationDriver, DEFAULT_CHUNK_SIZE};
use proximum_core::engine::{ChunkResult, ReplayEngine};
use proximum_core::overlay::{network_links, node_overlays, DEFAULT_ARC_SEGMENTS};
use serde_json::{json, Value};
use tracing::{error, info};

use logging::LogFormat;

/// Exit status for a form that failed validation.
const INVALID_FORM: u8 = 2;

#[derive(Parser)]
#[command(name = "proximum")]
#[command(about = "Configure, drive and inspect positioning-network simulations")]
#[command(version)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::default(), global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the stock parameter form as JSON
    Defaults,
    /// Normalize a form into the canonical engine configuration
    Normalize {
        /// Form JSON file
        form: PathBuf,
        /// Measurements per node update compiled into the engine
        #[arg(long, env = "PROXIMUM_N_MEASUREMENTS", default_value_t = DEFAULT_N_MEASUREMENTS)]
        n_measurements: usize,
    },
    /// Build map overlays from one recorded engine result
    Overlay {
        /// Chunk result JSON file
        chunk: PathBuf,
        /// Segments per great-circle arc
        #[arg(long, default_value_t = DEFAULT_ARC_SEGMENTS)]
        segments: usize,
    },
    /// Drive a recorded run (one chunk result per line) through the driver
    Replay {
        /// Form JSON file
        form: PathBuf,
        /// Recorded chunk results, JSON lines
        chunks: PathBuf,
        /// Epochs per engine call
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Measurements per node update compiled into the engine
        #[arg(long, env = "PROXIMUM_N_MEASUREMENTS", default_value_t = DEFAULT_N_MEASUREMENTS)]
        n_measurements: usize,
    },
}

/// What a subcommand produced.
#[derive(Debug)]
enum CommandOutput {
    /// Document for stdout.
    Json(Value),
    /// The form failed validation; nothing was run.
    InvalidForm(ValidationErrors),
}

impl CommandOutput {
    fn exit_status(&self) -> u8 {
        match self {
            CommandOutput::Json(_) => 0,
            CommandOutput::InvalidForm(_) => INVALID_FORM,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    let output = execute(cli.command).await?;
    match &output {
        CommandOutput::Json(document) => {
            println!("{}", serde_json::to_string_pretty(document)?);
        }
        CommandOutput::InvalidForm(errors) => {
            for field_error in errors.errors() {
                eprintln!("{field_error}");
            }
            error!(count = errors.len(), "form rejected");
        }
    }
    Ok(ExitCode::from(output.exit_status()))
}

async fn execute(command: Commands) -> Result<CommandOutput> {
    match command {
        Commands::Defaults => Ok(CommandOutput::Json(defaults())),
        Commands::Normalize {
            form,
            n_measurements,
        } => normalize_form(&form, n_measurements),
        Commands::Overlay { chunk, segments } => overlays(&chunk, segments).map(CommandOutput::Json),
        Commands::Replay {
            form,
            chunks,
            chunk_size,
            n_measurements,
        } => replay(&form, &chunks, chunk_size, n_measurements).await,
    }
}

fn defaults() -> Value {
    let form = FormFields::default();
    let fields: Vec<_> = form
        .iter()
        .map(|(name, value)| {
            json!({
                "name": name,
                "value": value,
                "unit": field_unit_label(name).unwrap_or_default(),
            })
        })
        .collect();
    Value::Array(fields)
}

fn read_form(path: &Path) -> Result<FormFields> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read form {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse form {}", path.display()))
}

fn normalize_form(path: &Path, n_measurements: usize) -> Result<CommandOutput> {
    let form = read_form(path)?;
    Ok(match ConfigNormalizer::new(n_measurements).normalize(&form) {
        Ok(config) => CommandOutput::Json(serde_json::to_value(config)?),
        Err(errors) => CommandOutput::InvalidForm(errors),
    })
}

fn overlays(path: &Path, segments: usize) -> Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read chunk {}", path.display()))?;
    let chunk = ChunkResult::from_json(&text)
        .with_context(|| format!("failed to parse chunk {}", path.display()))?;

    let overlays = node_overlays(&chunk.nodes, segments).context("failed to build node overlays")?;
    let links = network_links(&chunk.nodes, segments).context("failed to build network links")?;
    info!(nodes = overlays.len(), links = links.len(), "overlays built");

    Ok(json!({
        "nodes": overlays,
        "links": links,
        "errors_km": chunk.stats.error_rows_km(),
    }))
}

async fn replay(
    form_path: &Path,
    chunks_path: &Path,
    chunk_size: usize,
    n_measurements: usize,
) -> Result<CommandOutput> {
    let form = read_form(form_path)?;
    let config = match ConfigNormalizer::new(n_measurements).normalize(&form) {
        Ok(config) => config,
        Err(errors) => return Ok(CommandOutput::InvalidForm(errors)),
    };

    let recording = fs::read_to_string(chunks_path)
        .with_context(|| format!("failed to read recording {}", chunks_path.display()))?;
    let engine = ReplayEngine::from_json_lines(&recording)
        .with_context(|| format!("failed to parse recording {}", chunks_path.display()))?;
    info!(chunks = engine.remaining(), "recording loaded");

    let driver = SimulationDriver::with_config(engine, DriverConfig { chunk_size })?;
    let mut progress = driver.subscribe_progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let percent = *progress.borrow_and_update();
            if percent > 0.0 {
                info!(percent, "progress");
            }
        }
    });

    let outcome = driver.run(&config).await.context("replay failed")?;
    let snapshot = driver.snapshot();
    drop(driver);
    reporter.await.context("progress reporter panicked")?;

    let (status, chunks) = match outcome {
        RunOutcome::Completed { chunks } => ("completed", chunks),
        RunOutcome::Cancelled { chunks_applied } => ("cancelled", chunks_applied),
    };
    Ok(CommandOutput::Json(json!({
        "status": status,
        "chunks": chunks,
        "nodes": snapshot.nodes.len(),
        "epochs": snapshot.stats.as_ref().map_or(0, |stats| stats.epochs()),
        "latest_km": snapshot.stats.as_ref().and_then(|stats| stats.latest()),
    })))
}
