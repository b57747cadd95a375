use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rill_core::{Bridge, EngineErrorPolicy, HttpTransport, Notice, SessionOutcome, TokioTimer};
use rill_runtime::{EngineModule, RuntimeContext};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt};

mod config;
mod sink;

use config::RillConfig;
use sink::FileSink;

#[derive(Parser)]
#[command(name = "rill", version, about = "rill: play HTTP streams through a sandboxed engine module")]
struct Cli {
    /// Path to rill.toml (default: ./rill.toml, then ~/.config/rill/rill.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a manifest from start to end of stream
    Play {
        /// Manifest URL
        manifest_url: String,

        /// Engine module (.wasm or .wat)
        #[arg(long)]
        engine: Option<PathBuf>,

        /// File that receives the segments
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Stop at the first error the engine reports
        #[arg(long)]
        abort_on_engine_error: bool,
    },
    /// Load an engine module and verify its ABI
    Check {
        /// Engine module (.wasm or .wat)
        #[arg(long)]
        engine: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout is for command output.
    fmt()
        .with_env_filter(EnvFilter::from_env("RILL_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = RillConfig::discover(cli.config.as_deref())?;

    match cli.command {
        Commands::Play {
            manifest_url,
            engine,
            output,
            abort_on_engine_error,
        } => {
            if abort_on_engine_error {
                config.bridge.on_engine_error = EngineErrorPolicy::Abort;
            }
            let engine = engine.or(config.engine.module.clone());
            let output = output.or(config.output.path.clone());
            run_play(&config, &manifest_url, engine, output).await
        }
        Commands::Check { engine } => {
            let engine = engine.or(config.engine.module.clone());
            run_check(&config, engine)
        }
    }
}

async fn run_play(
    config: &RillConfig,
    manifest_url: &str,
    engine: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let Some(output) = output else {
        bail!("No output path: pass --output or set [output] path in rill.toml");
    };
    let module = load_module(config, engine)?;

    let transport = Arc::new(HttpTransport::new(&config.http)?);
    let bridge = Bridge::new(transport, Arc::new(TokioTimer), config.bridge.clone());
    let sink = FileSink::create(&output).await?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Notice>();
    let printer = tokio::spawn(async move {
        while let Some(notice) = rx.recv().await {
            eprintln!("rill: {notice}");
        }
    });

    tracing::info!(url = manifest_url, "Starting playback");

    let result = tokio::select! {
        result = bridge.play(&module, manifest_url, Box::new(sink), Some(tx)) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    // The sender is gone once `play` finishes or is dropped, so the printer
    // drains and exits.
    let _ = printer.await;

    let Some(result) = result else {
        tracing::info!("Interrupted, session abandoned");
        return Ok(());
    };
    let report = result.with_context(|| format!("Playback of {manifest_url} failed"))?;

    match &report.outcome {
        SessionOutcome::Finished => {
            println!(
                "Finished: {} segments written to {} ({} engine errors)",
                report.segments_appended,
                output.display(),
                report.engine_errors
            );
            Ok(())
        }
        SessionOutcome::Stalled { unresolved } => {
            let ids: Vec<String> = unresolved.iter().map(ToString::to_string).collect();
            bail!(
                "Playback stalled after {} segments; engine still waiting on actions [{}]",
                report.segments_appended,
                ids.join(", ")
            )
        }
    }
}

fn run_check(config: &RillConfig, engine: Option<PathBuf>) -> Result<()> {
    let path = engine_path(engine)?;
    let module = load_module(config, Some(path.clone()))?;
    let info = module.check()?;
    let presence = |present: bool| if present { "present" } else { "absent" };
    println!(
        "{}: ABI v{}, fetch-failure hook {}, fetch-timing hook {}",
        path.display(),
        info.version,
        presence(info.fetch_failure_hook),
        presence(info.fetch_timing_hook)
    );
    Ok(())
}

fn engine_path(engine: Option<PathBuf>) -> Result<PathBuf> {
    engine.context(
        "No engine module: pass --engine, set RILL_ENGINE_MODULE, or set [engine] module in rill.toml",
    )
}

fn load_module(config: &RillConfig, engine: Option<PathBuf>) -> Result<EngineModule> {
    let path = engine_path(engine)?;
    let context = Arc::new(RuntimeContext::new(&config.engine)?);
    let cache = config.module_cache();
    if let Err(e) = cache.init() {
        tracing::warn!(dir = %cache.base_dir().display(), "Module cache unavailable: {e}");
        return Ok(EngineModule::load(context, &path, None)?);
    }
    Ok(EngineModule::load(context, &path, Some(&cache))?)
}
