//! # Video Prep - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Caricamento di `.env` e della configurazione (env, file JSON, override CLI)
//! - Inizializzazione del sistema di logging con `tracing` (su stderr)
//! - Avvio della pipeline e scrittura del payload preparato
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI
//! 2. Configura il logging (`RUST_LOG`, oppure INFO/DEBUG a seconda di `--verbose`)
//! 3. Costruisce e valida la `Config`
//! 4. Risolve ffmpeg/ffprobe (con `--check-tools` stampa solo il report)
//! 5. Legge e valida l'upload, esegue la pipeline (Ctrl+C la cancella)
//! 6. Scrive il risultato e stampa il riepilogo (o JSON con `--json`)
//!
//! ## Esempio di utilizzo:
//! ```bash
//! video-prep clip.mov --threshold-mb 20 --output clip-small.mp4 --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use video_prep::json_output::JsonMessage;
use video_prep::progress::{format_summary, ProgressManager};
use video_prep::tool_resolver::{ToolPathResolver, FFMPEG};
use video_prep::{CompressionError, CompressionResult, Config, MediaAsset, Orchestrator};

#[derive(Parser)]
#[command(name = "video-prep")]
#[command(about = "Prepare an uploaded video for a size-limited analysis service")]
struct Args {
    /// Video file to prepare
    #[arg(required_unless_present = "check_tools")]
    input: Option<PathBuf>,

    /// Where to write the prepared video (default: <name>-prepared.<ext> next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Declared mime type of the upload (default: inferred from the extension)
    #[arg(long)]
    mime_type: Option<String>,

    /// Largest accepted upload in MB
    #[arg(long)]
    max_upload_mb: Option<f64>,

    /// Compress when the upload is larger than this many MB
    #[arg(short, long)]
    threshold_mb: Option<f64>,

    /// Path to the ffmpeg binary
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe binary
    #[arg(long)]
    ffprobe: Option<PathBuf>,

    /// Timeout for a single encode attempt, in seconds
    #[arg(long)]
    attempt_timeout: Option<u64>,

    /// Time budget for all encode attempts, in seconds
    #[arg(long)]
    request_budget: Option<u64>,

    /// JSON configuration file (default: environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit JSON lines on stdout instead of a spinner
    #[arg(long)]
    json: bool,

    /// Print the ffmpeg/ffprobe availability report and exit
    #[arg(long)]
    check_tools: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&args).await?;
    let resolver = ToolPathResolver::from_config(&config);

    if args.check_tools {
        println!("{}", resolver.get_tools_report());
        return Ok(ExitCode::SUCCESS);
    }

    let input = args
        .input
        .clone()
        .ok_or_else(|| anyhow::anyhow!("No input video given"))?;
    if !input.is_file() {
        return Err(anyhow::anyhow!("Input video does not exist: {}", input.display()));
    }

    let tools = resolver.resolve();
    if tools.ffmpeg.is_none() {
        if let Err(instructions) = resolver.check_tool_with_instructions(FFMPEG) {
            warn!("⚠️ {}", instructions);
        }
    }
    let threshold_mb = config.threshold_mb();
    let asset = MediaAsset::from_file(&input, args.mime_type.as_deref()).await?;

    let progress = if args.json {
        ProgressManager::hidden()
    } else {
        ProgressManager::spinner("Preparing video...")
    };

    if let Err(e) = asset.validate(config.max_upload_bytes()) {
        return Ok(report_error(e, threshold_mb, args.json, &progress));
    }

    if args.json {
        JsonMessage::start(input.clone(), &asset, config.threshold_bytes()).emit();
    }

    let (event_tx, event_rx) = broadcast::channel(64);
    let renderer = tokio::spawn(render_events(event_rx, progress.clone(), args.json));
    let orchestrator = Orchestrator::from_config(&config, &tools).with_events(event_tx);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let start_time = Instant::now();
    let result = orchestrator.prepare_with_cancel(&asset, cancel).await;

    // Closing the channel lets the renderer drain and stop
    drop(orchestrator);
    if let Err(e) = renderer.await {
        debug!("Event renderer stopped: {}", e);
    }

    let result = match result {
        Ok(result) => result,
        Err(e) => return Ok(report_error(e, threshold_mb, args.json, &progress)),
    };

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&input, &result));
    tokio::fs::write(&output, &result.bytes).await?;

    if args.json {
        JsonMessage::complete(output, &asset, &result, start_time.elapsed().as_secs_f64()).emit();
    } else {
        progress.finish(&format_summary(&asset, &result));
        info!("💾 Wrote {}", output.display());
    }

    Ok(ExitCode::SUCCESS)
}

async fn build_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        Some(ref path) => Config::from_file(path).await?,
        None => Config::from_env(),
    };

    if let Some(max_upload_mb) = args.max_upload_mb {
        config.max_upload_mb = max_upload_mb;
    }
    if let Some(threshold_mb) = args.threshold_mb {
        config.compression_threshold_mb = Some(threshold_mb);
    }
    if let Some(ref ffmpeg) = args.ffmpeg {
        config.ffmpeg_path = Some(ffmpeg.clone());
    }
    if let Some(ref ffprobe) = args.ffprobe {
        config.ffprobe_path = Some(ffprobe.clone());
    }
    if let Some(attempt_timeout) = args.attempt_timeout {
        config.attempt_timeout_secs = attempt_timeout;
    }
    if let Some(request_budget) = args.request_budget {
        config.request_budget_secs = request_budget;
    }

    config.validate()?;
    debug!("Configuration: {:?}", config);
    Ok(config)
}

async fn render_events(
    mut event_rx: broadcast::Receiver<video_prep::pipeline::PipelineEvent>,
    progress: ProgressManager,
    json: bool,
) {
    loop {
        match event_rx.recv().await {
            Ok(event) if json => JsonMessage::event(event).emit(),
            Ok(event) => progress.on_event(&event),
            Err(RecvError::Lagged(skipped)) => debug!("Skipped {} pipeline events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Pipeline failures are reported once (JSON line or spinner) and only set the exit status
fn report_error(
    err: CompressionError,
    threshold_mb: f64,
    json: bool,
    progress: &ProgressManager,
) -> ExitCode {
    debug!("Request failed: {:?}", err);
    if json {
        JsonMessage::error(&err, threshold_mb).emit();
    } else {
        progress.abandon(&format!("❌ {}", err.user_message(threshold_mb)));
    }
    ExitCode::FAILURE
}

/// `<stem>-prepared.<ext>` next to the input; compressed output is always mp4
fn default_output_path(input: &Path, result: &CompressionResult) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string());
    let extension = if result.was_compressed() {
        "mp4".to_string()
    } else {
        input
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "mp4".to_string())
    };
    input.with_file_name(format!("{}-prepared.{}", stem, extension))
}
