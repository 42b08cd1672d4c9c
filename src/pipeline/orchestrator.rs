//! # Compression Orchestrator
//!
//! Questo modulo coordina una singola richiesta: dal buffer caricato al payload pronto.
//!
//! ## Flusso:
//! 1. Se l'originale è già sotto soglia: restituito invariato (`attempts_used = 0`)
//! 2. Se ffmpeg non è disponibile: `CompressionFailed` prima di ogni tentativo
//! 3. Acquisisce il `Workspace` e vi scrive l'originale
//! 4. Probe dei metadati (in caso di errore: landscape, durata sconosciuta)
//! 5. Pianifica la ladder ed esegue i rung in serie, dentro il budget della richiesta
//! 6. Rilascia il `Workspace` su ogni percorso di uscita
//!
//! ## Classificazione degli errori:
//! - Fallimento di un rung: loggato, si prosegue con il rung successivo
//! - Ladder esaurita o budget scaduto: `UnableToCompressBelowThreshold`
//! - Errore inatteso: `CompressionFailed` se l'originale supera la soglia,
//!   altrimenti si restituisce l'originale
//! - Cancellazione: `Cancelled`, con ffmpeg terminato e workspace rimosso

use crate::config::Config;
use crate::error::CompressionError;
use crate::media::{CompressionResult, MediaAsset};
use crate::pipeline::events::PipelineEvent;
use crate::pipeline::ladder::{plan, EncodeAttempt, LadderPolicy};
use crate::pipeline::size_gate::SizeGate;
use crate::pipeline::state::{AttemptOutcome, PipelineState};
use crate::probe::{FfprobeProbe, Metadata, MetadataProbe};
use crate::tool_resolver::ToolPaths;
use crate::transcoder::{FfmpegTranscoder, Transcoder};
use crate::utils::format_size;
use crate::workspace::Workspace;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Immutable per-process parameters the orchestrator needs
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub threshold_bytes: u64,
    pub ladder: LadderPolicy,
    /// Wall-clock budget for all rungs of one request
    pub request_budget: Duration,
    pub temp_dir_prefix: String,
    pub temp_root: Option<PathBuf>,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            threshold_bytes: config.threshold_bytes(),
            ladder: config.ladder.clone(),
            request_budget: config.request_budget(),
            temp_dir_prefix: config.temp_dir_prefix.clone(),
            temp_root: config.temp_root.clone(),
        }
    }
}

/// Drives one upload through skip check, probe, ladder and cleanup
pub struct Orchestrator<P, T> {
    probe: P,
    transcoder: T,
    gate: SizeGate,
    settings: PipelineSettings,
    event_tx: Option<broadcast::Sender<PipelineEvent>>,
}

impl Orchestrator<FfprobeProbe, FfmpegTranscoder> {
    /// Orchestrator backed by the real ffprobe/ffmpeg binaries
    pub fn from_config(config: &Config, tools: &ToolPaths) -> Self {
        Self::new(
            FfprobeProbe::new(tools.ffprobe.clone(), config.probe_timeout()),
            FfmpegTranscoder::new(tools.ffmpeg.clone(), config.attempt_timeout()),
            PipelineSettings::from(config),
        )
    }
}

impl<P: MetadataProbe, T: Transcoder> Orchestrator<P, T> {
    pub fn new(probe: P, transcoder: T, settings: PipelineSettings) -> Self {
        Self {
            probe,
            transcoder,
            gate: SizeGate::new(settings.threshold_bytes),
            settings,
            event_tx: None,
        }
    }

    /// Broadcast pipeline events to `event_tx`
    pub fn with_events(mut self, event_tx: broadcast::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn transcoder(&self) -> &T {
        &self.transcoder
    }

    fn broadcast(&self, event: PipelineEvent) {
        if let Some(ref tx) = self.event_tx {
            if tx.send(event).is_err() {
                debug!("No subscribers for pipeline event");
            }
        }
    }

    /// Return a payload no larger than the threshold, or a classified error
    pub async fn prepare(&self, asset: &MediaAsset) -> Result<CompressionResult, CompressionError> {
        let size = asset.size_bytes();
        let threshold = self.gate.threshold_bytes();

        if self.gate.fits(size) {
            info!(
                "Video {} is within {}, skipping compression",
                format_size(size),
                format_size(threshold)
            );
            self.broadcast(PipelineEvent::Skipped {
                size_bytes: size,
                threshold_bytes: threshold,
            });
            settle(PipelineState::original_returned());
            return Ok(CompressionResult::unchanged(asset));
        }

        if !self.transcoder.is_available() {
            error!("❌ Video {} exceeds {} and ffmpeg is not available", format_size(size), format_size(threshold));
            let err = CompressionError::CompressionFailed("ffmpeg is not available".to_string());
            self.broadcast(PipelineEvent::Failed { reason: err.to_string() });
            settle(PipelineState::Failed);
            return Err(err);
        }

        info!(
            "🎬 Video {} exceeds {}, starting compression",
            format_size(size),
            format_size(threshold)
        );

        let mut workspace = match self.acquire_workspace() {
            Ok(workspace) => workspace,
            Err(e) => return self.fallback_or_fail(asset, e.into()),
        };

        let result = self.run(&mut workspace, asset).await;

        if let Err(e) = workspace.release() {
            warn!("Failed to clean up workspace: {}", e);
        }

        match result {
            Ok(result) => Ok(result),
            Err(e) => self.fallback_or_fail(asset, e),
        }
    }

    /// `prepare`, abandoned as soon as `cancel` fires
    pub async fn prepare_with_cancel(
        &self,
        asset: &MediaAsset,
        cancel: CancellationToken,
    ) -> Result<CompressionResult, CompressionError> {
        tokio::select! {
            result = self.prepare(asset) => result,
            _ = cancel.cancelled() => {
                // Dropping the prepare future kills ffmpeg and removes the workspace
                warn!("🛑 Compression cancelled");
                self.broadcast(PipelineEvent::Failed { reason: CompressionError::Cancelled.to_string() });
                Err(CompressionError::Cancelled)
            }
        }
    }

    fn acquire_workspace(&self) -> std::io::Result<Workspace> {
        match self.settings.temp_root {
            Some(ref parent) => Workspace::acquire_in(parent, &self.settings.temp_dir_prefix),
            None => Workspace::acquire(&self.settings.temp_dir_prefix),
        }
    }

    async fn run(
        &self,
        workspace: &mut Workspace,
        asset: &MediaAsset,
    ) -> Result<CompressionResult, CompressionError> {
        let state = PipelineState::NotStarted;
        let input = workspace.write_input(asset.bytes()).await?;

        let state = transition(state, PipelineState::Probing);
        let metadata = self.probe_or_default(&input).await;

        let state = transition(state, PipelineState::Planning);
        let attempts = plan(&metadata, &self.settings.ladder);
        self.broadcast(PipelineEvent::Planned {
            attempts: attempts.clone(),
        });

        let state = if attempts.is_empty() {
            transition(state, PipelineState::Exhausted)
        } else {
            let state = transition(state, PipelineState::first_attempt(input));
            match tokio::time::timeout(
                self.settings.request_budget,
                self.run_ladder(workspace, state, &attempts),
            )
            .await
            {
                Ok(state) => state?,
                Err(_) => {
                    warn!(
                        "⏰ Compression budget of {}s exceeded",
                        self.settings.request_budget.as_secs()
                    );
                    PipelineState::Exhausted
                }
            }
        };

        match state {
            PipelineState::Succeeded {
                output: Some(output),
                attempts_used,
            } => {
                let bytes = tokio::fs::read(&output).await?;
                info!(
                    "✅ Compressed {} -> {} in {} attempt(s)",
                    format_size(asset.size_bytes()),
                    format_size(bytes.len() as u64),
                    attempts_used
                );
                self.broadcast(PipelineEvent::Succeeded {
                    attempts_used,
                    size_bytes: bytes.len() as u64,
                });
                Ok(CompressionResult::compressed(bytes, attempts_used))
            }
            PipelineState::Exhausted => {
                let threshold_bytes = self.gate.threshold_bytes();
                warn!("❌ No attempt got under {}", format_size(threshold_bytes));
                self.broadcast(PipelineEvent::Exhausted { threshold_bytes });
                Err(CompressionError::UnableToCompressBelowThreshold { threshold_bytes })
            }
            other => Err(CompressionError::CompressionFailed(format!(
                "pipeline stopped in state {}",
                other
            ))),
        }
    }

    async fn probe_or_default(&self, input: &Path) -> Metadata {
        match self.probe.probe(input).await {
            Ok(metadata) => {
                self.broadcast(PipelineEvent::ProbeCompleted { metadata });
                metadata
            }
            Err(e) => {
                warn!("⚠️ {}; assuming landscape with unknown duration", e);
                self.broadcast(PipelineEvent::ProbeUnavailable { reason: e.to_string() });
                Metadata::default()
            }
        }
    }

    /// Run rungs serially until a terminal state
    async fn run_ladder(
        &self,
        workspace: &mut Workspace,
        mut state: PipelineState,
        attempts: &[EncodeAttempt],
    ) -> Result<PipelineState, CompressionError> {
        let total = attempts.len();

        while let PipelineState::Attempting { rung, base } = state.clone() {
            let attempt = attempts.get(rung).ok_or_else(|| {
                CompressionError::CompressionFailed(format!("rung {} is not planned", rung + 1))
            })?;
            let outcome = self.run_rung(workspace, &base, attempt, total).await?;
            state = transition(state.clone(), state.after_attempt(outcome, total));
        }

        Ok(state)
    }

    async fn run_rung(
        &self,
        workspace: &mut Workspace,
        base: &Path,
        attempt: &EncodeAttempt,
        total: usize,
    ) -> Result<AttemptOutcome, CompressionError> {
        let rung = attempt.sequence_index;
        let output = workspace.attempt_path();

        info!(
            "🔄 Attempt {}/{}: {}px, CRF {}, duration cap {:?}",
            rung, total, attempt.target_long_edge_px, attempt.quality_level, attempt.duration_limit_seconds
        );
        self.broadcast(PipelineEvent::AttemptStarted {
            rung,
            total,
            attempt: attempt.clone(),
        });

        if let Err(e) = self.transcoder.transcode(base, attempt, &output).await {
            if e.is_fatal() {
                return Err(e);
            }
            warn!("⚠️ {}", e);
            self.broadcast(PipelineEvent::AttemptFailed {
                rung,
                reason: e.to_string(),
            });
            return Ok(AttemptOutcome::EncodeFailed);
        }

        let size = SizeGate::measure(&output).await?;
        if self.gate.fits(size) {
            debug!("Attempt {} fits: {}", rung, format_size(size));
            Ok(AttemptOutcome::Fits { output })
        } else {
            info!("Attempt {} still too large: {}", rung, format_size(size));
            self.broadcast(PipelineEvent::AttemptOversized {
                rung,
                size_bytes: size,
                threshold_bytes: self.gate.threshold_bytes(),
            });
            Ok(AttemptOutcome::Oversized { output })
        }
    }

    /// Map an error that escaped the ladder to the caller-facing outcome
    fn fallback_or_fail(
        &self,
        asset: &MediaAsset,
        err: CompressionError,
    ) -> Result<CompressionResult, CompressionError> {
        match err {
            CompressionError::UnableToCompressBelowThreshold { .. }
            | CompressionError::CompressionFailed(_)
            | CompressionError::Cancelled
            | CompressionError::UploadTooLarge { .. }
            | CompressionError::Validation(_) => Err(err),
            unexpected => {
                if self.gate.fits(asset.size_bytes()) {
                    warn!("⚠️ {}; returning original video", unexpected);
                    settle(PipelineState::original_returned());
                    Ok(CompressionResult::unchanged(asset))
                } else {
                    error!("❌ {}", unexpected);
                    let err = CompressionError::CompressionFailed(unexpected.to_string());
                    self.broadcast(PipelineEvent::Failed { reason: err.to_string() });
                    settle(PipelineState::Failed);
                    Err(err)
                }
            }
        }
    }
}

fn transition(from: PipelineState, to: PipelineState) -> PipelineState {
    debug!("Pipeline state: {} -> {}", from, to);
    to
}

/// Terminal state reached outside the ladder loop
fn settle(terminal: PipelineState) -> PipelineState {
    debug_assert!(terminal.is_terminal(), "{} is not terminal", terminal);
    debug!("Pipeline state: {}", terminal);
    terminal
}
