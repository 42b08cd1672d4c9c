//! # Pipeline Events
//!
//! Eventi emessi dall'orchestratore verso chi osserva la richiesta (CLI, JSON output).
//! L'invio non blocca mai e l'assenza di subscriber viene ignorata.

use crate::pipeline::ladder::EncodeAttempt;
use crate::probe::Metadata;
use crate::utils::format_size;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Original already within threshold, returned unchanged
    Skipped { size_bytes: u64, threshold_bytes: u64 },
    ProbeCompleted { metadata: Metadata },
    ProbeUnavailable { reason: String },
    Planned { attempts: Vec<EncodeAttempt> },
    AttemptStarted { rung: usize, total: usize, attempt: EncodeAttempt },
    AttemptFailed { rung: usize, reason: String },
    AttemptOversized { rung: usize, size_bytes: u64, threshold_bytes: u64 },
    Succeeded { attempts_used: usize, size_bytes: u64 },
    Exhausted { threshold_bytes: u64 },
    Failed { reason: String },
}

impl PipelineEvent {
    /// One-line human description, used for the CLI spinner
    pub fn describe(&self) -> String {
        match self {
            Self::Skipped { size_bytes, .. } => {
                format!("Already small enough ({}), sending original", format_size(*size_bytes))
            }
            Self::ProbeCompleted { metadata } => match (metadata.width, metadata.height) {
                (Some(w), Some(h)) => format!("Probed {}x{}", w, h),
                _ => "Probed (no video dimensions)".to_string(),
            },
            Self::ProbeUnavailable { .. } => "Probe unavailable, using defaults".to_string(),
            Self::Planned { attempts } => format!("Planned {} attempts", attempts.len()),
            Self::AttemptStarted { rung, total, attempt } => format!(
                "🔄 Attempt {}/{}: {}px, CRF {}",
                rung, total, attempt.target_long_edge_px, attempt.quality_level
            ),
            Self::AttemptFailed { rung, .. } => format!("⚠️ Attempt {} failed", rung),
            Self::AttemptOversized { rung, size_bytes, .. } => {
                format!("Attempt {} still too large ({})", rung, format_size(*size_bytes))
            }
            Self::Succeeded { attempts_used, size_bytes } => format!(
                "✅ Compressed to {} after {} attempt(s)",
                format_size(*size_bytes),
                attempts_used
            ),
            Self::Exhausted { threshold_bytes } => {
                format!("❌ Could not get under {}", format_size(*threshold_bytes))
            }
            Self::Failed { reason } => format!("❌ Compression failed: {}", reason),
        }
    }
}
