//! # Progress Reporting Module
//!
//! Questo modulo mostra l'avanzamento della pipeline sul terminale.
//!
//! ## Responsabilità:
//! - Spinner `indicatif` per l'attesa indeterminata degli encode
//! - Traduce ogni `PipelineEvent` in un messaggio di stato
//! - Messaggio finale con riepilogo della preparazione
//!
//! ## Visual feedback:
//! ```text
//! ⠋ 🔄 Attempt 2/3: 640px, CRF 32
//! ```

use crate::media::{CompressionResult, MediaAsset};
use crate::pipeline::PipelineEvent;
use crate::utils::{calculate_reduction, format_size};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner driven by pipeline events
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a spinner for indeterminate progress
    pub fn spinner(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();

        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            bar.set_style(style);
        }

        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Spinner that never draws, for `--json` and non-interactive runs
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn on_event(&self, event: &PipelineEvent) {
        self.bar.set_message(event.describe());
    }

    pub fn message(&self) -> String {
        self.bar.message()
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

/// One-line summary printed when the payload is ready
pub fn format_summary(asset: &MediaAsset, result: &CompressionResult) -> String {
    if result.was_compressed() {
        format!(
            "Original: {} | Prepared: {} ({:.2}% smaller) | Attempts: {} | Mime: {}",
            format_size(asset.size_bytes()),
            format_size(result.size_bytes()),
            calculate_reduction(asset.size_bytes(), result.size_bytes()),
            result.attempts_used,
            result.mime_type
        )
    } else {
        format!(
            "Original kept: {} | Mime: {}",
            format_size(asset.size_bytes()),
            result.mime_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_update_message() {
        let progress = ProgressManager::hidden();
        progress.on_event(&PipelineEvent::AttemptFailed {
            rung: 1,
            reason: "exit 1".to_string(),
        });
        assert_eq!(progress.message(), "⚠️ Attempt 1 failed");
    }

    #[test]
    fn test_summary() {
        let asset = MediaAsset::new(vec![0u8; 2048], "video/mp4");

        let summary = format_summary(&asset, &CompressionResult::compressed(vec![0u8; 1024], 2));
        assert!(summary.contains("50.00% smaller"));
        assert!(summary.contains("Attempts: 2"));

        let summary = format_summary(&asset, &CompressionResult::unchanged(&asset));
        assert!(summary.starts_with("Original kept: 2.00 KB"));
    }
}
