//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per comunicazione inter-processo
//! (il layer di upload che invoca il binario con `--json`).
//!
//! ## Responsabilità:
//! - Emette una riga JSON per ogni messaggio su stdout
//! - Inoltra gli eventi della pipeline (`PipelineEvent`) così come sono
//! - Riporta l'esito finale con dimensioni e tentativi usati
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio preparazione del video
//! - `event`: Evento della pipeline (probe, tentativi, esito)
//! - `complete`: Payload pronto, con statistiche
//! - `error`: Errore con messaggio per l'utente finale

use crate::error::CompressionError;
use crate::media::{CompressionResult, MediaAsset};
use crate::pipeline::PipelineEvent;
use crate::utils::calculate_reduction;
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Inizio della preparazione
    #[serde(rename = "start")]
    Start {
        input: PathBuf,
        size_bytes: u64,
        mime_type: String,
        threshold_bytes: u64,
    },

    /// Evento della pipeline
    #[serde(rename = "event")]
    Event { event: PipelineEvent },

    /// Payload pronto
    #[serde(rename = "complete")]
    Complete {
        output: PathBuf,
        mime_type: String,
        original_size: u64,
        final_size: u64,
        attempts_used: usize,
        compressed: bool,
        reduction_percent: f64,
        duration_seconds: f64,
    },

    /// Errore
    #[serde(rename = "error")]
    Error {
        kind: String,
        message: String,
        user_message: String,
    },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(input: PathBuf, asset: &MediaAsset, threshold_bytes: u64) -> Self {
        Self::Start {
            input,
            size_bytes: asset.size_bytes(),
            mime_type: asset.mime_type().to_string(),
            threshold_bytes,
        }
    }

    pub fn event(event: PipelineEvent) -> Self {
        Self::Event { event }
    }

    /// Crea un messaggio di completamento
    pub fn complete(
        output: PathBuf,
        asset: &MediaAsset,
        result: &CompressionResult,
        duration_seconds: f64,
    ) -> Self {
        Self::Complete {
            output,
            mime_type: result.mime_type.clone(),
            original_size: asset.size_bytes(),
            final_size: result.size_bytes(),
            attempts_used: result.attempts_used,
            compressed: result.was_compressed(),
            reduction_percent: calculate_reduction(asset.size_bytes(), result.size_bytes()),
            duration_seconds,
        }
    }

    /// Crea un messaggio di errore
    pub fn error(err: &CompressionError, threshold_mb: f64) -> Self {
        Self::Error {
            kind: error_kind(err).to_string(),
            message: err.to_string(),
            user_message: err.user_message(threshold_mb),
        }
    }
}

fn error_kind(err: &CompressionError) -> &'static str {
    match err {
        CompressionError::ProbeUnavailable(_) => "probe_unavailable",
        CompressionError::EncodeAttemptFailed { .. } => "encode_attempt_failed",
        CompressionError::UnableToCompressBelowThreshold { .. } => "unable_to_compress",
        CompressionError::CompressionFailed(_) => "compression_failed",
        CompressionError::Cancelled => "cancelled",
        CompressionError::UploadTooLarge { .. } => "upload_too_large",
        CompressionError::Validation(_) => "validation",
        CompressionError::Io(_) => "io",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn to_value(message: &JsonMessage) -> Value {
        serde_json::to_value(message).unwrap()
    }

    #[test]
    fn test_complete_message() {
        let asset = MediaAsset::new(vec![0u8; 400], "video/quicktime");
        let result = CompressionResult::compressed(vec![0u8; 100], 2);

        let json = to_value(&JsonMessage::complete(PathBuf::from("out.mp4"), &asset, &result, 1.5));

        assert_eq!(json["type"], "complete");
        assert_eq!(json["mime_type"], "video/mp4");
        assert_eq!(json["original_size"], 400);
        assert_eq!(json["final_size"], 100);
        assert_eq!(json["attempts_used"], 2);
        assert_eq!(json["compressed"], true);
        assert_eq!(json["reduction_percent"], 75.0);
    }

    #[test]
    fn test_event_is_nested() {
        let json = to_value(&JsonMessage::event(PipelineEvent::Exhausted { threshold_bytes: 10 }));
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"]["event"], "exhausted");
        assert_eq!(json["event"]["threshold_bytes"], 10);
    }

    #[test]
    fn test_error_message() {
        let err = CompressionError::UnableToCompressBelowThreshold { threshold_bytes: 1 };
        let json = to_value(&JsonMessage::error(&err, 200.0));

        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "unable_to_compress");
        assert!(json["user_message"].as_str().unwrap().contains("under 200 MB"));
    }
}
