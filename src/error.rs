//! # Error Types Module
//!
//! Questo modulo definisce la tassonomia degli errori della pipeline di compressione.
//!
//! ## Responsabilità:
//! - Definisce `CompressionError` enum per classificare ogni esito negativo
//! - Distingue errori recuperabili (per singolo tentativo) da errori fatali
//! - Fornisce il messaggio per l'utente finale usato dal chiamante
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `ProbeUnavailable`: ffprobe assente o fallito, solo warning (si usano i default)
//! - `EncodeAttemptFailed`: un singolo tentativo ffmpeg fallito, si passa al successivo
//! - `UnableToCompressBelowThreshold`: tutti i tentativi esauriti sopra soglia
//! - `CompressionFailed`: errore inatteso e l'originale supera la soglia
//! - `Cancelled`: la richiesta è stata abbandonata
//! - `UploadTooLarge`: l'upload supera il limite massimo accettato
//! - `Validation`: input rifiutato prima di iniziare (file vuoto)
//! - `Io`: errori di I/O interni, riclassificati dall'orchestratore
//!
//! ## Esempio:
//! ```rust,ignore
//! match orchestrator.prepare(asset).await {
//!     Err(e) if e.is_size_limit() => eprintln!("{}", e.user_message(200.0)),
//!     other => { /* ... */ }
//! }
//! ```

/// Errors produced while preparing a video for the size-limited consumer
#[derive(thiserror::Error, Debug)]
pub enum CompressionError {
    #[error("Metadata probe unavailable: {0}")]
    ProbeUnavailable(String),

    #[error("Encode attempt {rung} failed: {reason}")]
    EncodeAttemptFailed { rung: usize, reason: String },

    #[error("Unable to compress below threshold of {threshold_bytes} bytes")]
    UnableToCompressBelowThreshold { threshold_bytes: u64 },

    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Compression cancelled")]
    Cancelled,

    #[error("Upload of {size_bytes} bytes exceeds the {max_bytes} byte limit")]
    UploadTooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("Input validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompressionError {
    /// Whether the request must be failed (as opposed to a logged, absorbed condition)
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ProbeUnavailable(_) | Self::EncodeAttemptFailed { .. }
        )
    }

    /// Errors the caller reports as "payload too large"
    pub fn is_size_limit(&self) -> bool {
        matches!(
            self,
            Self::UnableToCompressBelowThreshold { .. }
                | Self::CompressionFailed(_)
                | Self::UploadTooLarge { .. }
        )
    }

    /// Message shown to the uploader for size-limit errors
    pub fn user_message(&self, threshold_mb: f64) -> String {
        if let Self::UploadTooLarge { max_bytes, .. } = self {
            return format!(
                "Video is too large. Max supported size is {} MB.",
                *max_bytes as f64 / (1024.0 * 1024.0)
            );
        }
        if self.is_size_limit() {
            format!(
                "Unable to prepare video under {} MB for analysis. Please upload a shorter or smaller clip.",
                threshold_mb
            )
        } else {
            self.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rung_level_errors_are_not_fatal() {
        assert!(!CompressionError::ProbeUnavailable("no ffprobe".into()).is_fatal());
        assert!(!CompressionError::EncodeAttemptFailed { rung: 2, reason: "exit 1".into() }.is_fatal());
        assert!(CompressionError::UnableToCompressBelowThreshold { threshold_bytes: 10 }.is_fatal());
        assert!(CompressionError::CompressionFailed("disk".into()).is_fatal());
        assert!(CompressionError::Cancelled.is_fatal());
    }

    #[test]
    fn test_size_limit_classification() {
        assert!(CompressionError::UnableToCompressBelowThreshold { threshold_bytes: 10 }.is_size_limit());
        assert!(CompressionError::CompressionFailed("x".into()).is_size_limit());
        assert!(CompressionError::UploadTooLarge { size_bytes: 2, max_bytes: 1 }.is_size_limit());
        assert!(!CompressionError::Cancelled.is_size_limit());
        assert!(!CompressionError::Validation("empty".into()).is_size_limit());
    }

    #[test]
    fn test_user_message() {
        let err = CompressionError::UnableToCompressBelowThreshold { threshold_bytes: 1 };
        let msg = err.user_message(200.0);
        assert!(msg.contains("under 200 MB"));
        assert!(msg.contains("shorter or smaller clip"));

        let err = CompressionError::UploadTooLarge { size_bytes: 300 * 1024 * 1024, max_bytes: 200 * 1024 * 1024 };
        assert_eq!(err.user_message(150.0), "Video is too large. Max supported size is 200 MB.");

        let err = CompressionError::Validation("empty upload".into());
        assert_eq!(err.user_message(200.0), "Input validation error: empty upload");
    }
}
