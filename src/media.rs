//! # Media Types Module
//!
//! Tipi che entrano ed escono dalla pipeline.
//!
//! ## Strutture dati:
//! - `MediaAsset`: l'upload originale (bytes, mime, dimensione), immutabile
//! - `CompressionResult`: il payload pronto per il consumer (bytes, mime, tentativi usati)
//!
//! ## Mime type:
//! - Se il mime dichiarato è vuoto si usa `video/mp4`
//! - Il risultato compresso è sempre `video/mp4`
//! - Da file, il mime viene dedotto dall'estensione

use crate::error::CompressionError;
use bytes::Bytes;
use std::path::Path;

/// Mime type used for compressed output and for uploads that declare none
pub const DEFAULT_MIME_TYPE: &str = "video/mp4";

/// The original upload
#[derive(Debug, Clone)]
pub struct MediaAsset {
    bytes: Bytes,
    mime_type: String,
    size_bytes: u64,
}

impl MediaAsset {
    pub fn new(bytes: impl Into<Bytes>, declared_mime_type: &str) -> Self {
        let bytes = bytes.into();
        let mime_type = match declared_mime_type.trim() {
            "" => DEFAULT_MIME_TYPE.to_string(),
            declared => declared.to_string(),
        };
        Self {
            size_bytes: bytes.len() as u64,
            bytes,
            mime_type,
        }
    }

    /// Read a file, inferring the mime type from its extension unless given
    pub async fn from_file(path: &Path, mime_type: Option<&str>) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let mime = mime_type
            .map(str::to_string)
            .unwrap_or_else(|| mime_from_extension(path).to_string());
        Ok(Self::new(bytes, &mime))
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Reject uploads the pipeline must never see
    pub fn validate(&self, max_upload_bytes: u64) -> Result<(), CompressionError> {
        if self.size_bytes == 0 {
            return Err(CompressionError::Validation("Video file is empty".to_string()));
        }
        if self.size_bytes > max_upload_bytes {
            return Err(CompressionError::UploadTooLarge {
                size_bytes: self.size_bytes,
                max_bytes: max_upload_bytes,
            });
        }
        Ok(())
    }
}

/// Ready-to-send payload
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionResult {
    pub bytes: Bytes,
    pub mime_type: String,
    /// 0 when the original was returned unchanged
    pub attempts_used: usize,
}

impl CompressionResult {
    /// The original upload, untouched
    pub fn unchanged(asset: &MediaAsset) -> Self {
        Self {
            bytes: asset.bytes.clone(),
            mime_type: asset.mime_type.clone(),
            attempts_used: 0,
        }
    }

    pub fn compressed(bytes: impl Into<Bytes>, attempts_used: usize) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            attempts_used,
        }
    }

    pub fn was_compressed(&self) -> bool {
        self.attempts_used > 0
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Video mime type for common container extensions
pub fn mime_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "3gp" => "video/3gpp",
        "m4v" => "video/x-m4v",
        _ => DEFAULT_MIME_TYPE,
    }
}
