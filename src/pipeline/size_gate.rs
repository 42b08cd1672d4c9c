//! # Size Gate
//!
//! Predicato puro che confronta la dimensione di un file con la soglia in byte.

use std::path::Path;

/// `true` when `file_size` does not exceed `threshold`
pub fn fits(file_size: u64, threshold: u64) -> bool {
    file_size <= threshold
}

/// Byte threshold fixed for the lifetime of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeGate {
    threshold_bytes: u64,
}

impl SizeGate {
    pub fn new(threshold_bytes: u64) -> Self {
        Self { threshold_bytes }
    }

    pub fn threshold_bytes(&self) -> u64 {
        self.threshold_bytes
    }

    pub fn fits(&self, file_size: u64) -> bool {
        fits(file_size, self.threshold_bytes)
    }

    /// Size of a produced file on disk
    pub async fn measure(path: &Path) -> std::io::Result<u64> {
        Ok(tokio::fs::metadata(path).await?.len())
    }
}
