//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione process-wide della pipeline.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config`, costruita una sola volta all'avvio
//! - Carica i valori da variabili d'ambiente (`.env` supportato dal binario)
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce validazione robusta e valori di default sensati
//!
//! ## Parametri di configurazione:
//! - `max_upload_mb`: dimensione massima accettata per l'upload (default: 200)
//! - `compression_threshold_mb`: soglia oltre la quale si comprime (default: = max_upload_mb)
//! - `ffmpeg_path` / `ffprobe_path`: path espliciti dei tool (default: ricerca nel PATH)
//! - `ladder`: rung di compressione (default: 640/CRF30, 640/CRF32, 480/CRF36)
//! - `attempt_timeout_secs`: timeout per singolo encode (default: 600)
//! - `request_budget_secs`: budget totale per tutti i rung (default: 1800)
//! - `probe_timeout_secs`: timeout di ffprobe (default: 30)
//! - `temp_dir_prefix`: prefisso della directory temporanea (default: "nonverbal-ai-")
//! - `temp_root`: directory in cui creare i workspace (default: temp dir di sistema)
//!
//! ## Variabili d'ambiente:
//! - `MAX_VIDEO_SIZE_MB`, `COMPRESSION_THRESHOLD_MB`, `FFMPEG_PATH`, `FFPROBE_PATH`
//! - Valori non numerici o non positivi vengono ignorati (si usa il default)
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     compression_threshold_mb: Some(20.0),
//!     ..Config::from_env()
//! };
//! config.validate()?;
//! ```

use crate::pipeline::ladder::LadderPolicy;
use crate::utils::mb_to_bytes;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Process-wide configuration, immutable once the pipeline is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Largest upload accepted, in MB
    pub max_upload_mb: f64,
    /// Size above which compression kicks in, in MB (None = same as max upload)
    pub compression_threshold_mb: Option<f64>,
    /// Explicit ffmpeg binary
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe binary
    pub ffprobe_path: Option<PathBuf>,
    /// Encode attempts, gentlest first
    pub ladder: LadderPolicy,
    /// Timeout for a single ffmpeg run
    pub attempt_timeout_secs: u64,
    /// Wall-clock budget for all rungs of one request
    pub request_budget_secs: u64,
    /// Timeout for ffprobe
    pub probe_timeout_secs: u64,
    /// Prefix of the per-request temporary directory
    pub temp_dir_prefix: String,
    /// Parent directory for workspaces (None = system temp dir)
    pub temp_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_upload_mb: 200.0,
            compression_threshold_mb: None,
            ffmpeg_path: None,
            ffprobe_path: None,
            ladder: LadderPolicy::default(),
            attempt_timeout_secs: 600,
            request_budget_secs: 1800,
            probe_timeout_secs: 30,
            temp_dir_prefix: "nonverbal-ai-".to_string(),
            temp_root: None,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.max_upload_mb.is_finite() || self.max_upload_mb <= 0.0 {
            return Err(anyhow::anyhow!("Max upload size must be a positive number of MB"));
        }

        let threshold = self.threshold_mb();
        if !threshold.is_finite() || threshold <= 0.0 || self.threshold_bytes() == 0 {
            return Err(anyhow::anyhow!("Compression threshold must be a positive number of MB"));
        }
        if threshold > self.max_upload_mb {
            warn!(
                "Compression threshold ({} MB) is above the max upload size ({} MB); uploads will never be compressed",
                threshold, self.max_upload_mb
            );
        }

        self.ladder.validate()?;

        if self.attempt_timeout_secs == 0 || self.request_budget_secs == 0 || self.probe_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Timeouts must be greater than 0 seconds"));
        }

        if self.temp_dir_prefix.is_empty() {
            return Err(anyhow::anyhow!("Temporary directory prefix must not be empty"));
        }

        if let Some(ref temp_root) = self.temp_root {
            if !temp_root.is_dir() {
                return Err(anyhow::anyhow!("Temp root is not a directory: {}", temp_root.display()));
            }
        }

        Ok(())
    }

    /// Build from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let positive_mb = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v > 0.0)
        };
        let path = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };

        Self {
            max_upload_mb: positive_mb("MAX_VIDEO_SIZE_MB").unwrap_or(defaults.max_upload_mb),
            compression_threshold_mb: positive_mb("COMPRESSION_THRESHOLD_MB"),
            ffmpeg_path: path("FFMPEG_PATH"),
            ffprobe_path: path("FFPROBE_PATH"),
            ..defaults
        }
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn threshold_mb(&self) -> f64 {
        self.compression_threshold_mb.unwrap_or(self.max_upload_mb)
    }

    pub fn threshold_bytes(&self) -> u64 {
        mb_to_bytes(self.threshold_mb())
    }

    pub fn max_upload_bytes(&self) -> u64 {
        mb_to_bytes(self.max_upload_mb)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn request_budget(&self) -> Duration {
        Duration::from_secs(self.request_budget_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn from_map(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_upload_mb, 200.0);
        assert_eq!(config.threshold_mb(), 200.0);
        assert_eq!(config.threshold_bytes(), 200 * 1024 * 1024);
        assert_eq!(config.ladder.rungs.len(), 3);
        assert_eq!(config.temp_dir_prefix, "nonverbal-ai-");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.max_upload_mb = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.compression_threshold_mb = Some(-1.0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.attempt_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ladder.rungs[1].crf = 20;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.temp_root = Some(PathBuf::from("/definitely/not/a/dir"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_defaults_to_max_upload() {
        let config = from_map(&[("MAX_VIDEO_SIZE_MB", "50")]);
        assert_eq!(config.max_upload_mb, 50.0);
        assert_eq!(config.threshold_bytes(), 50 * 1024 * 1024);

        let config = from_map(&[("MAX_VIDEO_SIZE_MB", "50"), ("COMPRESSION_THRESHOLD_MB", "20")]);
        assert_eq!(config.threshold_bytes(), 20 * 1024 * 1024);
        assert_eq!(config.max_upload_bytes(), 50 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_env_values_fall_back() {
        let config = from_map(&[
            ("MAX_VIDEO_SIZE_MB", "lots"),
            ("COMPRESSION_THRESHOLD_MB", "0"),
            ("FFMPEG_PATH", "  "),
            ("FFPROBE_PATH", "/opt/ffprobe"),
        ]);
        assert_eq!(config.max_upload_mb, 200.0);
        assert_eq!(config.compression_threshold_mb, None);
        assert_eq!(config.ffmpeg_path, None);
        assert_eq!(config.ffprobe_path, Some(PathBuf::from("/opt/ffprobe")));
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = Config {
            max_upload_mb: 100.0,
            compression_threshold_mb: Some(18.5),
            attempt_timeout_secs: 120,
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config, original_config);
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        tokio::fs::write(&config_path, r#"{"compression_threshold_mb": 20}"#).await.unwrap();

        let config = Config::from_file(&config_path).await.unwrap();
        assert_eq!(config.threshold_mb(), 20.0);
        assert_eq!(config.max_upload_mb, 200.0);
        assert_eq!(config.ladder, LadderPolicy::default());

        let missing = Config::from_file(&temp_dir.path().join("missing.json")).await.unwrap();
        assert_eq!(missing, Config::default());
    }
}
