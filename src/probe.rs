//! # Metadata Probe Module
//!
//! Questo modulo estrae durata e risoluzione dal video caricato tramite ffprobe.
//!
//! ## Responsabilità:
//! - Definisce `Metadata` (durata, larghezza, altezza, tutti opzionali)
//! - Deriva l'orientamento (portrait se altezza >= larghezza)
//! - Espone il trait `MetadataProbe` usato dall'orchestratore
//! - Implementa `FfprobeProbe` con timeout e kill del processo
//!
//! ## Politica degrade-not-fail:
//! - ffprobe assente, fallito o con output illeggibile produce `ProbeUnavailable`
//! - L'orchestratore logga un warning e usa `Metadata::default()`
//! - Default: orientamento landscape, durata sconosciuta (nessun limite di durata)
//!
//! ## Sorgenti della durata:
//! 1. `duration` dello stream video (il primo con width e height)
//! 2. `format.duration` del container come fallback

use crate::command::ToolCommand;
use crate::error::CompressionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Video properties used to plan the encode ladder
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub duration_seconds: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Frame orientation, decides which axis gets scaled to the target long edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Metadata {
    /// Portrait when both dimensions are known and height >= width, landscape otherwise
    pub fn orientation(&self) -> Orientation {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 && h >= w => Orientation::Portrait,
            _ => Orientation::Landscape,
        }
    }

    /// Duration only when it is a usable positive number
    pub fn known_duration(&self) -> Option<f64> {
        self.duration_seconds.filter(|d| d.is_finite() && *d > 0.0)
    }
}

/// Reads metadata from a media file on local storage
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<Metadata, CompressionError>;
}

/// `MetadataProbe` backed by the ffprobe binary
pub struct FfprobeProbe {
    ffprobe: Option<PathBuf>,
    timeout: Duration,
}

impl FfprobeProbe {
    pub fn new(ffprobe: Option<PathBuf>, timeout: Duration) -> Self {
        Self { ffprobe, timeout }
    }
}

#[async_trait]
impl MetadataProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<Metadata, CompressionError> {
        let ffprobe = self
            .ffprobe
            .as_ref()
            .ok_or_else(|| CompressionError::ProbeUnavailable("ffprobe not found".to_string()))?;

        let output = ToolCommand::new(ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path.to_string_lossy())
            .timeout(self.timeout)
            .execute()
            .await
            .map_err(|e| CompressionError::ProbeUnavailable(e.to_string()))?;

        let metadata = parse_ffprobe_output(&output.stdout)?;
        debug!("Probed {}: {:?}", path.display(), metadata);
        Ok(metadata)
    }
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output
pub fn parse_ffprobe_output(json: &str) -> Result<Metadata, CompressionError> {
    let info: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| CompressionError::ProbeUnavailable(format!("invalid ffprobe output: {}", e)))?;

    let empty_vec = vec![];
    let streams = info["streams"].as_array().unwrap_or(&empty_vec);
    let video_stream = streams
        .iter()
        .find(|s| positive_u32(&s["width"]).is_some() && positive_u32(&s["height"]).is_some());

    let (width, height, stream_duration) = match video_stream {
        Some(s) => (
            positive_u32(&s["width"]),
            positive_u32(&s["height"]),
            seconds(&s["duration"]),
        ),
        None => (None, None, None),
    };

    Ok(Metadata {
        duration_seconds: stream_duration.or_else(|| seconds(&info["format"]["duration"])),
        width,
        height,
    })
}

fn positive_u32(value: &serde_json::Value) -> Option<u32> {
    value
        .as_u64()
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
}

// ffprobe reports durations as strings ("30.000000"), sometimes "N/A"
fn seconds(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.filter(|d| d.is_finite() && *d > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_landscape_with_stream_duration() {
        let json = r#"{
            "streams": [
                {"codec_type": "audio", "duration": "31.2"},
                {"codec_type": "video", "width": 1920, "height": 1080, "duration": "30.000000"}
            ],
            "format": {"duration": "31.200000"}
        }"#;

        let metadata = parse_ffprobe_output(json).unwrap();
        assert_eq!(metadata.width, Some(1920));
        assert_eq!(metadata.height, Some(1080));
        assert_eq!(metadata.duration_seconds, Some(30.0));
        assert_eq!(metadata.orientation(), Orientation::Landscape);
    }

    #[test]
    fn test_parse_portrait_falls_back_to_format_duration() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 1080, "height": 1920, "duration": "N/A"}],
            "format": {"duration": "60.5"}
        }"#;

        let metadata = parse_ffprobe_output(json).unwrap();
        assert_eq!(metadata.duration_seconds, Some(60.5));
        assert_eq!(metadata.orientation(), Orientation::Portrait);
    }

    #[test]
    fn test_square_frame_is_portrait() {
        let metadata = Metadata {
            duration_seconds: None,
            width: Some(720),
            height: Some(720),
        };
        assert_eq!(metadata.orientation(), Orientation::Portrait);
    }

    #[test]
    fn test_parse_without_video_stream() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        let metadata = parse_ffprobe_output(json).unwrap();
        assert_eq!(metadata, Metadata::default());
        assert_eq!(metadata.orientation(), Orientation::Landscape);
        assert_eq!(metadata.known_duration(), None);
    }

    #[test]
    fn test_parse_garbage_is_probe_unavailable() {
        let err = parse_ffprobe_output("not json").unwrap_err();
        assert!(matches!(err, CompressionError::ProbeUnavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_ffprobe_is_probe_unavailable() {
        let probe = FfprobeProbe::new(None, Duration::from_secs(1));
        let err = probe.probe(Path::new("/tmp/whatever.mp4")).await.unwrap_err();
        assert!(matches!(err, CompressionError::ProbeUnavailable(_)));
        assert!(!err.is_fatal());
    }
}
