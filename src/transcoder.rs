//! # Transcoder Module
//!
//! Questo modulo esegue un singolo tentativo di encode con FFmpeg.
//!
//! ## Responsabilità:
//! - Definisce il trait `Transcoder` usato dall'orchestratore
//! - Costruisce gli argomenti FFmpeg per un `EncodeAttempt`
//! - Esegue ffmpeg con timeout per tentativo (il processo viene ucciso allo scadere)
//! - Verifica che il file di output esista davvero
//!
//! ## Policy di codifica (fissa):
//! - Codec video: libx264, preset `veryfast`, CRF dal rung
//! - Codec audio: AAC a 128 kbps
//! - `-movflags +faststart` per la riproduzione progressiva
//! - Scala il lato indicato dal rung (`scale=640:-2` o `scale=-2:640`)
//! - `-t <secondi>` se il rung ha un limite di durata
//!
//! ## Errori:
//! - Ogni problema del tool (spawn, exit code, timeout, output mancante)
//!   diventa `EncodeAttemptFailed`, recuperabile
//! - Un output ancora troppo grande NON è un errore: lo decide il SizeGate

use crate::args;
use crate::command::ToolCommand;
use crate::error::CompressionError;
use crate::pipeline::ladder::{EncodeAttempt, ScaleAxis};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const VIDEO_CODEC: &str = "libx264";
const VIDEO_PRESET: &str = "veryfast";
const AUDIO_CODEC: &str = "aac";
const AUDIO_BITRATE: &str = "128k";

/// Runs one encode from `input` to `output`
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Whether the encoder tool can be used at all
    fn is_available(&self) -> bool;

    async fn transcode(
        &self,
        input: &Path,
        attempt: &EncodeAttempt,
        output: &Path,
    ) -> Result<(), CompressionError>;
}

/// `Transcoder` backed by the ffmpeg binary
pub struct FfmpegTranscoder {
    ffmpeg: Option<PathBuf>,
    attempt_timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg: Option<PathBuf>, attempt_timeout: Duration) -> Self {
        Self {
            ffmpeg,
            attempt_timeout,
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn is_available(&self) -> bool {
        self.ffmpeg.is_some()
    }

    async fn transcode(
        &self,
        input: &Path,
        attempt: &EncodeAttempt,
        output: &Path,
    ) -> Result<(), CompressionError> {
        let rung = attempt.sequence_index;
        let ffmpeg = self.ffmpeg.as_ref().ok_or_else(|| CompressionError::EncodeAttemptFailed {
            rung,
            reason: "ffmpeg not found".to_string(),
        })?;

        debug!(
            "🎬 Rung {}: {} -> {} ({}px, CRF {}, cap {:?})",
            rung,
            input.display(),
            output.display(),
            attempt.target_long_edge_px,
            attempt.quality_level,
            attempt.duration_limit_seconds
        );

        let verbose = tracing::enabled!(tracing::Level::DEBUG);
        let start_time = std::time::Instant::now();

        let tool_output = ToolCommand::new(ffmpeg)
            .args(encode_args(input, attempt, output, verbose))
            .timeout(self.attempt_timeout)
            .execute()
            .await
            .map_err(|e| CompressionError::EncodeAttemptFailed {
                rung,
                reason: e.to_string(),
            })?;

        let stderr = tool_output.stderr.trim();
        if !stderr.is_empty() {
            debug!("ffmpeg rung {} stderr:\n{}", rung, stderr);
        }

        // ffmpeg can exit 0 without writing anything (e.g. no decodable stream)
        if tokio::fs::metadata(output).await.is_err() {
            return Err(CompressionError::EncodeAttemptFailed {
                rung,
                reason: "ffmpeg produced no output file".to_string(),
            });
        }

        debug!("✅ Rung {} encoded in {:.1}s", rung, start_time.elapsed().as_secs_f64());
        Ok(())
    }
}

/// `scale` filter pinning the rung's axis and keeping the other even
pub fn scale_filter(attempt: &EncodeAttempt) -> String {
    match attempt.scale_axis {
        ScaleAxis::Width => format!("scale={}:-2", attempt.target_long_edge_px),
        ScaleAxis::Height => format!("scale=-2:{}", attempt.target_long_edge_px),
    }
}

/// Full ffmpeg argument list for one attempt
pub fn encode_args(input: &Path, attempt: &EncodeAttempt, output: &Path, verbose: bool) -> Vec<String> {
    let mut args = args!["-hide_banner", "-nostdin", "-y"];

    // Suppress FFmpeg output unless in debug mode
    if verbose {
        args.extend(args!["-loglevel", "info"]);
    } else {
        args.extend(args!["-loglevel", "warning"]);
    }

    args.extend(args!["-i", input.to_string_lossy()]);
    args.extend(args![
        "-vf", scale_filter(attempt),
        "-c:v", VIDEO_CODEC,
        "-preset", VIDEO_PRESET,
        "-crf", attempt.quality_level,
        "-c:a", AUDIO_CODEC,
        "-b:a", AUDIO_BITRATE,
        "-movflags", "+faststart",
    ]);

    if let Some(limit) = attempt.duration_limit_seconds {
        args.extend(args!["-t", format!("{:.3}", limit)]);
    }

    args.push(output.to_string_lossy().to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(axis: ScaleAxis, edge: u32, crf: u8, cap: Option<f64>) -> EncodeAttempt {
        EncodeAttempt {
            sequence_index: 2,
            target_long_edge_px: edge,
            quality_level: crf,
            duration_limit_seconds: cap,
            scale_axis: axis,
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(|s| s.as_str())
    }

    #[test]
    fn test_scale_filter_follows_axis() {
        assert_eq!(scale_filter(&attempt(ScaleAxis::Width, 640, 30, None)), "scale=640:-2");
        assert_eq!(scale_filter(&attempt(ScaleAxis::Height, 480, 36, None)), "scale=-2:480");
    }

    #[test]
    fn test_encode_args_codec_policy() {
        let args = encode_args(
            Path::new("/ws/in"),
            &attempt(ScaleAxis::Width, 640, 32, Some(25.5)),
            Path::new("/ws/out.mp4"),
            false,
        );

        assert_eq!(value_after(&args, "-i"), Some("/ws/in"));
        assert_eq!(value_after(&args, "-c:v"), Some("libx264"));
        assert_eq!(value_after(&args, "-preset"), Some("veryfast"));
        assert_eq!(value_after(&args, "-crf"), Some("32"));
        assert_eq!(value_after(&args, "-c:a"), Some("aac"));
        assert_eq!(value_after(&args, "-b:a"), Some("128k"));
        assert_eq!(value_after(&args, "-movflags"), Some("+faststart"));
        assert_eq!(value_after(&args, "-vf"), Some("scale=640:-2"));
        assert_eq!(value_after(&args, "-t"), Some("25.500"));
        assert_eq!(value_after(&args, "-loglevel"), Some("warning"));
        assert_eq!(args.last().map(|s| s.as_str()), Some("/ws/out.mp4"));
    }

    #[test]
    fn test_encode_args_without_duration_cap() {
        let args = encode_args(
            Path::new("in"),
            &attempt(ScaleAxis::Height, 640, 30, None),
            Path::new("out.mp4"),
            true,
        );
        assert!(!args.iter().any(|a| a == "-t"));
        assert_eq!(value_after(&args, "-loglevel"), Some("info"));
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_fails_attempt() {
        let transcoder = FfmpegTranscoder::new(None, Duration::from_secs(1));
        assert!(!transcoder.is_available());

        let err = transcoder
            .transcode(Path::new("in"), &attempt(ScaleAxis::Width, 640, 30, None), Path::new("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompressionError::EncodeAttemptFailed { rung: 2, .. }));
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_encode_times_out() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let ffmpeg = fake_ffmpeg(temp_dir.path(), "exec sleep 30");
        let transcoder = FfmpegTranscoder::new(Some(ffmpeg), Duration::from_millis(100));

        let start = std::time::Instant::now();
        let err = transcoder
            .transcode(
                Path::new("in"),
                &attempt(ScaleAxis::Width, 640, 30, None),
                &temp_dir.path().join("out.mp4"),
            )
            .await
            .unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(10));
        match err {
            CompressionError::EncodeAttemptFailed { rung: 2, reason } => {
                assert!(reason.contains("timed out"), "unexpected reason: {reason}")
            }
            other => panic!("expected a failed attempt, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_run_without_output_fails_attempt() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let ffmpeg = fake_ffmpeg(temp_dir.path(), "echo encoding >&2; exit 0");
        let transcoder = FfmpegTranscoder::new(Some(ffmpeg), Duration::from_secs(5));

        let err = transcoder
            .transcode(
                Path::new("in"),
                &attempt(ScaleAxis::Width, 640, 30, None),
                &temp_dir.path().join("out.mp4"),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no output file"));
    }

    #[tokio::test]
    async fn test_tool_failure_is_recoverable() {
        // `false` ignores its arguments and exits 1
        let transcoder = FfmpegTranscoder::new(Some(PathBuf::from("false")), Duration::from_secs(5));
        let temp_dir = tempfile::TempDir::new().unwrap();
        let result = transcoder
            .transcode(
                Path::new("in"),
                &attempt(ScaleAxis::Width, 640, 30, None),
                &temp_dir.path().join("out.mp4"),
            )
            .await;

        let err = result.unwrap_err();
        assert!(!err.is_fatal());
    }
}
