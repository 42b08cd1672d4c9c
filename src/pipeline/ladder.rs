//! # Attempt Ladder Module
//!
//! Pianificazione pura dei tentativi di encode, dal più leggero al più aggressivo.
//!
//! ## Ladder di default:
//! | rung | lato lungo | CRF | limite durata |
//! |---|---|---|---|
//! | 1 | 640 px | 30 | nessuno |
//! | 2 | 640 px | 32 | 0.85 × durata |
//! | 3 | 480 px | 36 | 0.65 × durata |
//!
//! ## Regole:
//! - L'orientamento decide l'asse scalato (portrait: altezza, landscape: larghezza)
//! - Il limite di durata si applica solo se la durata è nota, con minimo 5 secondi
//! - La ladder viene generata una sola volta per richiesta, prima di ogni encode
//! - Monotonia: lato lungo non crescente, CRF non decrescente, limite durata non crescente

use crate::probe::{Metadata, Orientation};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Highest CRF accepted by libx264
const MAX_CRF: u8 = 51;

/// Which output dimension is pinned to the target long edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleAxis {
    Width,
    Height,
}

impl From<Orientation> for ScaleAxis {
    fn from(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Landscape => ScaleAxis::Width,
            Orientation::Portrait => ScaleAxis::Height,
        }
    }
}

/// One configured rung, before metadata is applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RungPolicy {
    /// Target size of the scaled axis in pixels
    pub long_edge_px: u32,
    /// x264 CRF (higher = more loss)
    pub crf: u8,
    /// Fraction of the probed duration to keep; `None` keeps the full clip
    pub duration_factor: Option<f64>,
}

impl RungPolicy {
    pub fn new(long_edge_px: u32, crf: u8, duration_factor: Option<f64>) -> Self {
        Self {
            long_edge_px,
            crf,
            duration_factor,
        }
    }
}

/// Tunable ladder parameters, part of the process-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderPolicy {
    pub rungs: Vec<RungPolicy>,
    /// Floor applied to every computed duration cap
    pub min_duration_cap_secs: f64,
}

impl Default for LadderPolicy {
    fn default() -> Self {
        Self {
            rungs: vec![
                RungPolicy::new(640, 30, None),
                RungPolicy::new(640, 32, Some(0.85)),
                RungPolicy::new(480, 36, Some(0.65)),
            ],
            min_duration_cap_secs: 5.0,
        }
    }
}

impl LadderPolicy {
    /// Check that the rungs get strictly no gentler from one to the next
    pub fn validate(&self) -> Result<()> {
        if self.rungs.is_empty() {
            return Err(anyhow::anyhow!("Compression ladder must have at least one rung"));
        }

        if !self.min_duration_cap_secs.is_finite() || self.min_duration_cap_secs <= 0.0 {
            return Err(anyhow::anyhow!("Minimum duration cap must be a positive number of seconds"));
        }

        for (i, rung) in self.rungs.iter().enumerate() {
            if rung.long_edge_px == 0 {
                return Err(anyhow::anyhow!("Rung {}: long edge must be greater than 0", i + 1));
            }
            if rung.crf > MAX_CRF {
                return Err(anyhow::anyhow!("Rung {}: CRF must be between 0 and {}", i + 1, MAX_CRF));
            }
            if let Some(factor) = rung.duration_factor {
                if !factor.is_finite() || factor <= 0.0 || factor > 1.0 {
                    return Err(anyhow::anyhow!("Rung {}: duration factor must be in (0, 1]", i + 1));
                }
            }
        }

        for (i, pair) in self.rungs.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            let rung = i + 2;
            if next.long_edge_px > prev.long_edge_px {
                return Err(anyhow::anyhow!("Rung {}: long edge may not grow ({} -> {})", rung, prev.long_edge_px, next.long_edge_px));
            }
            if next.crf < prev.crf {
                return Err(anyhow::anyhow!("Rung {}: CRF may not decrease ({} -> {})", rung, prev.crf, next.crf));
            }
            match (prev.duration_factor, next.duration_factor) {
                (Some(_), None) => {
                    return Err(anyhow::anyhow!("Rung {}: an uncapped rung may not follow a capped one", rung));
                }
                (Some(p), Some(n)) if n > p => {
                    return Err(anyhow::anyhow!("Rung {}: duration factor may not grow ({} -> {})", rung, p, n));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// One rung of a planned ladder, immutable once generated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeAttempt {
    /// 1-based position in the ladder
    pub sequence_index: usize,
    pub target_long_edge_px: u32,
    pub quality_level: u8,
    pub duration_limit_seconds: Option<f64>,
    pub scale_axis: ScaleAxis,
}

/// Build the ordered list of encode attempts for a clip.
///
/// Metadata may be empty (probe unavailable): the clip is then treated as
/// landscape with unbounded duration.
pub fn plan(metadata: &Metadata, policy: &LadderPolicy) -> Vec<EncodeAttempt> {
    let scale_axis = ScaleAxis::from(metadata.orientation());
    let duration = metadata.known_duration();

    policy
        .rungs
        .iter()
        .enumerate()
        .map(|(i, rung)| EncodeAttempt {
            sequence_index: i + 1,
            target_long_edge_px: rung.long_edge_px,
            quality_level: rung.crf,
            duration_limit_seconds: match (rung.duration_factor, duration) {
                (Some(factor), Some(d)) => Some((d * factor).max(policy.min_duration_cap_secs)),
                _ => None,
            },
            scale_axis,
        })
        .collect()
}
