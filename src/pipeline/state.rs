//! # Pipeline State Machine
//!
//! `NotStarted → Probing → Planning → Attempting(i, base) → Succeeded | Exhausted | Failed`
//!
//! Lo stato `Attempting` porta con sé il file di input corrente (`base`).
//! La regola di concatenamento vive tutta in `after_attempt`:
//! - encode fallito: la base non cambia, si passa al rung successivo
//! - output sopra soglia: la base diventa quell'output (i rung seguenti ricodificano il file già ridotto)
//! - output sotto soglia: `Succeeded`

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    NotStarted,
    Probing,
    Planning,
    Attempting {
        /// 0-based index into the planned ladder
        rung: usize,
        /// Input of this rung: the original upload or the last oversized output
        base: PathBuf,
    },
    /// `output` is `None` when the original is returned (skip or fallback)
    Succeeded {
        output: Option<PathBuf>,
        attempts_used: usize,
    },
    Exhausted,
    Failed,
}

/// Result of running one rung
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    EncodeFailed,
    Oversized { output: PathBuf },
    Fits { output: PathBuf },
}

impl PipelineState {
    /// First ladder state, reading from the original upload
    pub fn first_attempt(original: PathBuf) -> Self {
        Self::Attempting {
            rung: 0,
            base: original,
        }
    }

    /// Terminal state for a request answered with the untouched original
    pub fn original_returned() -> Self {
        Self::Succeeded {
            output: None,
            attempts_used: 0,
        }
    }

    /// Transition after a rung finishes.
    ///
    /// Only `Attempting` reacts to outcomes; any other state is returned unchanged.
    pub fn after_attempt(self, outcome: AttemptOutcome, ladder_len: usize) -> Self {
        let (rung, base) = match self {
            Self::Attempting { rung, base } => (rung, base),
            other => return other,
        };

        let next_base = match outcome {
            AttemptOutcome::Fits { output } => {
                return Self::Succeeded {
                    output: Some(output),
                    attempts_used: rung + 1,
                }
            }
            AttemptOutcome::Oversized { output } => output,
            AttemptOutcome::EncodeFailed => base,
        };

        if rung + 1 < ladder_len {
            Self::Attempting {
                rung: rung + 1,
                base: next_base,
            }
        } else {
            Self::Exhausted
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Exhausted | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Probing => write!(f, "probing"),
            Self::Planning => write!(f, "planning"),
            Self::Attempting { rung, .. } => write!(f, "attempting({})", rung + 1),
            Self::Succeeded { attempts_used, .. } => write!(f, "succeeded({})", attempts_used),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> PathBuf {
        PathBuf::from(name)
    }

    #[test]
    fn test_fit_on_first_rung() {
        let state = PipelineState::first_attempt(p("input"));
        let state = state.after_attempt(AttemptOutcome::Fits { output: p("a1.mp4") }, 3);
        assert_eq!(
            state,
            PipelineState::Succeeded {
                output: Some(p("a1.mp4")),
                attempts_used: 1
            }
        );
        assert!(state.is_terminal());
    }

    #[test]
    fn test_oversized_output_becomes_base() {
        let state = PipelineState::first_attempt(p("input"));
        let state = state.after_attempt(AttemptOutcome::Oversized { output: p("a1.mp4") }, 3);
        assert_eq!(
            state,
            PipelineState::Attempting {
                rung: 1,
                base: p("a1.mp4")
            }
        );
    }

    #[test]
    fn test_failed_encode_keeps_base() {
        let state = PipelineState::first_attempt(p("input"))
            .after_attempt(AttemptOutcome::Oversized { output: p("a1.mp4") }, 3)
            .after_attempt(AttemptOutcome::EncodeFailed, 3);
        assert_eq!(
            state,
            PipelineState::Attempting {
                rung: 2,
                base: p("a1.mp4")
            }
        );
    }

    #[test]
    fn test_last_rung_exhausts() {
        let state = PipelineState::Attempting {
            rung: 2,
            base: p("a2.mp4"),
        };
        assert_eq!(
            state.clone().after_attempt(AttemptOutcome::Oversized { output: p("a3.mp4") }, 3),
            PipelineState::Exhausted
        );
        assert_eq!(
            state.after_attempt(AttemptOutcome::EncodeFailed, 3),
            PipelineState::Exhausted
        );
    }

    #[test]
    fn test_success_on_third_rung_counts_attempts() {
        let state = PipelineState::first_attempt(p("input"))
            .after_attempt(AttemptOutcome::Oversized { output: p("a1.mp4") }, 3)
            .after_attempt(AttemptOutcome::Oversized { output: p("a2.mp4") }, 3)
            .after_attempt(AttemptOutcome::Fits { output: p("a3.mp4") }, 3);
        assert_eq!(
            state,
            PipelineState::Succeeded {
                output: Some(p("a3.mp4")),
                attempts_used: 3
            }
        );
    }

    #[test]
    fn test_non_attempting_states_ignore_outcomes() {
        for state in [PipelineState::NotStarted, PipelineState::Exhausted, PipelineState::Failed] {
            let next = state.clone().after_attempt(AttemptOutcome::Fits { output: p("x") }, 3);
            assert_eq!(next, state);
        }
    }

    #[test]
    fn test_original_returned_is_terminal() {
        let state = PipelineState::original_returned();
        assert!(state.is_terminal());
        assert_eq!(state.to_string(), "succeeded(0)");
        assert_eq!(state.clone().after_attempt(AttemptOutcome::EncodeFailed, 3), state);
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::first_attempt(p("in")).is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(PipelineState::first_attempt(p("in")).to_string(), "attempting(1)");
        assert_eq!(PipelineState::Exhausted.to_string(), "exhausted");
    }
}
