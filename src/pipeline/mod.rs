//! # Compression Pipeline
//!
//! Pipeline adattiva: skip check, probe, ladder di tentativi, size gate.
//!
//! ## Moduli:
//! - `ladder`: pianificazione pura dei rung
//! - `size_gate`: confronto dimensione/soglia
//! - `state`: macchina a stati e regola di concatenamento
//! - `events`: eventi per osservatori esterni
//! - `orchestrator`: coordinamento di una richiesta

pub mod events;
pub mod ladder;
pub mod orchestrator;
pub mod size_gate;
pub mod state;

pub use events::PipelineEvent;
pub use ladder::{plan, EncodeAttempt, LadderPolicy, RungPolicy, ScaleAxis};
pub use orchestrator::{Orchestrator, PipelineSettings};
pub use size_gate::SizeGate;
pub use state::{AttemptOutcome, PipelineState};
