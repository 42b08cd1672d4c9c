//! # Video Prep Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Prepara un video caricato per un consumer con limite di dimensione
//! - Se il video supera la soglia lo ricomprime con una ladder di tentativi ffmpeg
//! - Espone i tipi principali tramite re-exports
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione process-wide e validazione
//! - `error`: Tassonomia degli errori della pipeline
//! - `media`: Upload originale e payload risultante
//! - `pipeline`: Ladder, size gate, macchina a stati e orchestratore
//! - `probe`: Metadati del video tramite ffprobe
//! - `transcoder`: Singolo encode tramite ffmpeg
//! - `command`: Esecuzione dei tool esterni con timeout
//! - `workspace`: Directory temporanea per richiesta
//! - `tool_resolver`: Ricerca dei binari ffmpeg/ffprobe
//! - `json_output` / `progress`: Output per il binario
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use video_prep::{Config, MediaAsset, Orchestrator};
//! use video_prep::tool_resolver::ToolPathResolver;
//!
//! let config = Config::from_env();
//! let tools = ToolPathResolver::from_config(&config).resolve();
//! let orchestrator = Orchestrator::from_config(&config, &tools);
//!
//! let asset = MediaAsset::new(upload_bytes, "video/mp4");
//! let result = orchestrator.prepare(&asset).await?;
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod json_output;
pub mod media;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod tool_resolver;
pub mod transcoder;
pub mod utils;
pub mod workspace;

pub use config::Config;
pub use error::CompressionError;
pub use media::{CompressionResult, MediaAsset};
pub use pipeline::Orchestrator;
