//! # Tool Path Resolver
//!
//! Questo modulo trova i binari esterni usati dalla pipeline (ffmpeg, ffprobe).
//!
//! ## Strategia di risoluzione:
//! 1. Path esplicito da configurazione (`FFMPEG_PATH` / `FFPROBE_PATH`)
//! 2. Per ffprobe: il binario accanto a ffmpeg, se presente
//! 3. Ricerca nel `PATH` di sistema
//!
//! Un path esplicito che non esiste rende il tool non disponibile (nessun
//! fallback silenzioso sul `PATH`): la pipeline degrada come da policy.

use crate::config::Config;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";

/// Resolved tool locations; `None` means the tool is unavailable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolPaths {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
}

/// Tool path resolver honoring explicit overrides
#[derive(Debug, Clone, Default)]
pub struct ToolPathResolver {
    ffmpeg_override: Option<PathBuf>,
    ffprobe_override: Option<PathBuf>,
}

impl ToolPathResolver {
    pub fn new(ffmpeg_override: Option<PathBuf>, ffprobe_override: Option<PathBuf>) -> Self {
        Self {
            ffmpeg_override,
            ffprobe_override,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone())
    }

    /// Resolve both tools once, at startup
    pub fn resolve(&self) -> ToolPaths {
        let ffmpeg = self.resolve_tool(FFMPEG);
        let ffprobe = match self.ffprobe_override {
            Some(_) => self.resolve_tool(FFPROBE),
            None => ffmpeg
                .as_deref()
                .and_then(|ffmpeg| sibling_tool(ffmpeg, FFPROBE))
                .or_else(|| self.resolve_tool(FFPROBE)),
        };

        ToolPaths { ffmpeg, ffprobe }
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        debug!("Resolving tool: {}", tool_name);

        let explicit = match tool_name {
            FFMPEG => self.ffmpeg_override.as_ref(),
            FFPROBE => self.ffprobe_override.as_ref(),
            _ => None,
        };

        if let Some(path) = explicit {
            return match which::which(path) {
                Ok(resolved) => {
                    debug!("Using configured tool: {} -> {:?}", tool_name, resolved);
                    Some(resolved)
                }
                Err(e) => {
                    warn!("Configured {} path {:?} is not usable: {}", tool_name, path, e);
                    None
                }
            };
        }

        if let Some(system_path) = find_in_system_path(tool_name) {
            debug!("Using system tool: {} -> {:?}", tool_name, system_path);
            return Some(system_path);
        }

        warn!("Tool not found: {}", tool_name);
        None
    }

    /// Check if a tool is available and provide installation instructions if not
    pub fn check_tool_with_instructions(&self, tool_name: &str) -> Result<PathBuf, String> {
        let resolved = match tool_name {
            FFMPEG => self.resolve().ffmpeg,
            FFPROBE => self.resolve().ffprobe,
            other => self.resolve_tool(other),
        };

        resolved.ok_or_else(|| {
            if cfg!(target_os = "linux") {
                format!(
                    "Tool '{}' not found in system PATH.\n\
                    To install on Linux, run:\n  {}",
                    tool_name,
                    linux_install_instructions(tool_name)
                )
            } else {
                format!("Tool '{}' not found. Please ensure it's installed or set its path explicitly.", tool_name)
            }
        })
    }

    /// Get a report of tool availability
    pub fn get_tools_report(&self) -> String {
        let mut report = String::new();
        report.push_str("Tool Path Resolver Report\n");
        report.push_str(&format!("Configured ffmpeg: {:?}\n", self.ffmpeg_override));
        report.push_str(&format!("Configured ffprobe: {:?}\n", self.ffprobe_override));
        report.push_str("\nTool Availability:\n");

        let mut missing = Vec::new();
        for tool in [FFMPEG, FFPROBE] {
            match self.check_tool_with_instructions(tool) {
                Ok(path) => report.push_str(&format!("  ✅ {} -> {:?}\n", tool, path)),
                Err(_) => {
                    report.push_str(&format!(
                        "  ❌ {} (install with: {})\n",
                        tool,
                        linux_install_instructions(tool)
                    ));
                    missing.push(tool);
                }
            }
        }

        if missing.contains(&FFMPEG) {
            report.push_str("\nNote: without ffmpeg, videos over the threshold cannot be prepared.\n");
        } else if missing.contains(&FFPROBE) {
            report.push_str("\nNote: without ffprobe, clips are treated as landscape with unknown duration.\n");
        }

        report
    }
}

fn find_in_system_path(tool_name: &str) -> Option<PathBuf> {
    which::which(tool_name).ok()
}

/// `tool_name` living in the same directory as `tool`, keeping its extension
fn sibling_tool(tool: &Path, tool_name: &str) -> Option<PathBuf> {
    let file_name = match tool.extension() {
        Some(ext) => format!("{}.{}", tool_name, ext.to_string_lossy()),
        None => tool_name.to_string(),
    };
    let sibling = tool.with_file_name(file_name);
    if sibling.is_file() {
        debug!("Using sibling tool: {} -> {:?}", tool_name, sibling);
        Some(sibling)
    } else {
        None
    }
}

fn linux_install_instructions(tool_name: &str) -> String {
    match tool_name {
        FFMPEG | FFPROBE => "sudo apt-get install ffmpeg".to_string(),
        _ => format!("sudo apt-get install {}", tool_name),
    }
}
