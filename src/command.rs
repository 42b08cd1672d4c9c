//! # External Tool Command Module
//!
//! Esecuzione di ffmpeg / ffprobe come sottoprocessi con timeout.
//!
//! ## Garanzie:
//! - Il processo figlio viene creato con `kill_on_drop(true)`: se il future
//!   viene abbandonato (timeout, cancellazione, richiesta chiusa) il processo
//!   viene terminato e non resta nessun encode orfano
//! - stdin chiuso, stdout/stderr catturati
//! - Exit status non zero diventa `ToolError::Exit` con lo stderr del tool

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Failure modes of an external tool invocation
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("{tool}: failed to spawn: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },

    #[error("{tool}: exited with status {status}: {stderr}")]
    Exit {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{tool}: timed out after {timeout:?}")]
    TimedOut { tool: String, timeout: Duration },

    #[error("{tool}: I/O error waiting for process: {source}")]
    Wait {
        tool: String,
        source: std::io::Error,
    },
}

/// Output captured from a successful tool execution
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Builder for one external tool invocation
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(mut self, s: impl Into<String>) -> Self {
        self.args.push(s.into());
        self
    }

    pub fn args(mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time
    pub fn timeout(mut self, d: Duration) -> Self {
        self.timeout = d;
        self
    }

    fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Run to completion, capturing output.
    ///
    /// On timeout the wait future is dropped and the child is killed.
    pub async fn execute(&self) -> Result<ToolOutput, ToolError> {
        let tool = self.tool_name();
        debug!("Running {} {}", self.program.display(), self.args.join(" "));

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(ToolError::Wait { tool, source }),
            Err(_elapsed) => {
                return Err(ToolError::TimedOut {
                    tool,
                    timeout: self.timeout,
                })
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(ToolError::Exit {
                tool,
                status: output.status,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr,
        })
    }
}
