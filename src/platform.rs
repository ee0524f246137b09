//! # Platform-specific utilities
//!
//! Questo modulo centralizza la risoluzione e l'esecuzione dei tool esterni
//! (cwebp, avifenc, ffmpeg, svgo, terser, ...).
//!
//! ## Strategia di risoluzione:
//! 1. Directory tool configurata (`tools_dir` / `ASSET_TOOLS_DIR`), sia
//!    `tools_dir/<tool>` che `tools_dir/<tool>/<tool>`
//! 2. `PATH` di sistema
//!
//! Su Windows viene aggiunta l'estensione `.exe`.
//!
//! ## Esecuzione:
//! `ToolResolver::run` lancia il processo con `tokio::process::Command`, applica
//! un timeout e converte exit status non zero in `OptimizeError::Tool` con lo
//! stderr del tool.

use crate::error::{OptimizeError, Result};
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Captured output of a successful tool run
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Finds and runs external tools
#[derive(Debug, Clone, Default)]
pub struct ToolResolver {
    tools_dir: Option<PathBuf>,
}

impl ToolResolver {
    pub fn new(tools_dir: Option<PathBuf>) -> Self {
        Self { tools_dir }
    }

    fn executable_name(tool_name: &str) -> String {
        if cfg!(windows) {
            format!("{}.exe", tool_name)
        } else {
            tool_name.to_string()
        }
    }

    /// Resolve the path to a specific tool
    pub fn resolve(&self, tool_name: &str) -> Option<PathBuf> {
        let executable = Self::executable_name(tool_name);

        if let Some(ref tools_dir) = self.tools_dir {
            for candidate in [
                tools_dir.join(&executable),
                tools_dir.join(tool_name).join(&executable),
            ] {
                if candidate.is_file() {
                    debug!("Using bundled tool: {} -> {:?}", tool_name, candidate);
                    return Some(candidate);
                }
            }
        }

        let path_var = env::var_os("PATH")?;
        env::split_paths(&path_var)
            .map(|dir| dir.join(&executable))
            .find(|path| path.is_file())
    }

    pub fn is_available(&self, tool_name: &str) -> bool {
        self.resolve(tool_name).is_some()
    }

    /// Availability of each tool, in the given order
    pub fn availability(&self, tools: &[&'static str]) -> Vec<(&'static str, bool)> {
        tools
            .iter()
            .map(|tool| (*tool, self.is_available(tool)))
            .collect()
    }

    /// Run a tool to completion, failing on timeout or non-zero exit
    pub async fn run(
        &self,
        tool_name: &str,
        args: &[OsString],
        timeout: Duration,
    ) -> Result<ToolOutput> {
        let tool_path = self
            .resolve(tool_name)
            .ok_or_else(|| OptimizeError::MissingDependency(tool_name.to_string()))?;

        debug!("Running {:?} {:?}", tool_path, args);
        let start_time = std::time::Instant::now();

        let child = Command::new(&tool_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, child)
            .await
            .map_err(|_| OptimizeError::Timeout {
                tool: tool_name.to_string(),
                seconds: timeout.as_secs(),
            })?
            .map_err(|e| OptimizeError::Tool {
                tool: tool_name.to_string(),
                message: format!("failed to execute {}: {}", tool_path.display(), e),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!("{} finished in {:?}", tool_name, start_time.elapsed());

        if !output.status.success() {
            return Err(OptimizeError::Tool {
                tool: tool_name.to_string(),
                message: if stderr.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }

        Ok(ToolOutput {
            stdout: output.stdout,
            stderr,
        })
    }

    pub fn tools_dir(&self) -> Option<&Path> {
        self.tools_dir.as_deref()
    }
}
