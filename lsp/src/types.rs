//! Public types shared with the config crate and the binary.
//!
//! The binary builds a [`ServerConfig`] and [`InitializationOptions`] from the
//! config file and command line, and reads a [`SessionSummary`] when the
//! proxied session ends.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use serde::{Deserialize, Serialize};
use sieve_types::Leftover;

/// How to launch the wrapped language server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Executable to run (e.g. "idris2-lsp"). Resolved through `PATH`.
    command: String,
    #[serde(default)]
    args: Vec<String>,
    /// Working directory for the server, usually the workspace root.
    #[serde(default)]
    cwd: Option<PathBuf>,
}

impl ServerConfig {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }
}

/// `initializationOptions` handed to the server in the editor's `initialize`
/// request, unless the editor already supplied its own.
///
/// Read from TOML in snake_case, sent to the server in camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all(serialize = "camelCase"))]
pub struct InitializationOptions {
    /// Inject these options at all. Never sent to the server.
    #[serde(skip_serializing)]
    pub enabled: bool,
    pub log_severity: String,
    pub log_file: String,
    /// Milliseconds.
    pub long_action_timeout: u64,
    pub max_code_action_results: u32,
    pub show_implicits: bool,
    pub show_machine_names: bool,
    pub full_namespace: bool,
    pub brief_completions: bool,
}

impl Default for InitializationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            log_severity: "debug".to_string(),
            log_file: "stderr".to_string(),
            long_action_timeout: 5000,
            max_code_action_results: 5,
            show_implicits: false,
            show_machine_names: false,
            full_namespace: false,
            brief_completions: false,
        }
    }
}

impl InitializationOptions {
    /// The JSON object to inject, or `None` when injection is disabled.
    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Value> {
        if !self.enabled {
            return None;
        }
        serde_json::to_value(self).ok()
    }
}

/// Counters for one run of [`crate::pump`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Messages forwarded in full.
    pub messages: u64,
    /// Header and payload bytes forwarded, including a truncated last message.
    pub message_bytes: u64,
    /// Bytes discarded as noise.
    pub noise_bytes: u64,
    /// What was abandoned when the source ended.
    pub leftover: Leftover,
}

/// Outcome of a proxied session.
#[derive(Debug)]
pub struct SessionSummary {
    /// Server-to-editor relay statistics. `None` when the relay was cut off
    /// before the server closed its output.
    pub relayed: Option<PumpStats>,
    /// Frames forwarded from the editor to the server.
    pub frames_to_server: u64,
    /// The editor sent its own `exit` notification.
    pub client_sent_exit: bool,
    /// Server exit status, if it could be collected.
    pub exit_status: Option<ExitStatus>,
}
