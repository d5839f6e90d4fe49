//! Configuration for sieve.
//!
//! Read from `~/.sieve/config.toml` unless a path is given. A missing default
//! file means defaults; an unreadable or malformed file is an error.
//!
//! ```toml
//! [server]
//! path = "${HOME}/.pack/bin/idris2-lsp"
//! args = []
//!
//! [initialization]
//! show_implicits = true
//!
//! [log]
//! filter = "sieve=debug"
//! noise_file = "/tmp/idris2-lsp.log"
//! ```

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sieve_lsp::{InitializationOptions, ServerConfig};

#[derive(Debug, Default, Deserialize)]
pub struct SieveConfig {
    pub server: Option<ServerSection>,
    /// `initializationOptions` for the server, in snake_case.
    pub initialization: Option<InitializationOptions>,
    pub log: Option<LogConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerSection {
    /// Server executable. `${VAR}` references are expanded.
    pub path: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for the server. `${VAR}` references are expanded.
    pub cwd: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. `"info"` or `"sieve::noise=debug"`.
    pub filter: Option<String>,
    /// sieve's own log. Defaults to stderr.
    pub file: Option<PathBuf>,
    /// Debug channel for server stderr and discarded stdout.
    pub noise_file: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("no language server configured: set [server] path or pass --server")]
    MissingServer,
}

impl ConfigError {
    /// Config file the error refers to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::MissingServer => None,
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Default, Clone)]
pub struct ServerOverrides {
    pub path: Option<String>,
    /// Replaces the configured args when non-empty.
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

/// `~/.sieve/config.toml`, or `None` without a home directory.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".sieve").join("config.toml"))
}

/// Replace `${VAR}` with the variable's value. Unset variables become empty;
/// an unclosed `${` is kept as is.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl SieveConfig {
    /// Load `path`, or the default location when `path` is `None`.
    ///
    /// An explicitly named file must exist. The default file may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => match config_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The server to launch, with `overrides` applied on top of `[server]`.
    pub fn server_config(&self, overrides: &ServerOverrides) -> Result<ServerConfig, ConfigError> {
        let section = self.server.as_ref();

        let command = overrides
            .path
            .clone()
            .or_else(|| section.and_then(|s| s.path.as_deref()).map(expand_env_vars))
            .filter(|command| !command.trim().is_empty())
            .ok_or(ConfigError::MissingServer)?;

        let args = if overrides.args.is_empty() {
            section
                .map(|s| s.args.iter().map(|arg| expand_env_vars(arg)).collect())
                .unwrap_or_default()
        } else {
            overrides.args.clone()
        };

        let cwd = overrides.cwd.clone().or_else(|| {
            section
                .and_then(|s| s.cwd.as_deref())
                .map(|cwd| PathBuf::from(expand_env_vars(cwd)))
        });

        Ok(ServerConfig::new(command).with_args(args).with_cwd(cwd))
    }

    /// Options to inject into `initialize`, defaults when the section is absent.
    #[must_use]
    pub fn initialization_options(&self) -> InitializationOptions {
        self.initialization.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn log_filter(&self) -> Option<&str> {
        self.log.as_ref()?.filter.as_deref()
    }

    #[must_use]
    pub fn log_file(&self) -> Option<&Path> {
        self.log.as_ref()?.file.as_deref()
    }

    #[must_use]
    pub fn noise_file(&self) -> Option<&Path> {
        self.log.as_ref()?.noise_file.as_deref()
    }
}
