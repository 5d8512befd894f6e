//! Configuration management for the shell-cmd binary.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::execution::{CommandSpec, Invocation, TeeBackend, TeePolicy};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaults applied to every invocation.
    pub defaults: DefaultsSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Invocation defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsSection {
    /// Echo level.
    pub verbose: u8,
    /// Output draining backend.
    pub tee_backend: TeeBackend,
    /// Timeout in seconds; absent means no deadline.
    pub timeout_secs: Option<f64>,
    /// Route commands through the shell.
    pub shell: bool,
    /// Fail on non-zero exit codes.
    pub check: bool,
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a full filter.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(verbose) = std::env::var("SHELL_CMD_VERBOSE") {
            self.defaults.verbose = verbose
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SHELL_CMD_VERBOSE", verbose))?;
        }

        if let Ok(backend) = std::env::var("SHELL_CMD_BACKEND") {
            self.defaults.tee_backend = backend
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SHELL_CMD_BACKEND", backend))?;
        }

        if let Ok(timeout) = std::env::var("SHELL_CMD_TIMEOUT") {
            let secs = timeout
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SHELL_CMD_TIMEOUT", timeout))?;
            self.defaults.timeout_secs = Some(secs);
        }

        if let Ok(level) = std::env::var("SHELL_CMD_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if args.verbose > 0 {
            self.defaults.verbose = args.verbose;
        }
        if let Some(backend) = args.backend {
            self.defaults.tee_backend = backend;
        }
        if let Some(timeout) = args.timeout {
            self.defaults.timeout_secs = Some(timeout);
        }
        if args.shell {
            self.defaults.shell = true;
        }
        if args.check {
            self.defaults.check = true;
        }
        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env()?;
        config.apply_args(args);

        Ok(config)
    }

    /// Seed an invocation with the configured defaults.
    pub fn base_invocation(&self, command: impl Into<CommandSpec>) -> Invocation {
        let mut invocation = Invocation::new(command)
            .shell(self.defaults.shell)
            .verbose(self.defaults.verbose)
            .tee_backend(self.defaults.tee_backend)
            .check(self.defaults.check);
        if let Some(secs) = self.defaults.timeout_secs {
            invocation = match self.timeout() {
                Some(timeout) => invocation.timeout(timeout),
                None => invocation.timeout_secs(secs),
            };
        }
        invocation
    }

    /// Build the invocation described by the command line.
    ///
    /// A single positional argument is treated as a command line, split or
    /// handed to the shell depending on `shell`. Without `--json` the output is teed unless `--no-tee` was given, since
    /// nothing else would show it.
    pub fn invocation(&self, args: &Args) -> Invocation {
        let command = if args.command.len() == 1 {
            CommandSpec::Shell(args.command[0].clone())
        } else {
            CommandSpec::Argv(args.command.clone())
        };

        let tee = match args.tee {
            Some(tee) => TeePolicy::from(Some(tee)),
            None if args.json => TeePolicy::Auto,
            None => TeePolicy::Enabled,
        };

        let mut invocation = self
            .base_invocation(command)
            .tee(tee)
            .detach(args.detach)
            .system(args.system);

        if let Some(ref cwd) = args.cwd {
            invocation = invocation.cwd(cwd);
        }
        if args.clear_env {
            invocation = invocation.env_clear();
        }
        invocation.envs(args.env.iter().cloned())
    }

    /// Timeout as a duration, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.defaults
            .timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// An environment variable holds an unusable value.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidValue(name, value) => write!(f, "invalid value for {}: '{}'", name, value),
        }
    }
}

impl std::error::Error for ConfigError {}
