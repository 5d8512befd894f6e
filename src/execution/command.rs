//! Invocation building and representation.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::quoting;
use crate::error::CmdError;

/// The command to run, in one of its two forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// A command line meant for a shell.
    Shell(String),
    /// An already tokenized argument vector.
    Argv(Vec<String>),
}

impl CommandSpec {
    /// Human readable text of the command.
    pub fn display_text(&self) -> String {
        match self {
            Self::Shell(line) => line.clone(),
            Self::Argv(argv) => quoting::join(argv),
        }
    }

    /// Whether there is nothing to run.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Shell(line) => line.trim().is_empty(),
            Self::Argv(argv) => argv.is_empty(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

impl From<&str> for CommandSpec {
    fn from(line: &str) -> Self {
        Self::Shell(line.to_string())
    }
}

impl From<String> for CommandSpec {
    fn from(line: String) -> Self {
        Self::Shell(line)
    }
}

impl From<Vec<String>> for CommandSpec {
    fn from(argv: Vec<String>) -> Self {
        Self::Argv(argv)
    }
}

impl From<Vec<&str>> for CommandSpec {
    fn from(argv: Vec<&str>) -> Self {
        Self::Argv(argv.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for CommandSpec {
    fn from(argv: &[&str]) -> Self {
        Self::Argv(argv.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CommandSpec {
    fn from(argv: [&str; N]) -> Self {
        Self::Argv(argv.iter().map(|s| s.to_string()).collect())
    }
}

/// Whether output is echoed live while being captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TeePolicy {
    /// Tee when verbosity is non-zero.
    #[default]
    Auto,
    Enabled,
    Disabled,
}

impl TeePolicy {
    /// Resolve to a concrete decision for the given verbosity.
    pub fn resolve(self, verbose: u8) -> bool {
        match self {
            Self::Auto => verbose > 0,
            Self::Enabled => true,
            Self::Disabled => false,
        }
    }
}

impl From<Option<bool>> for TeePolicy {
    fn from(tee: Option<bool>) -> Self {
        match tee {
            None => Self::Auto,
            Some(true) => Self::Enabled,
            Some(false) => Self::Disabled,
        }
    }
}

/// Mechanism used to drain the child's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeeBackend {
    /// Pick the best backend for the host (currently `Thread`).
    #[default]
    Auto,
    /// One reader thread per pipe.
    Thread,
    /// A tokio runtime driving async pipes.
    Tokio,
    /// A pseudo-terminal; stdout and stderr are combined.
    Pty,
}

impl TeeBackend {
    /// Resolve `Auto` to a concrete backend.
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto => Self::Thread,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Thread => "thread",
            Self::Tokio => "tokio",
            Self::Pty => "pty",
        }
    }
}

impl fmt::Display for TeeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeeBackend {
    type Err = CmdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "thread" => Ok(Self::Thread),
            "tokio" | "async" => Ok(Self::Tokio),
            "pty" => Ok(Self::Pty),
            other => Err(CmdError::InvalidArgument(format!(
                "unknown tee backend: {other} (expected auto, thread, tokio or pty)"
            ))),
        }
    }
}

/// A full request to run one command.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// The command to run.
    pub command: CommandSpec,
    /// Route the command through the host shell.
    pub shell: bool,
    /// Return right after spawning.
    pub detach: bool,
    /// Echo level for the caller's own streams.
    pub verbose: u8,
    /// Live output policy.
    pub tee: TeePolicy,
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Replacement environment.
    pub env: Option<HashMap<String, String>>,
    /// Output draining mechanism.
    pub tee_backend: TeeBackend,
    /// Fail on a non-zero exit code.
    pub check: bool,
    /// Run through the shell with inherited stdio and no capture.
    pub system: bool,
    /// Hard deadline for the process.
    pub timeout: Option<Duration>,
}

impl Invocation {
    /// Create a new invocation with default options.
    pub fn new(command: impl Into<CommandSpec>) -> Self {
        Self {
            command: command.into(),
            shell: false,
            detach: false,
            verbose: 0,
            tee: TeePolicy::Auto,
            cwd: None,
            env: None,
            tee_backend: TeeBackend::Auto,
            check: false,
            system: false,
            timeout: None,
        }
    }

    pub fn shell(mut self, shell: bool) -> Self {
        self.shell = shell;
        self
    }

    pub fn detach(mut self, detach: bool) -> Self {
        self.detach = detach;
        self
    }

    pub fn verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the tee policy; `None` derives it from verbosity.
    pub fn tee(mut self, tee: impl Into<TeePolicy>) -> Self {
        self.tee = tee.into();
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Replace the environment of the child entirely.
    pub fn env_clear(mut self) -> Self {
        self.env = Some(HashMap::new());
        self
    }

    /// Add an environment variable.
    ///
    /// The first call snapshots the current environment, so the variable is
    /// added on top of what the caller would otherwise pass down.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(inherited_env)
            .insert(key.into(), value.into());
        self
    }

    /// Add multiple environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self = self.env(k, v);
        }
        self
    }

    pub fn tee_backend(mut self, backend: TeeBackend) -> Self {
        self.tee_backend = backend;
        self
    }

    pub fn check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    pub fn system(mut self, system: bool) -> Self {
        self.system = system;
        self
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Set the execution timeout in (fractional) seconds.
    ///
    /// Negative or non-finite values become a zero timeout, which is rejected
    /// when the invocation runs.
    pub fn timeout_secs(mut self, secs: f64) -> Self {
        self.timeout = Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO));
        self
    }

    /// Whether output should be echoed live.
    pub fn resolved_tee(&self) -> bool {
        self.tee.resolve(self.verbose)
    }

    /// Run this invocation. See [`crate::cmd`].
    pub fn run(&self) -> crate::Result<super::Outcome> {
        super::cmd(self)
    }
}

/// The caller's environment, skipping entries that are not valid UTF-8.
fn inherited_env() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

impl Default for Invocation {
    fn default() -> Self {
        Self::new(CommandSpec::Argv(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_defaults() {
        let inv = Invocation::new("ls -la");
        assert_eq!(inv.command, CommandSpec::Shell("ls -la".into()));
        assert!(!inv.shell);
        assert!(!inv.detach);
        assert_eq!(inv.verbose, 0);
        assert_eq!(inv.tee, TeePolicy::Auto);
        assert!(inv.cwd.is_none());
        assert!(inv.env.is_none());
        assert_eq!(inv.tee_backend, TeeBackend::Auto);
        assert!(!inv.check);
        assert!(!inv.system);
        assert!(inv.timeout.is_none());
    }

    #[test]
    fn test_invocation_builder_chain() {
        let inv = Invocation::new(["cargo", "build"])
            .cwd("/project")
            .env("RUST_LOG", "debug")
            .timeout(Duration::from_secs(60))
            .check(true)
            .verbose(2);

        assert_eq!(
            inv.command,
            CommandSpec::Argv(vec!["cargo".into(), "build".into()])
        );
        assert_eq!(inv.cwd, Some(PathBuf::from("/project")));
        assert_eq!(
            inv.env.as_ref().and_then(|e| e.get("RUST_LOG")),
            Some(&"debug".to_string())
        );
        assert_eq!(inv.timeout, Some(Duration::from_secs(60)));
        assert!(inv.check);
        assert!(inv.resolved_tee());
    }

    #[test]
    fn test_env_clear_then_add() {
        let inv = Invocation::new("env").env_clear().envs([("A", "1"), ("B", "2")]);
        let env = inv.env.unwrap();
        assert_eq!(env.len(), 2);
        assert_eq!(env.get("A"), Some(&"1".to_string()));
    }

    #[test]
    fn test_timeout_secs() {
        let inv = Invocation::new("true").timeout_secs(0.25);
        assert_eq!(inv.timeout, Some(Duration::from_millis(250)));

        let inv = Invocation::new("true").timeout_secs(-1.0);
        assert_eq!(inv.timeout, Some(Duration::ZERO));
    }

    #[test]
    fn test_tee_policy_resolve() {
        assert!(!TeePolicy::Auto.resolve(0));
        assert!(TeePolicy::Auto.resolve(1));
        assert!(TeePolicy::Enabled.resolve(0));
        assert!(!TeePolicy::Disabled.resolve(3));
        assert_eq!(TeePolicy::from(None), TeePolicy::Auto);
        assert_eq!(TeePolicy::from(Some(false)), TeePolicy::Disabled);
    }

    #[test]
    fn test_tee_backend_parse() {
        assert_eq!("auto".parse::<TeeBackend>().unwrap(), TeeBackend::Auto);
        assert_eq!("THREAD".parse::<TeeBackend>().unwrap(), TeeBackend::Thread);
        assert_eq!("async".parse::<TeeBackend>().unwrap(), TeeBackend::Tokio);
        assert_eq!("pty".parse::<TeeBackend>().unwrap(), TeeBackend::Pty);
        assert!("select".parse::<TeeBackend>().is_err());
        assert_eq!(TeeBackend::Auto.resolve(), TeeBackend::Thread);
    }

    #[test]
    fn test_command_spec_display() {
        assert_eq!(CommandSpec::from("echo hi").to_string(), "echo hi");
        #[cfg(unix)]
        assert_eq!(
            CommandSpec::from(["echo", "a b"]).to_string(),
            "echo 'a b'"
        );
        assert!(CommandSpec::from("  ").is_empty());
        assert!(CommandSpec::Argv(vec![]).is_empty());
    }
}
