//! Command-line interface for shell-cmd.
//!
//! Options come first; the first positional argument starts the command and
//! everything after it is passed through untouched.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::CmdError;
use crate::execution::TeeBackend;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// The command: a single shell line or a program and its arguments.
    pub command: Vec<String>,
    /// Run through the system shell.
    pub shell: bool,
    /// Return immediately with the child's pid.
    pub detach: bool,
    /// Echo level; each `-v` adds one.
    pub verbose: u8,
    /// Explicit tee choice; `None` follows verbosity.
    pub tee: Option<bool>,
    /// Working directory for the child.
    pub cwd: Option<PathBuf>,
    /// `KEY=VALUE` pairs layered over the environment.
    pub env: Vec<(String, String)>,
    /// Start the child from an empty environment.
    pub clear_env: bool,
    /// Output draining backend.
    pub backend: Option<TeeBackend>,
    /// Fail when the command exits non-zero.
    pub check: bool,
    /// Inherit the terminal instead of capturing.
    pub system: bool,
    /// Timeout in seconds.
    pub timeout: Option<f64>,
    /// Print the result as JSON.
    pub json: bool,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('s') | Long("shell") => {
                result.shell = true;
            }
            Short('d') | Long("detach") => {
                result.detach = true;
            }
            Short('v') | Long("verbose") => {
                result.verbose = result.verbose.saturating_add(1);
            }
            Long("tee") => {
                result.tee = Some(true);
            }
            Long("no-tee") => {
                result.tee = Some(false);
            }
            Short('C') | Long("cwd") => {
                result.cwd = Some(parser.value()?.parse()?);
            }
            Short('e') | Long("env") => {
                let value: String = parser.value()?.parse()?;
                result.env.push(parse_env_pair(&value)?);
            }
            Long("clear-env") => {
                result.clear_env = true;
            }
            Short('b') | Long("backend") => {
                let value: String = parser.value()?.parse()?;
                result.backend = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("backend", value))?,
                );
            }
            Long("check") => {
                result.check = true;
            }
            Long("system") => {
                result.system = true;
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                let secs: f64 = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidValue("timeout", value.clone()))?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(ArgsError::InvalidValue("timeout", value));
                }
                result.timeout = Some(secs);
            }
            Long("json") => {
                result.json = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                result.command.push(val.string()?);
                for rest in parser.raw_args()? {
                    result.command.push(rest.string()?);
                }
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

fn parse_env_pair(value: &str) -> Result<(String, String), ArgsError> {
    match value.split_once('=') {
        Some((key, val)) if !key.is_empty() => Ok((key.to_string(), val.to_string())),
        _ => Err(ArgsError::InvalidValue("env", value.to_string())),
    }
}

/// Process exit status for a failed run.
///
/// Follows the conventions of `timeout(1)` and POSIX shells.
pub fn exit_status_for(error: &CmdError) -> u8 {
    match error {
        CmdError::NonZeroExit(output) => u8::try_from(output.exit_code).unwrap_or(1).max(1),
        CmdError::Timeout { .. } => 124,
        CmdError::CommandNotFound(_) => 127,
        CmdError::InvalidWorkingDirectory(_) | CmdError::InvalidArgument(_) => 2,
        _ => 1,
    }
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"shell-cmd {version}
Run a command with captured output, live tee, and timeouts

USAGE:
    shell-cmd [OPTIONS] <COMMAND>...

OPTIONS:
    -s, --shell             Run through the system shell
    -d, --detach            Start the command and print its pid
    -v, --verbose           Echo output; repeat for the command line and banners
        --tee / --no-tee    Force output echo on or off
    -C, --cwd <DIR>         Working directory for the command
    -e, --env <KEY=VALUE>   Set an environment variable (repeatable)
        --clear-env         Start from an empty environment
    -b, --backend <NAME>    Tee backend (auto, thread, tokio, pty)
        --check             Fail when the command exits non-zero
        --system            Inherit the terminal; nothing is captured
    -t, --timeout <SECS>    Kill the command after SECS seconds
        --json              Print the result as JSON
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    SHELL_CMD_VERBOSE       Default verbosity (overrides config)
    SHELL_CMD_BACKEND       Default tee backend (overrides config)
    SHELL_CMD_TIMEOUT       Default timeout in seconds (overrides config)
    SHELL_CMD_LOG_LEVEL     Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXIT STATUS:
    The command's own exit code, 124 on timeout, 127 when the program
    cannot be found, 2 for invalid arguments.

EXAMPLES:
    # Run and show output
    shell-cmd ls -la

    # Pipeline through the shell, quietly, as JSON
    shell-cmd -s --json 'ls | wc -l'

    # Bounded run in another directory
    shell-cmd -C /project -t 600 --check cargo build
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("shell-cmd {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::CmdOutput;
    use std::time::Duration;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("shell-cmd")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_default_args() {
        let result = parse_args_from(args(&[])).unwrap();
        assert!(result.command.is_empty());
        assert_eq!(result.verbose, 0);
        assert!(result.tee.is_none());
        assert!(!result.shell);
    }

    #[test]
    fn test_command_passthrough() {
        let result = parse_args_from(args(&["-s", "ls", "-la", "--json"])).unwrap();
        assert!(result.shell);
        assert!(!result.json);
        assert_eq!(result.command, vec!["ls", "-la", "--json"]);
    }

    #[test]
    fn test_double_dash() {
        let result = parse_args_from(args(&["--", "-weird-name", "x"])).unwrap();
        assert_eq!(result.command, vec!["-weird-name", "x"]);
    }

    #[test]
    fn test_verbose_counts() {
        let result = parse_args_from(args(&["-vvv", "true"])).unwrap();
        assert_eq!(result.verbose, 3);

        let result = parse_args_from(args(&["-v", "--verbose", "true"])).unwrap();
        assert_eq!(result.verbose, 2);
    }

    #[test]
    fn test_tee_flags() {
        let result = parse_args_from(args(&["--tee", "true"])).unwrap();
        assert_eq!(result.tee, Some(true));

        let result = parse_args_from(args(&["--tee", "--no-tee", "true"])).unwrap();
        assert_eq!(result.tee, Some(false));
    }

    #[test]
    fn test_env_pairs() {
        let result = parse_args_from(args(&["-e", "A=1", "--env", "B=x=y", "env"])).unwrap();
        assert_eq!(
            result.env,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "x=y".to_string())
            ]
        );
    }

    #[test]
    fn test_invalid_env_pair() {
        assert!(parse_args_from(args(&["-e", "NOEQUALS", "env"])).is_err());
        assert!(parse_args_from(args(&["-e", "=1", "env"])).is_err());
    }

    #[test]
    fn test_backend() {
        let result = parse_args_from(args(&["-b", "async", "true"])).unwrap();
        assert_eq!(result.backend, Some(TeeBackend::Tokio));

        assert!(parse_args_from(args(&["-b", "select", "true"])).is_err());
    }

    #[test]
    fn test_timeout() {
        let result = parse_args_from(args(&["-t", "0.5", "sleep", "1"])).unwrap();
        assert_eq!(result.timeout, Some(0.5));

        assert!(parse_args_from(args(&["-t", "soon", "true"])).is_err());
        assert!(parse_args_from(args(&["-t", "0", "true"])).is_err());
        assert!(parse_args_from(args(&["-t", "-1", "true"])).is_err());
    }

    #[test]
    fn test_cwd_and_config() {
        let result =
            parse_args_from(args(&["-C", "/tmp", "-c", "/etc/shell-cmd.json", "pwd"])).unwrap();
        assert_eq!(result.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(result.config, Some(PathBuf::from("/etc/shell-cmd.json")));
    }

    #[test]
    fn test_help_flag() {
        let result = parse_args_from(args(&["-h"])).unwrap();
        assert!(result.help);

        let result = parse_args_from(args(&["--help"])).unwrap();
        assert!(result.help);
    }

    #[test]
    fn test_version_flag() {
        let result = parse_args_from(args(&["-V"])).unwrap();
        assert!(result.version);
    }

    #[test]
    fn test_unknown_option() {
        assert!(parse_args_from(args(&["--frobnicate", "true"])).is_err());
    }

    #[test]
    fn test_combined_options() {
        let result = parse_args_from(args(&[
            "--check",
            "--system",
            "-d",
            "--clear-env",
            "-l",
            "debug",
            "make",
        ]))
        .unwrap();

        assert!(result.check);
        assert!(result.system);
        assert!(result.detach);
        assert!(result.clear_env);
        assert_eq!(result.log_level, Some("debug".to_string()));
        assert_eq!(result.command, vec!["make"]);
    }

    #[test]
    fn test_exit_status_for() {
        let mut output = CmdOutput::new("false", TeeBackend::Thread);
        output.exit_code = 7;
        assert_eq!(exit_status_for(&CmdError::NonZeroExit(Box::new(output))), 7);

        let timeout = CmdError::Timeout {
            command: "sleep 10".into(),
            timeout: Duration::from_millis(10),
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(exit_status_for(&timeout), 124);
        assert_eq!(exit_status_for(&CmdError::CommandNotFound("nope".into())), 127);
        assert_eq!(exit_status_for(&CmdError::InvalidArgument("x".into())), 2);
    }
}
