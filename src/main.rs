//! shell-cmd binary entry point.

use std::process::ExitCode;

use shell_cmd::cli::{self, Args};
use shell_cmd::config::Config;
use shell_cmd::{cmd, logging, CmdError, Outcome};
use tracing::debug;

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("shell-cmd: {}", e);
            eprintln!("Try 'shell-cmd --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }
    if args.command.is_empty() {
        eprintln!("shell-cmd: no command given");
        eprintln!("Try 'shell-cmd --help' for more information.");
        return ExitCode::from(2);
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("shell-cmd: {}", e);
            return ExitCode::from(2);
        }
    };

    // A subscriber may already be installed when embedded; that is fine.
    let _ = logging::try_init_with_filter(config.log_filter());
    debug!(version = env!("CARGO_PKG_VERSION"), "starting");

    match run(&args, &config) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("shell-cmd: {}", e);
            ExitCode::from(cli::exit_status_for(&e))
        }
    }
}

fn run(args: &Args, config: &Config) -> shell_cmd::Result<u8> {
    let invocation = config.invocation(args);

    match cmd(&invocation)? {
        Outcome::Completed(output) => {
            if args.json {
                let json = serde_json::to_string_pretty(&output)
                    .map_err(|e| CmdError::Runtime(e.to_string()))?;
                println!("{}", json);
            }
            Ok(u8::try_from(output.exit_code).unwrap_or(1))
        }
        Outcome::Detached(process) => {
            if args.json {
                let json = serde_json::json!({
                    "command": process.command(),
                    "pid": process.pid(),
                });
                println!("{}", json);
            } else {
                println!("{}", process.pid());
            }
            Ok(0)
        }
    }
}
