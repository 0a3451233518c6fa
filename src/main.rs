use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory as _, Parser as _};

use adytum::cli::{Cli, Command};
use adytum::commands;
use adytum::logging::{self, Logger, RunHeader};

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();

    match &args.command {
        Command::Version => {
            commands::version::run();
            return ExitCode::SUCCESS;
        }
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "adytum", &mut std::io::stdout());
            return ExitCode::SUCCESS;
        }
        _ => {}
    }

    let name = args.command.name();
    logging::init_subscriber(
        args.verbose,
        &RunHeader {
            command: name.to_string(),
            profile: args.command.profile().map(String::from),
            dry_run: args.global.dry_run,
        },
    );
    let log = Arc::new(Logger::new(name));

    let result = match &args.command {
        Command::Setup(opts) => commands::setup::run(&args.global, args.verbose, opts, &log),
        Command::Profile(opts) => commands::profile::run(&args.global, opts, &log).map(|()| 0),
        Command::Modules(opts) => commands::modules::run(&args.global, opts, &log).map(|()| 0),
        Command::Os => {
            commands::os::run(log.clone());
            Ok(0)
        }
        Command::Version | Command::Completions { .. } => Ok(0),
    };

    match result {
        Ok(status) => ExitCode::from(status),
        Err(e) => {
            log.error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
