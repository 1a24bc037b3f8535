//! Decay CLI

use clap::Parser;
use decay::cli::{self, Cli, HelpfulError, RunConfig};
use decay_logging::LogConfig;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Cli::parse();

    let logging = decay_logging::init_logging(LogConfig {
        app_name: "decay",
        verbose: args.verbose,
        console_only: false,
    });
    if let Err(err) = logging {
        eprintln!("Warning: log file unavailable, logging to the console only: {:#}", err);
        let _ = decay_logging::init_logging(LogConfig {
            app_name: "decay",
            verbose: args.verbose,
            console_only: true,
        });
    }

    let config = match RunConfig::load(&args) {
        Ok(config) => config,
        Err(err) => {
            tracing::debug!(error = %err, "Invalid configuration");
            eprint!("{}", err.to_helpful());
            return ExitCode::from(1);
        }
    };

    match cli::run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<HelpfulError>() {
                Some(helpful) => eprint!("{}", helpful),
                None => eprintln!("{:?}", err),
            }
            ExitCode::from(1)
        }
    }
}
