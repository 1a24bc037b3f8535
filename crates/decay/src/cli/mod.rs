//! Command line interface

pub mod config;
pub mod error;
pub mod output;
pub mod run;

pub use config::{Action, Cli, ConfigError, EmailSettings, FileConfig, RunConfig};
pub use error::HelpfulError;
pub use run::{execute, run, RunSummary};
