//! Lockbox CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use lockbox_cli::session::StageError;
use lockbox_cli::{run, Cli, Commands};
use lockbox_core::config::{Config, LoggingConfig};
use lockbox_core::env::vars;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(verbose: u8, logging: &LoggingConfig) {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(vars::LOCKBOX_LOG)
        .unwrap_or_else(|_| EnvFilter::new(format!("lockbox={level}")));

    // Logs go to stderr; stdout carries command output such as revealed values.
    let json = logging.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text = (!logging.json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        // A broken config file must not block `config init --force`.
        Err(e) if matches!(cli.command, Commands::Config(_)) => {
            eprintln!("Warning: {e}");
            Config::default()
        }
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(cli.verbose, &config.logging);

    match run(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            match err.downcast_ref::<StageError>() {
                Some(stage) => ExitCode::from(stage.stage.exit_code()),
                None => ExitCode::FAILURE,
            }
        }
    }
}
