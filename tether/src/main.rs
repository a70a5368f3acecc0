//! # Tether CLI Entry Point
//!
//! The main executable for the Tether tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and sets up logging.
//! 2. **Loading**: Builds a validated service from a JSON description via `tether_core`.
//! 3. **Execution**: Delegates the call to [`core::call`].
//! 4. **Presentation**: Formats and prints the resulting data or error to standard output/error.
mod cli;
mod core;
mod formatter;

use clap::Parser;
use cli::{Cli, CliArg, Commands};
use formatter::{FormattedString, GenericError};
use std::{path::Path, process};
use tether_core::Service;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let input = core::Input {
        base_url: args.base_url,
        headers: args.headers,
    };

    match args.command {
        Commands::Describe { file, method } => describe(&file, method.as_deref(), input),
        Commands::Call { file, method, args } => run_call(&file, method, args, input).await,
    }
}

/// `RUST_LOG` wins when set; otherwise each `-v` raises the level from `warn`.
fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_or_exit(file: &Path, input: core::Input) -> Service {
    match core::load(file, input) {
        Ok(service) => service,
        Err(err) => {
            eprintln!(
                "{}",
                FormattedString::from(GenericError("Failed to load service", format!("{err:#}")))
            );
            process::exit(1);
        }
    }
}

fn describe(file: &Path, method: Option<&str>, input: core::Input) {
    let service = load_or_exit(file, input);

    match method {
        None => println!("{}", FormattedString::from(&service)),
        Some(name) => match service.descriptor(name) {
            Some(descriptor) => println!("{}", FormattedString::from(descriptor)),
            None => {
                eprintln!(
                    "{}",
                    FormattedString::from(GenericError("Method not found", name))
                );
                process::exit(1);
            }
        },
    }
}

async fn run_call(file: &Path, method: String, args: Vec<CliArg>, input: core::Input) {
    let service = load_or_exit(file, input);

    match core::call(service, method, args).await {
        Ok(output) => println!("{}", FormattedString::from(output)),
        Err(err) => {
            eprintln!(
                "{}",
                FormattedString::from(GenericError("Call Failed", format!("{err:#}")))
            );
            process::exit(1);
        }
    }
}
