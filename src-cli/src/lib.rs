//! formschema command line application.

pub mod cli;
mod commands;
mod render;

use std::process::ExitCode;

use cli::Cli;

/// Initialize tracing with the given directives on top of `RUST_LOG`.
pub fn init_logging(directives: &[&str]) {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in directives {
        match directive.parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Ignoring log directive {}: {}", directive, e),
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run a parsed command line to completion.
pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.log_directives());

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create Tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(commands::dispatch(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
