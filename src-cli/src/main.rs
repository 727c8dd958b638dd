use std::process::ExitCode;

use clap::Parser;

use formschema_lib::cli::Cli;

fn main() -> ExitCode {
    formschema_lib::run(Cli::parse())
}
