//! lambda-spinner: offline front end for the lambda proxy-class spinner
//!
//! Reads creation-call requests (JSON, see `lambda_spinner::request`) and
//! runs the spinner on them without a host JVM.
//!
//! ## Features
//!
//! - **check**: Validate a request against the creation-call contract
//! - **name**: Show the unit name and fingerprint a request would get
//! - **spin**: Emit the proxy class file for a request
//! - **inspect**: Disassemble a class file
//!
//! ## Example Usage
//!
//! ```bash
//! # Validate a request
//! lambda-spinner check site.json
//!
//! # Emit the proxy class with a reproducible name
//! lambda-spinner spin site.json --out ./classes --stable-names
//!
//! # Look at what was emitted
//! lambda-spinner inspect ./classes/com/acme/Main$$Lambda3f0a....class
//! ```
//!
//! `LAMBDA_SPINNER_*` environment variables provide the defaults that the
//! flags override.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod spinner_cli;

use spinner_cli::{check::CheckCmd, inspect::InspectCmd, name::NameCmd, spin::SpinCmd};

#[derive(Parser)]
#[command(
    name = "lambda-spinner",
    author,
    version,
    about = "Spin JVM lambda proxy classes offline",
    long_about = "Validates lambda creation calls, names and emits their proxy classes,\n\
                  and disassembles class files."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a creation-call request
    Check(CheckCmd),

    /// Show the unit name a request would be given
    Name(NameCmd),

    /// Emit the proxy class for a request
    Spin(SpinCmd),

    /// Disassemble a class file
    Inspect(InspectCmd),
}

fn main() -> Result<()> {
    let Cli { command, json } = Cli::parse();

    let result = match command {
        Commands::Check(cmd) => cmd.execute(json),
        Commands::Name(cmd) => cmd.execute(json),
        Commands::Spin(cmd) => cmd.execute(json),
        Commands::Inspect(cmd) => cmd.execute(json),
    };

    if let Err(err) = &result {
        eprint!("{}", spinner_cli::output::format_error(err, json));
        std::process::exit(1);
    }
    result
}
