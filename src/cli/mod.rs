//! Command-line interface definitions for the `crrunner` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use std::path::PathBuf;

use clap::Parser;

/// Top-level CLI for the `crrunner` binary.
#[derive(Debug, Parser)]
#[command(
    name = "crrunner",
    about = "Copy files to a remote host, run commands over SSH, and collect the results",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Apply the events of a plan file over one SSH session.
    #[command(name = "run", about = "Apply the events of a plan file over one SSH session")]
    Run(RunCommand),
}

/// Arguments for the `crrunner run` subcommand.
///
/// Connection settings come from `crrunner.toml` and `CRRUNNER_*`
/// environment variables.
#[derive(Debug, Parser)]
pub(crate) struct RunCommand {
    /// JSON plan listing the events to apply, in order.
    #[arg(value_name = "PLAN")]
    pub(crate) plan: PathBuf,
    /// Delete every uploaded file on the remote once the plan has run.
    #[arg(long)]
    pub(crate) clean: bool,
    /// Stop at the first event that fails instead of carrying on.
    #[arg(long)]
    pub(crate) stop_on_error: bool,
    /// Print the annotated events as JSON instead of a summary.
    #[arg(long)]
    pub(crate) json: bool,
    /// Increase diagnostic output on stderr (repeat for more).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,
}
