//! Binary entry point for the crrunner CLI.

use std::future::Future;
use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crrunner::{
    ConfigError, Event, Plan, PlanError, RunError, Runner, RunnerConfig, SshConnector, logging,
    report,
};

mod cli;

use cli::{Cli, RunCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Logging(String),
    #[error("invalid plan path: {0}")]
    PlanPath(String),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("run failed: {0}")]
    Run(#[from] RunError),
    #[error("failed to write report: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Run(command) => run_command(command).await,
    }
}

async fn run_command(args: RunCommand) -> Result<i32, CliError> {
    logging::init(args.verbose).map_err(|err| CliError::Logging(err.to_string()))?;

    let events = load_events(&args)?;
    let config = RunnerConfig::load_without_cli_args()?;
    let target = config.target()?;

    let token = CancellationToken::new();
    let options = config
        .run_options()
        .with_cancellation(token.clone())
        .with_continue_on_error(config.continue_on_error && !args.stop_on_error);
    let interrupt = tokio::spawn(cancel_on_interrupt(token));

    let mut runner = Runner::new(SshConnector::default(), target, events).with_options(options);
    let outcome = runner.run().await.map(|_| ());
    interrupt.abort();

    let annotated = runner.events();
    if annotated.iter().any(Event::is_executed) {
        let stdout = io::stdout().lock();
        if args.json {
            report::write_json(stdout, annotated)?;
        } else {
            report::write_summary(stdout, annotated)?;
        }
    }

    outcome?;
    Ok(report::exit_code(annotated))
}

/// Loads the plan and appends a cleanup event when `--clean` is given.
fn load_events(args: &RunCommand) -> Result<Vec<Event>, CliError> {
    let path = Utf8PathBuf::from_path_buf(args.plan.clone())
        .map_err(|path| CliError::PlanPath(path.display().to_string()))?;
    let mut events = Plan::load(&path)?.into_events()?;
    if args.clean {
        events.push(Event::delete_all_copied_to_remote());
    }
    Ok(events)
}

/// Exit status after a second interrupt aborts the run.
const EXIT_INTERRUPTED: i32 = 130;

async fn cancel_on_interrupt(token: CancellationToken) {
    if let Some(code) = watch_interrupts(&token, tokio::signal::ctrl_c).await {
        writeln!(io::stderr(), "aborted by second interrupt").ok();
        process::exit(code);
    }
}

/// Cancels `token` on the first interrupt and returns the exit status to
/// abort with on the second. Returns `None` if interrupts cannot be watched.
async fn watch_interrupts<F, Fut>(token: &CancellationToken, mut next_interrupt: F) -> Option<i32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if let Err(err) = next_interrupt().await {
        warn!(error = %err, "cannot listen for interrupts");
        return None;
    }
    warn!("interrupt received, stopping before the next event; press Ctrl-C again to abort");
    token.cancel();

    match next_interrupt().await {
        Ok(()) => Some(EXIT_INTERRUPTED),
        Err(err) => {
            warn!(error = %err, "cannot listen for a second interrupt");
            None
        }
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
