mod cli;

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use fswait_watcher::error::INVALID_INPUT_EXIT_CODE;
use fswait_watcher::{LineReporter, SessionController, WatcherError};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // --help and --version are not failures.
            return if err.use_stderr() {
                exit_code(INVALID_INPUT_EXIT_CODE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(&cli);

    match run(cli) {
        Ok(code) => exit_code(code),
        // The reader went away, e.g. `fswait -c dir | head -1`.
        Err(err) if is_broken_pipe(&err) => {
            debug!("Output closed: {err:#}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("fswait: {err:#}");
            let code = err
                .downcast_ref::<WatcherError>()
                .map_or(INVALID_INPUT_EXIT_CODE, WatcherError::exit_code);
            exit_code(code)
        }
    }
}

/// Route library logs to stderr; stdout carries only event lines.
fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    runtime.block_on(async move {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Received interrupt");
                trigger.cancel();
            }
        });

        let reporter = LineReporter::new(io::stdout(), cli.output_format()).quiet(cli.quiet);
        let mut session = SessionController::new(cli.session_config(), reporter, cancel);
        let result = session.run().await?;
        Ok::<_, anyhow::Error>(result.exit_code)
    })
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<WatcherError>(),
        Some(WatcherError::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe
    )
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
}
