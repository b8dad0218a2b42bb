//! Entry point for `runnerd`.
//!
//! Doubles as the entry point for spawned worker subprocesses: invoked as
//! `runnerd --worker <kind-byte>` (the hidden re-exec path
//! [`runner_worker::WorkerHandle::spawn`] uses, `SPEC_FULL.md` §10.3), it
//! runs the worker loop over its own stdio instead of starting the
//! listener. Grounded on `weaverd`'s `main.rs` bootstrap-then-serve shape
//! (`crates/weaverd/src/main.rs`) and `weaverd::process::shutdown`'s
//! signal-driven wait (`crates/weaverd/src/process/shutdown.rs`).

use std::io::{self, BufReader};
use std::process::ExitCode;

use clap::Parser;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{error, info};

use runner_config::{Cli, Config};
use runner_proto::RunnerKind;
use runner_worker::{WORKER_SUBCOMMAND, run_worker};
use runnerd::{Daemon, LaunchError, current_runner_exe, initialise_telemetry};

const MAIN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::main");

fn main() -> ExitCode {
    let mut args = std::env::args();
    let _argv0 = args.next();
    match args.next() {
        Some(first) if first == WORKER_SUBCOMMAND => run_as_worker(args),
        _ => run_as_daemon(),
    }
}

/// Runs the worker subprocess loop over this process's own stdio.
fn run_as_worker(mut args: impl Iterator<Item = String>) -> ExitCode {
    let Some(kind_arg) = args.next() else {
        #[expect(
            clippy::print_stderr,
            reason = "re-exec argument parsing runs before initialise_telemetry, so there is no subscriber to report through"
        )]
        {
            eprintln!("{WORKER_SUBCOMMAND} requires a runner kind byte argument");
        }
        return ExitCode::FAILURE;
    };
    let Ok(kind_byte) = kind_arg.parse::<u8>() else {
        #[expect(
            clippy::print_stderr,
            reason = "re-exec argument parsing runs before initialise_telemetry, so there is no subscriber to report through"
        )]
        {
            eprintln!("invalid runner kind byte: {kind_arg}");
        }
        return ExitCode::FAILURE;
    };

    let kind = RunnerKind::from_byte(kind_byte);
    match run_worker(kind, BufReader::new(io::stdin()), io::stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            #[expect(
                clippy::print_stderr,
                reason = "the worker re-exec path never calls initialise_telemetry, so there is no subscriber to report through"
            )]
            {
                eprintln!("worker loop failed: {error}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Runs the daemon: bind the listener, serve until a shutdown signal
/// arrives, then join the accept loop.
fn run_as_daemon() -> ExitCode {
    let config = Config::from(Cli::parse());
    if let Err(error) = initialise_telemetry(&config) {
        #[expect(
            clippy::print_stderr,
            reason = "telemetry initialisation itself failed, so there is no subscriber left to report through"
        )]
        {
            eprintln!("failed to initialise telemetry: {error}");
        }
        return ExitCode::FAILURE;
    }

    match serve(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(target: MAIN_TARGET, %error, "daemon exited with an error");
            ExitCode::FAILURE
        }
    }
}

fn serve(config: &Config) -> Result<(), LaunchError> {
    let runner_exe = current_runner_exe()?;
    let daemon = Daemon::bind(config.port, runner_exe)?;
    info!(target: MAIN_TARGET, addr = %daemon.local_addr(), "runnerd listening");
    wait_for_shutdown_signal();
    daemon.shutdown();
    daemon.join()
}

/// Blocks until a termination signal arrives, or returns immediately if
/// signal handlers could not be installed.
fn wait_for_shutdown_signal() {
    match Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP]) {
        Ok(mut signals) => {
            if let Some(signal) = signals.forever().next() {
                info!(target: MAIN_TARGET, signal, "shutdown signal received");
            }
        }
        Err(error) => {
            error!(target: MAIN_TARGET, %error, "failed to install signal handlers, shutting down immediately");
        }
    }
}
