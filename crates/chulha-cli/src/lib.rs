// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! `chulha-admin`: manage staff, menu, reservations and contact details
//! held in a local document store.

mod actions;
mod commands;

use chulha_core::{ExitCode, MachineError, ENV_CHULHA_LOG_LEVEL};
use chulha_store::{OperationStage, StoreConfig, StoreError, StoreErrorCode};
use clap::error::ErrorKind;
use clap::{ArgAction, Parser, Subcommand};
use commands::{CollectionCommand, DetailsCommand, ReservationCommand};
use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;
use tracing_subscriber::EnvFilter;

pub const CRATE_NAME: &str = "chulha-cli";

#[derive(Parser)]
#[command(name = "chulha-admin")]
#[command(about = "Sanjha Chulha admin console")]
struct Cli {
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    /// Directory holding the collection files; overrides CHULHA_DATA_ROOT.
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Staff {
        #[command(subcommand)]
        command: CollectionCommand,
    },
    Menu {
        #[command(subcommand)]
        command: CollectionCommand,
    },
    Reservations {
        #[command(subcommand)]
        command: ReservationCommand,
    },
    /// Print a line per snapshot of a collection until interrupted.
    Watch {
        collection: String,
        /// Stop after this many snapshots.
        #[arg(long)]
        limit: Option<u64>,
        /// How often to look for changes made by other processes.
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,
    },
    Details {
        #[command(subcommand)]
        command: DetailsCommand,
    },
}

pub fn main_entry() -> ProcessExitCode {
    let wants_json = std::env::args().any(|arg| arg == "--json");
    match run() {
        Ok(()) => ProcessExitCode::from(ExitCode::Success.code()),
        Err(err) => {
            emit_error(&err, wants_json);
            ProcessExitCode::from(err.exit_code.code())
        }
    }
}

fn run() -> Result<(), CliError> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{err}");
                return Ok(());
            }
            _ => {
                return Err(CliError::usage("invalid command line arguments")
                    .with_detail("error", &err.to_string()));
            }
        },
    };
    let command = cli
        .command
        .ok_or_else(|| CliError::usage("missing command; see --help"))?;
    let mut config = StoreConfig::from_env()?;
    if let Some(root) = cli.data_root {
        config = config.with_data_root(root);
    }
    init_tracing(cli.verbose, config.log_json);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::internal(format!("cannot start runtime: {e}")))?;
    let output = OutputMode { json: cli.json };
    runtime.block_on(async move {
        let ctx = actions::Context::open(config, output).await?;
        match command {
            Commands::Staff { command } => ctx.run_collection("staff", command).await,
            Commands::Menu { command } => ctx.run_collection("menu", command).await,
            Commands::Reservations { command } => ctx.run_reservations(command).await,
            Commands::Watch {
                collection,
                limit,
                poll_ms,
            } => ctx.watch(&collection, limit, poll_ms).await,
            Commands::Details { command } => ctx.run_details(command).await,
        }
    })
}

#[derive(Clone, Copy)]
pub(crate) struct OutputMode {
    pub(crate) json: bool,
}

fn init_tracing(verbose: u8, json: bool) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(ENV_CHULHA_LOG_LEVEL)
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[derive(Debug)]
pub(crate) struct CliError {
    exit_code: ExitCode,
    machine: MachineError,
}

impl CliError {
    pub(crate) fn usage(message: &str) -> Self {
        Self {
            exit_code: ExitCode::Usage,
            machine: MachineError::new("usage_error", message),
        }
    }

    pub(crate) fn validation(message: &str) -> Self {
        Self {
            exit_code: ExitCode::Validation,
            machine: MachineError::new("validation_error", message),
        }
    }

    pub(crate) fn internal(message: String) -> Self {
        Self {
            exit_code: ExitCode::Internal,
            machine: MachineError::new("internal_error", &message),
        }
    }

    pub(crate) fn with_detail(mut self, key: &str, value: &str) -> Self {
        self.machine = self.machine.with_detail(key, value);
        self
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        let exit_code = match err.code {
            StoreErrorCode::Decode | StoreErrorCode::NotFound => ExitCode::Validation,
            StoreErrorCode::Config => ExitCode::Usage,
            StoreErrorCode::StoreUnavailable
            | StoreErrorCode::UploadRejected
            | StoreErrorCode::Network
            | StoreErrorCode::Write => ExitCode::DependencyFailure,
            _ => ExitCode::Internal,
        };
        Self {
            exit_code,
            machine: MachineError::new(err.code.as_str(), &err.message)
                .with_detail("stage", err.stage.as_str()),
        }
    }
}

pub(crate) fn store_error(code: StoreErrorCode, stage: OperationStage, message: String) -> CliError {
    CliError::from(StoreError::new(code, stage, message))
}

fn emit_error(error: &CliError, machine_json: bool) {
    if machine_json {
        match error.machine.to_json() {
            Ok(payload) => eprintln!("{payload}"),
            Err(_) => eprintln!(
                "{{\"code\":\"internal_error\",\"message\":\"failed to encode structured error\",\"details\":{{}}}}"
            ),
        }
    } else {
        eprintln!("error: {}", error.machine);
    }
}
