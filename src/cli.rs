//! Command-line surface shared by `steamos-diy` and its per-role aliases.

use crate::config::GlobalConfig;
use crate::launch::{self, Resolver};
use crate::logging::{self, TAG_ENGINE, TAG_SESSION};
use crate::select::{SwitchOutcome, Switcher};
use crate::shim::{DEFAULT_BRANCH, DEFAULT_TIMEZONE, Shim};
use crate::supervisor::Supervisor;
use clap::{Parser, Subcommand};
use log::error;
use std::ffi::OsString;
use std::process::ExitCode;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (git ",
    env!("STEAMOS_DIY_GIT_HASH"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "steamos-diy")]
#[command(
    version,
    long_version = LONG_VERSION,
    about = "Session switching and game launch wrapper for a DIY SteamOS appliance"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Alternate between the Steam and desktop sessions forever
    Session,

    /// Record the next session and end the running one
    Select {
        /// steam, desktop or plasma (case-insensitive)
        target: String,
    },

    /// Wrap a game binary with the manifesto and its per-game override
    #[command(disable_help_flag = true)]
    Launch {
        /// Original arguments; the last one is the real game binary
        #[arg(
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_name = "ARGS"
        )]
        argv: Vec<OsString>,
    },

    /// Platform tooling stand-ins
    Shim {
        #[command(subcommand)]
        shim: ShimCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ShimCommand {
    /// OTA update check; always reports up to date
    Update,
    /// BIOS update; always reports success
    BiosUpdate,
    /// Release branch switch
    SelectBranch {
        #[arg(default_value = DEFAULT_BRANCH)]
        name: String,
    },
    /// Timezone change
    SetTimezone {
        #[arg(default_value = DEFAULT_TIMEZONE)]
        zone: String,
    },
}

impl From<ShimCommand> for Shim {
    fn from(command: ShimCommand) -> Self {
        match command {
            ShimCommand::Update => Shim::Update,
            ShimCommand::BiosUpdate => Shim::BiosUpdate,
            ShimCommand::SelectBranch { name } => Shim::SelectBranch { name },
            ShimCommand::SetTimezone { zone } => Shim::SetTimezone { zone },
        }
    }
}

/// Entry point for the alias binaries: parses the process arguments as if
/// `subcommand` had been typed after the program name.
pub fn run_alias(subcommand: &[&str]) -> ExitCode {
    let mut args: Vec<OsString> = std::env::args_os().collect();
    let program = if args.is_empty() {
        OsString::from("steamos-diy")
    } else {
        args.remove(0)
    };

    let argv = std::iter::once(program)
        .chain(subcommand.iter().map(OsString::from))
        .chain(args);
    run(parse_args(argv))
}

/// Parses `args` (program name first).
///
/// `launch` arguments belong to the game, so an explicit `--` is placed after
/// the subcommand; a `--` supplied by the caller then reaches the game intact.
pub fn parse_args<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if args.get(1).is_some_and(|arg| arg == "launch") {
        args.insert(2, OsString::from("--"));
    }
    Cli::parse_from(args)
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Session => {
            logging::init(TAG_SESSION, "[LAUNCHER]");
            run_session()
        }
        Command::Select { target } => {
            logging::init(TAG_SESSION, "[SELECT]");
            run_select(&target)
        }
        Command::Launch { argv } => {
            logging::init(TAG_ENGINE, "[ENGINE]");
            run_launch(&argv)
        }
        Command::Shim { shim } => {
            let shim = Shim::from(shim);
            logging::init(shim.tag(), "[SHIM]");
            let global = GlobalConfig::load_or_fallback();
            ExitCode::from(shim.run(&global.log_file()))
        }
    }
}

fn run_session() -> ExitCode {
    let global = match GlobalConfig::load() {
        Ok(global) => global,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let mut supervisor = match Supervisor::from_config(&global) {
        Ok(supervisor) => supervisor,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match supervisor.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_select(target: &str) -> ExitCode {
    let global = GlobalConfig::load_or_fallback();
    match Switcher::from_config(&global).switch(target) {
        Ok(SwitchOutcome::Switched(_)) | Ok(SwitchOutcome::Rejected(_)) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_launch(argv: &[OsString]) -> ExitCode {
    let global = GlobalConfig::load_or_fallback();
    let resolver = Resolver::from_config(&global);
    match launch::launch(&resolver, argv) {
        Ok(never) => match never {},
        Err(err) => {
            error!("CRITICAL ERROR: {err}");
            logging::flush();
            ExitCode::FAILURE
        }
    }
}
