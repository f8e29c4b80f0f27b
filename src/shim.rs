//! Stand-ins for platform tooling the game client calls on a real SteamOS
//! install. Each one logs what it was asked and answers with a fixed result.

use crate::logging::{TAG_SESSION, TAG_SHIM};
use log::info;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Exit status the client reads as "no update available".
pub const UPDATE_NOT_AVAILABLE: u8 = 7;

pub const DEFAULT_BRANCH: &str = "stable";
pub const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shim {
    Update,
    BiosUpdate,
    SelectBranch { name: String },
    SetTimezone { zone: String },
}

impl Shim {
    /// Journal tag the shim logs under.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Update => TAG_SESSION,
            _ => TAG_SHIM,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Update => UPDATE_NOT_AVAILABLE,
            _ => 0,
        }
    }

    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Update => vec![
                "OTA update request intercepted.".to_string(),
                "Reporting system up to date.".to_string(),
            ],
            Self::BiosUpdate => vec!["BIOS update intercepted, reporting OK.".to_string()],
            Self::SelectBranch { name } => vec![
                format!("Branch switch request: {name}"),
                "Branch switch confirmed.".to_string(),
            ],
            Self::SetTimezone { zone } => vec![
                format!("Timezone request: {zone}"),
                "Timezone acknowledged.".to_string(),
            ],
        }
    }

    /// Logs the shim's lines and returns its exit status. `set-timezone`
    /// also mirrors them into `log_file`.
    pub fn run(&self, log_file: &Path) -> u8 {
        let messages = self.messages();
        for message in &messages {
            info!("{message}");
        }

        if matches!(self, Self::SetTimezone { .. }) {
            append_log_file(log_file, &messages);
        }

        self.exit_code()
    }
}

/// Best-effort append; a missing or read-only log file is not the shim's
/// problem.
fn append_log_file(path: &Path, messages: &[String]) {
    let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };
    let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    for message in messages {
        if writeln!(file, "[{stamp}] [{TAG_SHIM}] {message}").is_err() {
            return;
        }
    }
}
