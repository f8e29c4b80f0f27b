//! Switch trigger: persists a new session intent, then ends the running session.
//!
//! The state file is written before any termination attempt, so a trigger that
//! dies right after the write still gets its switch on the supervisor's next
//! iteration. Ending the foreground session only makes that happen sooner.

mod shutdown;

pub use shutdown::{
    CommandMechanism, KdeDbusLogout, QDBUS_CLIENTS, ShutdownAttempt, ShutdownMechanism,
    desktop_logout_chain, run_chain,
};

use crate::config::GlobalConfig;
use crate::session::{SessionState, SessionTarget, UnknownTarget};
use anyhow::{Context, Result};
use log::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    Switched(SessionTarget),
    /// Unrecognised request; nothing was written or terminated.
    Rejected(UnknownTarget),
}

pub struct Switcher {
    state: SessionState,
    steam_shutdown: Vec<Box<dyn ShutdownMechanism>>,
    desktop_logout: Vec<Box<dyn ShutdownMechanism>>,
}

impl Switcher {
    /// Uses the SSoT when present, built-in paths otherwise.
    pub fn from_config(global: &GlobalConfig) -> Self {
        Self::with_mechanisms(
            SessionState::new(global.next_session()),
            vec![Box::new(CommandMechanism::steam_shutdown(global.steam_bin()))],
            desktop_logout_chain(),
        )
    }

    pub fn with_mechanisms(
        state: SessionState,
        steam_shutdown: Vec<Box<dyn ShutdownMechanism>>,
        desktop_logout: Vec<Box<dyn ShutdownMechanism>>,
    ) -> Self {
        Self {
            state,
            steam_shutdown,
            desktop_logout,
        }
    }

    /// Handles one switch request.
    ///
    /// # Errors
    /// Only a failure to persist the new target is an error; termination is
    /// best-effort.
    pub fn switch(&self, requested: &str) -> Result<SwitchOutcome> {
        let target = match SessionTarget::from_request(requested) {
            Ok(target) => target,
            Err(err) => {
                warn!("Target '{}' not recognized.", requested.trim());
                return Ok(SwitchOutcome::Rejected(err));
            }
        };

        info!("Switching to: {}", target.as_str().to_uppercase());
        self.state
            .write(target)
            .with_context(|| format!("failed to record switch to {target}"))?;

        let ended = match target {
            SessionTarget::Desktop => {
                info!("Closing Steam...");
                run_chain(&self.steam_shutdown)
            }
            SessionTarget::Steam => {
                info!("Desktop logout...");
                run_chain(&self.desktop_logout)
            }
        };
        if !ended {
            warn!(
                "Could not end the running session; switch to {target} applies when it exits"
            );
        }

        Ok(SwitchOutcome::Switched(target))
    }
}
