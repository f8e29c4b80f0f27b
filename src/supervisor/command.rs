//! Session command lines and the environment they run in.

use crate::config::types::{KEY_BIN_GS, KEY_BIN_PLASMA, KEY_BIN_STEAM};
use crate::config::{ConfigError, GlobalConfig, KvConfig};
use crate::session::SessionTarget;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::process::Command;

/// Compositor flags used when the manifesto declares none.
pub const DEFAULT_COMPOSITOR_FLAGS: &[&str] = &["-e", "-f"];

/// Flags that put the game client into its console UI.
pub const STEAM_CLIENT_FLAGS: &[&str] = &["-gamepadui", "-steamos3"];

/// SSoT keys with one of these prefixes are exported to every session.
pub const EXPORTED_ENV_PREFIXES: &[&str] = &[
    "XDG_",
    "WAYLAND_",
    "DISPLAY",
    "DESKTOP_SESSION",
    "KDE_",
    "QT_",
    "GDK_",
    "SDL_",
];

pub fn is_exported_key(key: &str) -> bool {
    EXPORTED_ENV_PREFIXES
        .iter()
        .any(|prefix| key.starts_with(prefix))
}

/// Environment handed to session children. Built once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionEnv {
    vars: BTreeMap<OsString, OsString>,
}

impl SessionEnv {
    /// Current process environment plus the exported SSoT keys.
    pub fn from_process(config: &KvConfig) -> Self {
        Self::build(env::vars_os(), config)
    }

    pub fn build(base: impl IntoIterator<Item = (OsString, OsString)>, config: &KvConfig) -> Self {
        let mut vars: BTreeMap<OsString, OsString> = base.into_iter().collect();
        for (key, value) in config.strings().filter(|(key, _)| is_exported_key(key)) {
            debug!("Exporting {key}={value} to sessions");
            vars.insert(key.into(), value.into());
        }
        Self { vars }
    }

    pub fn get(&self, key: &str) -> Option<&OsStr> {
        self.vars.get(OsStr::new(key)).map(OsString::as_os_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars
            .iter()
            .map(|(key, value)| (key.as_os_str(), value.as_os_str()))
    }
}

/// Program and arguments for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCommand {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl SessionCommand {
    pub fn new<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a `Command` whose environment is exactly `env`.
    pub fn to_command(&self, env: &SessionEnv) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).env_clear().envs(env.iter());
        command
    }
}

/// The command line for each session target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCommands {
    steam: SessionCommand,
    desktop: SessionCommand,
}

impl SessionCommands {
    /// Builds both session commands.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingKey`] if any session binary is not configured.
    pub fn from_config(global: &GlobalConfig, manifesto: &KvConfig) -> Result<Self, ConfigError> {
        let compositor = global.require(KEY_BIN_GS)?;
        let steam = global.require(KEY_BIN_STEAM)?;
        let plasma = global.require(KEY_BIN_PLASMA)?;

        let mut args = compositor_flags(manifesto);
        args.push("--".to_string());
        args.push(steam.to_string());
        args.extend(STEAM_CLIENT_FLAGS.iter().map(|flag| flag.to_string()));

        Ok(Self {
            steam: SessionCommand::new(compositor, args),
            desktop: SessionCommand::new(plasma, Vec::<OsString>::new()),
        })
    }

    pub fn for_target(&self, target: SessionTarget) -> &SessionCommand {
        match target {
            SessionTarget::Steam => &self.steam,
            SessionTarget::Desktop => &self.desktop,
        }
    }
}

/// Compositor flags from the manifesto's bare lines, or the minimal default set.
pub fn compositor_flags(manifesto: &KvConfig) -> Vec<String> {
    let mut flags = Vec::new();
    for line in manifesto.flags() {
        match shlex::split(line) {
            Some(tokens) => flags.extend(tokens),
            None => warn!("Ignoring compositor flag line with unbalanced quotes: {line}"),
        }
    }

    if flags.is_empty() {
        DEFAULT_COMPOSITOR_FLAGS
            .iter()
            .map(|flag| flag.to_string())
            .collect()
    } else {
        flags
    }
}
