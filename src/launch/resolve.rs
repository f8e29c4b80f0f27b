use super::LaunchError;
use super::discovery::Discovery;
use crate::config::KvConfig;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;

pub const KEY_WRAPPER: &str = "GAME_WRAPPER";
pub const KEY_EXTRA_ARGS: &str = "GAME_EXTRA_ARGS";

/// Everything needed to replace the resolver with the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLaunch {
    pub game_id: String,
    pub override_path: Option<PathBuf>,
    pub command: Vec<OsString>,
    pub env: BTreeMap<OsString, OsString>,
}

impl ResolvedLaunch {
    /// Name of the override file, or `GLOBAL` when only the manifesto applied.
    pub fn config_label(&self) -> String {
        self.override_path
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "GLOBAL".to_string())
    }

    pub fn program(&self) -> Option<&OsString> {
        self.command.first()
    }
}

/// Merges the manifesto and the optional game layer over `base_env` and
/// wraps `argv` with the effective wrapper and extra arguments.
pub fn resolve(
    argv: &[OsString],
    base_env: impl IntoIterator<Item = (OsString, OsString)>,
    manifesto: &KvConfig,
    game: Option<&KvConfig>,
    discovery: Discovery,
) -> Result<ResolvedLaunch, LaunchError> {
    if argv.is_empty() {
        return Err(LaunchError::EmptyCommand);
    }

    let mut env: BTreeMap<OsString, OsString> = base_env.into_iter().collect();
    for (key, value) in manifesto.strings() {
        env.insert(key.into(), value.into());
    }

    let mut wrapper = manifesto.text(KEY_WRAPPER).unwrap_or_default();
    let mut extra_args = manifesto.text(KEY_EXTRA_ARGS).unwrap_or_default();

    if let Some(game) = game {
        wrapper = game.text(KEY_WRAPPER).unwrap_or(wrapper);
        extra_args = game.text(KEY_EXTRA_ARGS).unwrap_or(extra_args);

        for (key, value) in game
            .strings()
            .filter(|(key, _)| *key != KEY_WRAPPER && *key != KEY_EXTRA_ARGS)
        {
            env.insert(key.into(), value.into());
        }
    }

    let mut command: Vec<OsString> = tokenize(KEY_WRAPPER, wrapper)?;
    command.extend(argv.iter().cloned());
    command.extend(tokenize(KEY_EXTRA_ARGS, extra_args)?);

    Ok(ResolvedLaunch {
        game_id: discovery.game_id,
        override_path: discovery.override_path,
        command,
        env,
    })
}

fn tokenize(key: &'static str, value: &str) -> Result<Vec<OsString>, LaunchError> {
    shlex::split(value)
        .map(|tokens| tokens.into_iter().map(OsString::from).collect())
        .ok_or_else(|| LaunchError::Tokenize {
            key,
            value: value.to_string(),
        })
}
