//! Game launch resolver.
//!
//! Wraps a game binary (the last argument) with the user's manifesto and the
//! most specific per-game override from `games.d/`, then replaces itself with
//! the resulting command:
//!
//! 1. `discovery` walks up to three ancestor directories for `<exe>.conf` or
//!    `<dir>.conf`, never past a library root such as `steamapps`.
//! 2. `resolve` merges manifesto and override (override wins) into the final
//!    environment and wraps the original arguments.
//! 3. `exec` locates the program on the final `PATH` and execs it.

mod discovery;
mod exec;
mod resolve;

pub use discovery::{Discovery, DiscoveryRules, MAX_CLIMB, STOP_DIRS, discover, exe_id};
pub use exec::{locate_program, replace_process};
pub use resolve::{KEY_EXTRA_ARGS, KEY_WRAPPER, ResolvedLaunch, resolve};

use crate::config::{GlobalConfig, KvConfig};
use log::{debug, info};
use std::convert::Infallible;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the override directory next to the manifesto.
pub const OVERRIDE_DIR_NAME: &str = "games.d";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no command to launch")]
    EmptyCommand,

    #[error("cannot split {key} value '{value}': unbalanced quotes")]
    Tokenize { key: &'static str, value: String },

    #[error("'{program}' not found on PATH: {source}")]
    NotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("failed to execute {}: {source}", program.display())]
    Exec {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub struct Resolver {
    manifesto_path: PathBuf,
    rules: DiscoveryRules,
}

impl Resolver {
    pub fn new(manifesto_path: impl Into<PathBuf>, rules: DiscoveryRules) -> Self {
        Self {
            manifesto_path: manifesto_path.into(),
            rules,
        }
    }

    pub fn from_config(global: &GlobalConfig) -> Self {
        Self::new(global.user_config(), DiscoveryRules::default())
    }

    pub fn override_dir(&self) -> PathBuf {
        self.manifesto_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(OVERRIDE_DIR_NAME)
    }

    /// Resolves `argv` against the process-supplied `base_env`.
    pub fn resolve(
        &self,
        argv: &[OsString],
        base_env: impl IntoIterator<Item = (OsString, OsString)>,
    ) -> Result<ResolvedLaunch, LaunchError> {
        let target = argv.last().ok_or(LaunchError::EmptyCommand)?;
        let binary = real_path(Path::new(target));

        let override_dir = self.override_dir();
        let discovery = discover(&binary, &override_dir, &self.rules);
        debug!(
            "Discovery for {}: {:?}",
            binary.display(),
            discovery.override_path
        );

        let manifesto = KvConfig::load_optional(&self.manifesto_path);
        let game = discovery.override_path.as_deref().map(KvConfig::load_optional);

        resolve(argv, base_env, &manifesto, game.as_ref(), discovery)
    }
}

/// Absolute, symlink-resolved path; falls back to the lexical absolute path
/// when the file cannot be canonicalised.
fn real_path(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Resolves and execs the game. Only returns on failure.
pub fn launch(resolver: &Resolver, argv: &[OsString]) -> Result<Infallible, LaunchError> {
    if let Err(err) = fs::create_dir_all(resolver.override_dir()) {
        debug!(
            "Could not create {}: {}",
            resolver.override_dir().display(),
            err
        );
    }

    let resolved = resolver.resolve(argv, std::env::vars_os())?;
    info!(
        "ID: {} | Conf: {} | Cmd: {}",
        resolved.game_id,
        resolved.config_label(),
        resolved
            .program()
            .map(|program| program.to_string_lossy().into_owned())
            .unwrap_or_default()
    );

    replace_process(&resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_reads_manifesto_and_matching_override() {
        let temp = tempfile::tempdir().unwrap();
        let config_dir = temp.path().join("steamos_diy");
        fs::create_dir_all(config_dir.join("games.d")).unwrap();
        fs::write(
            config_dir.join("config"),
            "FOO=1\nGAME_WRAPPER=gamemoderun\n--rt\n",
        )
        .unwrap();
        fs::write(config_dir.join("games.d/mygame.conf"), "FOO=2\nDXVK_HUD=1\n").unwrap();

        let binary = temp.path().join("Library/parentdir/mygame");
        fs::create_dir_all(binary.parent().unwrap()).unwrap();
        fs::write(&binary, "").unwrap();

        let resolver = Resolver::new(config_dir.join("config"), DiscoveryRules::default());
        let argv = vec![OsString::from(&binary)];
        let launch = resolver
            .resolve(&argv, vec![("PATH".into(), "/usr/bin".into())])
            .unwrap();

        assert_eq!(launch.game_id, "mygame");
        assert_eq!(launch.config_label(), "mygame.conf");
        assert_eq!(launch.env.get(&OsString::from("FOO")).unwrap(), "2");
        assert_eq!(launch.env.get(&OsString::from("DXVK_HUD")).unwrap(), "1");
        assert_eq!(
            launch.command,
            vec![OsString::from("gamemoderun"), OsString::from(&binary)]
        );
    }

    #[test]
    fn symlinked_binary_is_discovered_by_its_real_location() {
        let temp = tempfile::tempdir().unwrap();
        let config_dir = temp.path().join("cfg");
        fs::create_dir_all(config_dir.join("games.d")).unwrap();
        fs::write(config_dir.join("games.d/RealGame.conf"), "MODE=real\n").unwrap();

        let real = temp.path().join("RealGame/game.bin");
        fs::create_dir_all(real.parent().unwrap()).unwrap();
        fs::write(&real, "").unwrap();
        let link = temp.path().join("launcher");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let resolver = Resolver::new(config_dir.join("config"), DiscoveryRules::default());
        let launch = resolver.resolve(&[OsString::from(&link)], vec![]).unwrap();

        assert_eq!(launch.game_id, "RealGame");
        // The command keeps the path as it was given.
        assert_eq!(launch.command, vec![OsString::from(&link)]);
    }

    #[test]
    fn override_dir_sits_next_to_manifesto() {
        let resolver = Resolver::new("/home/deck/.config/steamos_diy/config", DiscoveryRules::default());
        assert_eq!(
            resolver.override_dir(),
            PathBuf::from("/home/deck/.config/steamos_diy/games.d")
        );
    }
}
