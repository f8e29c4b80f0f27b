//! Flat key/value configuration support shared by every steamos-diy component.
//!
//! The SSoT file (`/etc/default/steamos_diy.conf`), the user manifesto and the
//! per-game overrides under `games.d/` all use the same line-oriented dialect:
//!
//! ```text
//! # comment
//! bin_steam=/usr/bin/steam
//! GAME_WRAPPER="gamemoderun mangohud"
//! --rt
//! ```
//!
//! Lines with `=` become text values, bare lines become boolean flags. Files are
//! read once per process and never written back.

pub mod types;

pub use types::{ConfigValue, GlobalConfig};

use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("required key '{key}' missing from {path}")]
    MissingKey { key: &'static str, path: PathBuf },
}

/// Parsed contents of one key/value file.
///
/// Entries keep the order in which their key first appeared; a repeated key
/// replaces the earlier value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvConfig {
    entries: Vec<(String, ConfigValue)>,
}

impl KvConfig {
    /// Parses configuration text. Never fails: malformed lines are skipped.
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.split_once('=') {
                Some((key, value)) => {
                    let key = key.trim();
                    if key.is_empty() {
                        debug!("Ignoring config line without a key: {line}");
                        continue;
                    }
                    config.insert(key, ConfigValue::Text(unquote(value.trim()).to_string()));
                }
                None => config.insert(line, ConfigValue::Flag),
            }
        }

        config
    }

    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`] if the file is missing or unreadable.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(Self::parse(&text))
    }

    /// Like [`KvConfig::load`], but a missing or unreadable file yields an empty config.
    pub fn load_optional(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                debug!("No config at {}, using empty layer", path.display());
                Self::default()
            }
            Err(err) => {
                warn!("{err}; using empty layer");
                Self::default()
            }
        }
    }

    fn insert(&mut self, key: &str, value: ConfigValue) {
        match self.entries.iter_mut().find(|(existing, _)| existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    /// Returns the text value for `key`; flags have no text and yield `None`.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_text)
    }

    /// Text-valued entries in file order.
    pub fn strings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(key, value)| value.as_text().map(|text| (key.as_str(), text)))
    }

    /// Bare flag lines in file order.
    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, value)| value.is_flag())
            .map(|(key, _)| key.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Strips one layer of matching single or double quotes.
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
