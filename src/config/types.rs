use super::{ConfigError, KvConfig};
use log::{debug, info};
use std::env;
use std::path::{Path, PathBuf};

/// Location of the system-wide SSoT file.
pub const DEFAULT_SSOT_PATH: &str = "/etc/default/steamos_diy.conf";

/// Environment variable that points the tools at a different SSoT file.
pub const SSOT_PATH_ENV: &str = "STEAMOS_DIY_CONF";

pub const DEFAULT_NEXT_SESSION: &str = "/var/lib/steamos_diy/next_session";
pub const DEFAULT_STEAM_BIN: &str = "steam";
pub const DEFAULT_LOG_FILE: &str = "/tmp/steamos-diy-fallback.log";

pub const KEY_NEXT_SESSION: &str = "next_session";
pub const KEY_USER_CONFIG: &str = "user_config";
pub const KEY_BIN_STEAM: &str = "bin_steam";
pub const KEY_BIN_GS: &str = "bin_gs";
pub const KEY_BIN_PLASMA: &str = "bin_plasma";
pub const KEY_LOG_FILE: &str = "LOG_FILE";

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    /// `key=value` line.
    Text(String),
    /// Bare line without `=`; the line itself is the key.
    Flag,
}

impl ConfigValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Flag => None,
        }
    }

    pub fn is_flag(&self) -> bool {
        matches!(self, Self::Flag)
    }
}

/// The SSoT configuration with typed accessors.
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    path: PathBuf,
    values: KvConfig,
}

impl GlobalConfig {
    /// Returns the SSoT path, honouring `STEAMOS_DIY_CONF`.
    pub fn path() -> PathBuf {
        env::var_os(SSOT_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SSOT_PATH))
    }

    /// Loads the SSoT from its configured location.
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`] if the file cannot be read.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let values = KvConfig::load(path)?;
        info!("Loaded SSoT from {}", path.display());
        Ok(Self::from_parts(path.to_path_buf(), values))
    }

    /// Loads the SSoT, or an empty one carrying only built-in fallbacks.
    pub fn load_or_fallback() -> Self {
        let path = Self::path();
        match KvConfig::load(&path) {
            Ok(values) => Self::from_parts(path, values),
            Err(err) => {
                info!("{err}; using built-in defaults");
                Self::from_parts(path, KvConfig::default())
            }
        }
    }

    pub fn from_parts(path: PathBuf, values: KvConfig) -> Self {
        debug!("SSoT {}: {:?}", path.display(), values);
        Self { path, values }
    }

    pub fn source(&self) -> &Path {
        &self.path
    }

    pub fn values(&self) -> &KvConfig {
        &self.values
    }

    /// Returns a text value or [`ConfigError::MissingKey`].
    pub fn require(&self, key: &'static str) -> Result<&str, ConfigError> {
        self.values
            .text(key)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::MissingKey {
                key,
                path: self.path.clone(),
            })
    }

    pub fn next_session(&self) -> PathBuf {
        self.values
            .text(KEY_NEXT_SESSION)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_NEXT_SESSION))
    }

    /// Path of the user manifesto; falls back to `<config dir>/steamos_diy/config`.
    pub fn user_config(&self) -> PathBuf {
        if let Some(path) = self.values.text(KEY_USER_CONFIG) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("steamos_diy")
            .join("config")
    }

    pub fn steam_bin(&self) -> &str {
        self.values.text(KEY_BIN_STEAM).unwrap_or(DEFAULT_STEAM_BIN)
    }

    pub fn log_file(&self) -> PathBuf {
        self.values
            .text(KEY_LOG_FILE)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
    }
}
