use log::debug;
use std::path::{Path, PathBuf};

/// How many ancestor directories are checked, starting at the binary's parent.
pub const MAX_CLIMB: usize = 3;

/// Directory names that mark a generic library or install root. Discovery
/// never looks at or above them.
pub const STOP_DIRS: &[&str] = &["common", "steamapps", "GOG Games", "Games", "home", "bin"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRules {
    pub max_climb: usize,
    pub stop_dirs: Vec<String>,
}

impl Default for DiscoveryRules {
    fn default() -> Self {
        Self {
            max_climb: MAX_CLIMB,
            stop_dirs: STOP_DIRS.iter().map(|dir| dir.to_string()).collect(),
        }
    }
}

impl DiscoveryRules {
    fn is_stop(&self, name: &str) -> bool {
        self.stop_dirs.iter().any(|stop| stop == name)
    }
}

/// Outcome of override discovery for one binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub game_id: String,
    pub override_path: Option<PathBuf>,
}

/// File name without extension, used as the default game id.
pub fn exe_id(binary: &Path) -> String {
    binary
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Finds the most specific override for `binary` inside `override_dir`.
///
/// At each level `<exe>.conf` is preferred over `<dir>.conf`.
pub fn discover(binary: &Path, override_dir: &Path, rules: &DiscoveryRules) -> Discovery {
    let exe = exe_id(binary);
    let mut current = binary.parent();

    for _ in 0..rules.max_climb {
        let Some(dir) = current else { break };
        let name = dir.file_name().map(|name| name.to_string_lossy().into_owned());
        if name.as_deref().is_some_and(|name| rules.is_stop(name)) {
            debug!("Stopping discovery at {}", dir.display());
            break;
        }

        // The filesystem root has no name; only the exe candidate applies there.
        let mut candidates = vec![override_dir.join(format!("{exe}.conf"))];
        if let Some(name) = &name {
            candidates.push(override_dir.join(format!("{name}.conf")));
        }

        for candidate in candidates {
            if candidate.is_file() {
                return Discovery {
                    game_id: exe_id(&candidate),
                    override_path: Some(candidate),
                };
            }
        }

        current = dir.parent();
    }

    Discovery {
        game_id: exe,
        override_path: None,
    }
}
