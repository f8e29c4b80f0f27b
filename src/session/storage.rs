use super::SessionTarget;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Handle on the `next_session` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    path: PathBuf,
}

impl SessionState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the persisted target, or `Steam` if the file is missing,
    /// unreadable or holds anything but a valid token.
    pub fn read(&self) -> SessionTarget {
        match fs::read_to_string(&self.path) {
            Ok(contents) => match contents.trim().parse() {
                Ok(target) => target,
                Err(err) => {
                    warn!(
                        "Session state {} is corrupt ({}), defaulting to steam",
                        self.path.display(),
                        err
                    );
                    SessionTarget::Steam
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(
                    "No session state at {}, defaulting to steam",
                    self.path.display()
                );
                SessionTarget::Steam
            }
            Err(err) => {
                warn!(
                    "Failed to read session state {}: {}; defaulting to steam",
                    self.path.display(),
                    err
                );
                SessionTarget::Steam
            }
        }
    }

    /// Persists `target` via temp file + rename in the same directory.
    pub fn write(&self, target: SessionTarget) -> Result<()> {
        if let Some(parent) = self.parent_dir() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create session state directory {}", parent.display())
            })?;
        }

        let tmp_path = temp_path(&self.path);
        let written = write_synced(&tmp_path, target.as_str().as_bytes());
        if let Err(err) = written {
            fs::remove_file(&tmp_path).ok();
            return Err(err);
        }

        if let Err(err) = fs::rename(&tmp_path, &self.path) {
            fs::remove_file(&tmp_path).ok();
            return Err(err).with_context(|| {
                format!(
                    "failed to move temporary session state {} -> {}",
                    tmp_path.display(),
                    self.path.display()
                )
            });
        }

        if let Some(parent) = self.parent_dir() {
            sync_dir(parent).with_context(|| {
                format!("failed to sync session state directory {}", parent.display())
            })?;
            sweep_stale_temps(&self.path);
        }

        info!("Next session set to {} ({})", target, self.path.display());
        Ok(())
    }

    fn parent_dir(&self) -> Option<&Path> {
        match self.path.parent() {
            Some(parent) if parent.as_os_str().is_empty() => Some(Path::new(".")),
            other => other,
        }
    }
}

/// Makes a completed rename in `dir` durable.
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

/// Removes temp files left next to `target` by writers that died mid-write.
/// Files owned by this process or by a live process are left alone.
fn sweep_stale_temps(target: &Path) {
    let (Some(dir), Some(file_name)) = (target.parent(), target.file_name()) else {
        return;
    };
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    let prefix = format!("{}.tmp", file_name.to_string_lossy());
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(owner) = name
            .to_str()
            .and_then(|name| name.strip_prefix(&prefix))
            .and_then(|rest| rest.split('.').next())
            .and_then(|pid| pid.parse::<i32>().ok())
        else {
            continue;
        };
        if owner == std::process::id() as i32 || process_alive(owner) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => debug!("Removed stale session temp file {}", entry.path().display()),
            Err(err) => debug!(
                "Could not remove stale session temp file {}: {}",
                entry.path().display(),
                err
            ),
        }
    }
}

fn process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    !matches!(signal::kill(Pid::from_raw(pid), None::<Signal>), Err(Errno::ESRCH))
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("failed to open temporary session state {}", path.display()))?;
    file.write_all(bytes)
        .context("failed to write session state")?;
    file.sync_all()
        .context("failed to sync temporary session state")?;
    Ok(())
}

/// Picks a temp name next to `target` that no other writer currently holds.
fn temp_path(target: &Path) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "next_session".to_string());
    let base = format!("{}.tmp{}", file_name, std::process::id());

    let mut candidate = target.with_file_name(&base);
    let mut counter = 0u32;
    while candidate.exists() {
        counter += 1;
        candidate = target.with_file_name(format!("{base}.{counter}"));
    }
    candidate
}
