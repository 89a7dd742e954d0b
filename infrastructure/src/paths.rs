//! Filesystem layout and hardened write helpers
//!
//! Everything council persists lives under a single base directory:
//! `COUNCIL_HOME` when set, otherwise `<platform config dir>/council`. The
//! directory and every file inside it are owner-only; the permission bits
//! are reapplied on every open to resist drift. On hosts without POSIX
//! permissions, chmod failures are ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const COUNCIL_HOME_ENV_VAR: &str = "COUNCIL_HOME";
pub const AUDIT_LOG_FILE_NAME: &str = "council.log";
pub const TRUSTED_KEYS_DIR_NAME: &str = "trusted_flow_keys";
pub const USER_FLOW_FILE_NAME: &str = "flow.json";

/// Base directory for state, logs and the trust store.
pub fn council_home() -> PathBuf {
    council_home_from(std::env::var(COUNCIL_HOME_ENV_VAR).ok().as_deref())
}

fn council_home_from(override_value: Option<&str>) -> PathBuf {
    if let Some(raw) = override_value {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    dirs::config_dir()
        .map(|dir| dir.join("council"))
        .unwrap_or_else(|| PathBuf::from(".council"))
}

/// Create the base directory if needed and harden it.
pub fn ensure_council_home() -> io::Result<PathBuf> {
    let home = council_home();
    fs::create_dir_all(&home)?;
    harden_dir(&home);
    Ok(home)
}

pub fn audit_log_path(home: &Path) -> PathBuf {
    home.join(AUDIT_LOG_FILE_NAME)
}

pub fn user_flow_path(home: &Path) -> PathBuf {
    home.join(USER_FLOW_FILE_NAME)
}

pub fn trusted_keys_dir(home: &Path) -> PathBuf {
    home.join(TRUSTED_KEYS_DIR_NAME)
}

/// Reapply owner-only (0700) permissions to a directory.
pub fn harden_dir(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o700));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

/// Reapply owner-only (0600) permissions to a file.
pub fn harden_file(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

/// Write `payload` atomically with owner-only permissions: a temp file in
/// the target directory, hardened, then renamed over the destination.
pub fn secure_write_bytes(path: &Path, payload: &[u8]) -> io::Result<()> {
    use std::io::Write;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    harden_dir(&parent);

    let mut temp = tempfile::NamedTempFile::new_in(&parent)?;
    temp.write_all(payload)?;
    temp.flush()?;
    harden_file(temp.path());
    temp.persist(path).map_err(|err| err.error)?;
    harden_file(path);
    Ok(())
}
