//! Rotating NDJSON audit log
//!
//! One JSON object per line: `{timestamp_utc, level, event, data}`. The
//! writer is serialized behind a mutex so lines never interleave; file mode
//! 0600 and directory mode 0700 are reapplied on every open and every emit
//! to resist drift. Rotation is size-triggered, shifting backups `.1..N`.
//!
//! Settings come from `LOG_LEVEL`, `LOG_MAX_BYTES` and `LOG_BACKUP_COUNT`
//! and fail fast on invalid values.

use crate::config::limits::{read_positive_int_env, LimitsError};
use crate::paths;
use chrono::{SecondsFormat, Utc};
use council_application::ports::audit::{AuditLevel, AuditLogger};
use serde_json::{json, Value};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

pub const LOG_LEVEL_ENV_VAR: &str = "LOG_LEVEL";
pub const LOG_MAX_BYTES_ENV_VAR: &str = "LOG_MAX_BYTES";
pub const LOG_BACKUP_COUNT_ENV_VAR: &str = "LOG_BACKUP_COUNT";

pub const DEFAULT_LOG_MAX_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_LOG_BACKUP_COUNT: usize = 5;

/// String values inside event data are capped at this many chars.
const MAX_FIELD_CHARS: usize = 500;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditConfigError {
    #[error("environment variable '{var}' is invalid: '{value}' (accepted levels: DEBUG, INFO, WARN, WARNING, ERROR, CRITICAL)")]
    InvalidLevel { var: String, value: String },

    #[error(transparent)]
    InvalidNumber(#[from] LimitsError),

    #[error("failed to open audit log '{path}': {reason}")]
    Open { path: PathBuf, reason: String },
}

/// Validated audit settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditSettings {
    pub level: AuditLevel,
    pub max_bytes: usize,
    pub backup_count: usize,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            level: AuditLevel::Info,
            max_bytes: DEFAULT_LOG_MAX_BYTES,
            backup_count: DEFAULT_LOG_BACKUP_COUNT,
        }
    }
}

impl AuditSettings {
    /// Read all settings from the environment, failing fast on any invalid
    /// value.
    pub fn from_env() -> Result<Self, AuditConfigError> {
        Ok(Self {
            level: parse_level(std::env::var(LOG_LEVEL_ENV_VAR).ok().as_deref())?,
            max_bytes: read_positive_int_env(LOG_MAX_BYTES_ENV_VAR, DEFAULT_LOG_MAX_BYTES)?,
            backup_count: read_positive_int_env(
                LOG_BACKUP_COUNT_ENV_VAR,
                DEFAULT_LOG_BACKUP_COUNT,
            )?,
        })
    }
}

/// Parse a log level value; absent/blank means INFO.
pub fn parse_level(raw: Option<&str>) -> Result<AuditLevel, AuditConfigError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(AuditLevel::Info),
        Some(value) => AuditLevel::parse(value).ok_or_else(|| AuditConfigError::InvalidLevel {
            var: LOG_LEVEL_ENV_VAR.to_string(),
            value: value.to_string(),
        }),
    }
}

struct LogState {
    file: File,
    written: u64,
}

/// Append-only audit sink with size-based rotation.
pub struct AuditLog {
    state: Mutex<LogState>,
    settings: AuditSettings,
    path: PathBuf,
}

impl AuditLog {
    /// Open (or create) the log at `path`, hardening the parent directory
    /// and the file itself.
    pub fn open(path: impl Into<PathBuf>, settings: AuditSettings) -> Result<Self, AuditConfigError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| AuditConfigError::Open {
                    path: path.clone(),
                    reason: err.to_string(),
                })?;
                paths::harden_dir(parent);
            }
        }
        let file = open_secure(&path)?;
        let written = file.metadata().map(|meta| meta.len()).unwrap_or(0);
        Ok(Self {
            state: Mutex::new(LogState { file, written }),
            settings,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shift backups `.N-1 -> .N`, move the live file to `.1`, reopen.
    fn rotate(&self, state: &mut LogState) {
        let _ = state.file.flush();
        for index in (1..self.settings.backup_count).rev() {
            let from = backup_path(&self.path, index);
            if from.exists() {
                let _ = std::fs::rename(&from, backup_path(&self.path, index + 1));
            }
        }
        let _ = std::fs::rename(&self.path, backup_path(&self.path, 1));
        if let Ok(file) = open_secure(&self.path) {
            state.file = file;
            state.written = 0;
        }
    }
}

impl AuditLogger for AuditLog {
    fn emit(&self, level: AuditLevel, event: &str, data: Value) {
        if level < self.settings.level {
            return;
        }

        let record = json!({
            "timestamp_utc": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            "level": level.as_str(),
            "event": event,
            "data": sanitize_value(data),
        });
        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };

        let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());
        let line_len = line.len() as u64 + 1;
        if state.written > 0 && state.written + line_len > self.settings.max_bytes as u64 {
            self.rotate(&mut state);
        }
        paths::harden_file(&self.path);
        if writeln!(state.file, "{line}").is_ok() {
            state.written += line_len;
            let _ = state.file.flush();
        }
    }
}

fn open_secure(path: &Path) -> Result<File, AuditConfigError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| AuditConfigError::Open {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    paths::harden_file(path);
    Ok(file)
}

fn backup_path(base: &Path, index: usize) -> PathBuf {
    PathBuf::from(format!("{}.{index}", base.display()))
}

/// Cap every string in the payload so one oversized output cannot flood the
/// log.
fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(text) => Value::String(truncate_chars(&text)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (truncate_chars(&key), sanitize_value(item)))
                .collect(),
        ),
        other => other,
    }
}

fn truncate_chars(text: &str) -> String {
    if text.chars().count() <= MAX_FIELD_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(MAX_FIELD_CHARS).collect();
    format!("{head}...[truncated]")
}
