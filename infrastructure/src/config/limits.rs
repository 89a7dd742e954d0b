//! Global char/size limits from the environment
//!
//! A variable that is absent or blank takes its default. A variable that is
//! present but not a positive integer fails initialization; silent fallback
//! is forbidden.

use thiserror::Error;

pub const MAX_CONTEXT_CHARS_ENV_VAR: &str = "MAX_CONTEXT_CHARS";
pub const MAX_INPUT_CHARS_ENV_VAR: &str = "MAX_INPUT_CHARS";
pub const MAX_OUTPUT_CHARS_ENV_VAR: &str = "MAX_OUTPUT_CHARS";

pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 100_000;
pub const DEFAULT_MAX_INPUT_CHARS: usize = 120_000;
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 200_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("environment variable '{var}' is invalid: expected a positive integer, got '{value}'")]
pub struct LimitsError {
    pub var: String,
    pub value: String,
}

/// Process-wide caps consulted by the state, the executor and the config
/// defaults. Read once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_context_chars: usize,
    pub max_input_chars: usize,
    pub max_output_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
        }
    }
}

impl Limits {
    /// Read all three limits, failing fast on any invalid value.
    pub fn from_env() -> Result<Self, LimitsError> {
        Ok(Self {
            max_context_chars: read_positive_int_env(
                MAX_CONTEXT_CHARS_ENV_VAR,
                DEFAULT_MAX_CONTEXT_CHARS,
            )?,
            max_input_chars: read_positive_int_env(
                MAX_INPUT_CHARS_ENV_VAR,
                DEFAULT_MAX_INPUT_CHARS,
            )?,
            max_output_chars: read_positive_int_env(
                MAX_OUTPUT_CHARS_ENV_VAR,
                DEFAULT_MAX_OUTPUT_CHARS,
            )?,
        })
    }
}

/// Read a positive integer from the environment.
pub fn read_positive_int_env(var: &str, default: usize) -> Result<usize, LimitsError> {
    let raw = std::env::var(var).unwrap_or_default();
    parse_positive_int(var, &raw, default)
}

pub(crate) fn parse_positive_int(
    var: &str,
    raw: &str,
    default: usize,
) -> Result<usize, LimitsError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    match trimmed.parse::<i64>() {
        Ok(value) if value > 0 => Ok(value as usize),
        _ => Err(LimitsError {
            var: var.to_string(),
            value: trimmed.to_string(),
        }),
    }
}
