//! Command policy for flow steps
//!
//! The `command` string of every step is checked against a ban on shell
//! metacharacters and a binary allowlist. Tokenization uses POSIX shell
//! rules for validation only: the executor spawns the resulting argv
//! directly and never hands the string to a shell.

use thiserror::Error;

/// Binaries a flow command may invoke.
pub const ALLOWED_COMMAND_BINARIES: [&str; 5] =
    ["claude", "codex", "deepseek", "gemini", "ollama"];

/// Binaries that talk to a remote API and are exempt from the PATH
/// discoverability check.
pub const API_ONLY_COMMAND_BINARIES: [&str; 1] = ["deepseek"];

/// Reasons a command string is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandPolicyError {
    #[error("command cannot be empty")]
    Empty,

    #[error("command has invalid shell syntax")]
    Unparseable,

    #[error("command contains forbidden shell operators ({operators})")]
    ForbiddenOperators { operators: String },

    #[error("command binary must be a bare name, not a path: '{binary}'")]
    ExplicitPath { binary: String },

    #[error("command binary '{binary}' is not allowed (allowed: {allowed})")]
    BinaryNotAllowed { binary: String, allowed: String },
}

/// Whether `binary` is validated as an API-only client.
pub fn is_api_only_binary(binary: &str) -> bool {
    API_ONLY_COMMAND_BINARIES.contains(&binary)
}

/// Validate a step command, returning its argv tokens on success.
///
/// Rejects, in order of detection: forbidden shell operators anywhere in the
/// string, unparseable quoting, an empty command, a path-qualified binary,
/// and a binary outside the allowlist. PATH discoverability is a host
/// concern checked by the loader, not here.
pub fn validate_command(command: &str) -> Result<Vec<String>, CommandPolicyError> {
    if command.trim().is_empty() {
        return Err(CommandPolicyError::Empty);
    }

    let operators = find_forbidden_operators(command);
    if !operators.is_empty() {
        return Err(CommandPolicyError::ForbiddenOperators {
            operators: operators.join(", "),
        });
    }

    let tokens = shlex::split(command).ok_or(CommandPolicyError::Unparseable)?;
    let binary = match tokens.first() {
        Some(binary) => binary.as_str(),
        None => return Err(CommandPolicyError::Empty),
    };

    if binary.contains('/') || binary.contains('\\') {
        return Err(CommandPolicyError::ExplicitPath {
            binary: binary.to_string(),
        });
    }

    if !ALLOWED_COMMAND_BINARIES.contains(&binary) {
        return Err(CommandPolicyError::BinaryNotAllowed {
            binary: binary.to_string(),
            allowed: ALLOWED_COMMAND_BINARIES.join(", "),
        });
    }

    Ok(tokens)
}

/// Scan for shell operators that are banned at any position.
///
/// Every hit is reported once, using the same label an error message would
/// show. `>` is only reported when it is not part of a `>>`.
fn find_forbidden_operators(command: &str) -> Vec<&'static str> {
    let mut found: Vec<&'static str> = Vec::new();
    let mut push = |label: &'static str| {
        if !found.contains(&label) {
            found.push(label);
        }
    };

    if command.contains('\n') {
        push("\\n");
    }
    if command.contains('\r') {
        push("\\r");
    }
    if command.contains("&&") {
        push("&&");
    }
    if command.contains(';') {
        push(";");
    }
    if command.contains('|') {
        push("|");
    }
    if command.contains('`') {
        push("`");
    }
    if command.contains("${") {
        push("${");
    }
    if command.contains("$(") {
        push("$(");
    }

    let bytes = command.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'$' {
            if let Some(&next) = bytes.get(i + 1) {
                if next.is_ascii_alphabetic() || next == b'_' {
                    push("$VAR");
                }
            }
        }
        if b == b'>' {
            let prev_gt = i > 0 && bytes[i - 1] == b'>';
            let next_gt = bytes.get(i + 1) == Some(&b'>');
            if prev_gt || next_gt {
                push(">>");
            } else {
                push(">");
            }
        }
    }

    if command.contains('~') {
        push("~");
    }

    found
}
