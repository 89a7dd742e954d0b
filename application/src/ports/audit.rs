//! Audit log port
//!
//! Structured append-only event sink observed by every significant
//! operation. The rotating NDJSON adapter lives in the infrastructure
//! layer; this port keeps the orchestrator and the executor testable.

use serde_json::Value;

/// Severity of an audit event, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuditLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl AuditLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditLevel::Debug => "DEBUG",
            AuditLevel::Info => "INFO",
            AuditLevel::Warning => "WARNING",
            AuditLevel::Error => "ERROR",
            AuditLevel::Critical => "CRITICAL",
        }
    }

    /// Parse a level name, case-insensitive. `WARN` is accepted as an alias.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Some(AuditLevel::Debug),
            "INFO" => Some(AuditLevel::Info),
            "WARNING" | "WARN" => Some(AuditLevel::Warning),
            "ERROR" => Some(AuditLevel::Error),
            "CRITICAL" => Some(AuditLevel::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable audit event identifiers.
pub mod events {
    pub const FLOW_LOAD: &str = "flow-load";
    pub const STEP_START: &str = "step-start";
    pub const STEP_END: &str = "step-end";
    pub const STEP_ERROR: &str = "step-error";
    pub const STEP_SKIPPED: &str = "step-skipped";
    pub const COMMAND_START: &str = "command-start";
    pub const COMMAND_SUCCESS: &str = "command-success";
    pub const COMMAND_FAILURE: &str = "command-failure";
    pub const COMMAND_TIMEOUT: &str = "command-timeout";
    pub const COMMAND_ABORT: &str = "command-abort";
    pub const CHECKPOINT_DECISION: &str = "checkpoint-decision";
    pub const DOCTOR_INVOKED: &str = "doctor-invoked";
    pub const SIGNATURE_VERIFIED: &str = "signature-verified";
    pub const SIGNATURE_MISSING: &str = "signature-missing";
}

/// Shared append sink; implementations serialize writes so event lines are
/// never interleaved.
pub trait AuditLogger: Send + Sync {
    fn emit(&self, level: AuditLevel, event: &str, data: Value);
}

/// Sink that drops every event. Used in tests and by collaborators that opt
/// out of auditing.
pub struct NoAudit;

impl AuditLogger for NoAudit {
    fn emit(&self, _level: AuditLevel, _event: &str, _data: Value) {}
}
