//! Infrastructure layer for council
//!
//! Adapters implementing the application-layer ports: the subprocess
//! executor, the rotating NDJSON audit log, Ed25519 flow signatures and the
//! trust store, the flow config loader, and host-facing helpers (paths,
//! limits, binary prerequisites).

pub mod audit;
pub mod config;
pub mod executor;
pub mod paths;
pub mod prerequisites;
pub mod signature;

// Re-export commonly used types
pub use audit::{AuditConfigError, AuditLog, AuditSettings};
pub use config::default_flow::default_flow_steps;
pub use config::limits::{Limits, LimitsError};
pub use config::loader::{
    load_flow_steps, ConfigError, FlowLocator, FlowSource, LoadOptions, ResolvedFlowConfig,
};
pub use executor::{ProcessExecutor, ARGV_INPUT_END, ARGV_INPUT_START};
pub use prerequisites::{evaluate_flow_prerequisites, BinaryStatus};
pub use signature::{SignatureError, SignatureSidecar, VerifyOutcome};
