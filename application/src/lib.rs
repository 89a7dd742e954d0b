//! Application layer for council
//!
//! This crate contains the run-flow use case and the port definitions its
//! collaborators implement. It depends only on the domain layer.

pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use ports::audit::{AuditLevel, AuditLogger, NoAudit};
pub use ports::checkpoint::{
    AutoContinueCheckpoint, CheckpointDecision, CheckpointError, CheckpointPort,
};
pub use ports::executor::{CliExecutor, CliRequest, ExecutionError, OutputCallback};
pub use ports::flow_observer::{FlowObserver, NoObserver};
pub use use_cases::run_flow::{RunFlowError, RunFlowInput, RunFlowOutput, RunFlowUseCase};
