//! Human checkpoint port
//!
//! After each successful step the orchestrator pauses and asks its
//! collaborator what to do next. The interactive implementation lives in the
//! presentation layer; non-interactive runs use [`AutoContinueCheckpoint`].

use async_trait::async_trait;
use council_domain::FlowStep;
use thiserror::Error;

/// Decision taken at the pause after a successful step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointDecision {
    /// Proceed to the next step.
    Continue,
    /// Re-run the same step with the feedback folded into its input.
    Adjust { feedback: String },
    /// Stop the flow.
    Abort,
}

impl CheckpointDecision {
    pub fn label(&self) -> &'static str {
        match self {
            CheckpointDecision::Continue => "continue",
            CheckpointDecision::Adjust { .. } => "adjust",
            CheckpointDecision::Abort => "abort",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("checkpoint input cancelled")]
    Cancelled,

    #[error("i/o error while collecting checkpoint decision: {0}")]
    Io(String),
}

/// Collects the human decision after each step. Unlike every other
/// collaborator callback, this one may block.
#[async_trait]
pub trait CheckpointPort: Send + Sync {
    async fn ask_checkpoint(
        &self,
        step: &FlowStep,
        output: &str,
    ) -> Result<CheckpointDecision, CheckpointError>;
}

/// Non-interactive checkpoint: always continues. Used by `council run`.
pub struct AutoContinueCheckpoint;

#[async_trait]
impl CheckpointPort for AutoContinueCheckpoint {
    async fn ask_checkpoint(
        &self,
        _step: &FlowStep,
        _output: &str,
    ) -> Result<CheckpointDecision, CheckpointError> {
        Ok(CheckpointDecision::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_auto_continue_always_continues() {
        let checkpoint = AutoContinueCheckpoint;
        let step = FlowStep::new("plan", "Claude", "Planning", "claude -p", "Plan it.");
        let decision = checkpoint.ask_checkpoint(&step, "output").await.unwrap();
        assert_eq!(decision, CheckpointDecision::Continue);
    }

    #[test]
    fn test_decision_labels() {
        assert_eq!(CheckpointDecision::Continue.label(), "continue");
        assert_eq!(
            CheckpointDecision::Adjust {
                feedback: "x".into()
            }
            .label(),
            "adjust"
        );
        assert_eq!(CheckpointDecision::Abort.label(), "abort");
    }
}
