//! Flow validation errors

use crate::flow::command::CommandPolicyError;
use crate::prompt::template::TemplateError;
use thiserror::Error;

/// Errors raised while validating a flow definition.
///
/// All of these are caught at parse time, before any step executes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("flow must contain at least one step")]
    EmptyFlow,

    #[error("step #{position}: {reason}")]
    InvalidStep { position: usize, reason: String },

    #[error("step #{position}: command rejected: {source}")]
    CommandRejected {
        position: usize,
        #[source]
        source: CommandPolicyError,
    },

    #[error("duplicate step keys: {keys}")]
    DuplicateKeys { keys: String },

    #[error("step keys cannot use reserved names ({keys})")]
    ReservedKeys { keys: String },

    #[error("step '{step}' references unknown template variable '{name}'")]
    UnknownTemplateVariable { step: String, name: String },

    #[error("step '{step}' has an invalid input_template: {source}")]
    InvalidTemplate {
        step: String,
        #[source]
        source: TemplateError,
    },
}
