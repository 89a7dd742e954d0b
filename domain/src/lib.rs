//! Domain layer for council
//!
//! Core business rules for the multi-agent flow orchestrator: flow steps and
//! their command policy, the append-only conversation state, the input
//! template renderer, the inter-agent delimiter protocol, and fenced-code
//! output parsing. This crate performs no I/O and reads no environment.

pub mod core;
pub mod flow;
pub mod output;
pub mod prompt;
pub mod state;

// Re-export commonly used types
pub use crate::core::error::FlowError;
pub use flow::command::{
    is_api_only_binary, validate_command, CommandPolicyError, ALLOWED_COMMAND_BINARIES,
    API_ONLY_COMMAND_BINARIES,
};
pub use flow::step::{
    FlowStep, DEFAULT_INPUT_TEMPLATE, DEFAULT_STYLE, DEFAULT_TIMEOUT_SECS, RESERVED_TEMPLATE_KEYS,
};
pub use flow::validate::validate_flow_steps;
pub use output::code_block::extract_code_block;
pub use prompt::delimit::{
    build_follow_up_input, sanitize_source_label, wrap_agent_data, AGENT_DATA_END,
    AGENT_DATA_START,
};
pub use prompt::template::{extract_placeholders, render_template, TemplateError};
pub use state::{CouncilState, Role, Turn, CONTEXT_TRUNCATION_MARKER};
