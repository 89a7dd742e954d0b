//! CLI executor port
//!
//! Defines how the orchestrator launches external LLM CLIs. The adapter in
//! the infrastructure layer owns the child process exclusively for the
//! duration of one `run_cli` call and must reap it on every exit path.

use async_trait::async_trait;
use council_domain::DEFAULT_TIMEOUT_SECS;
use thiserror::Error;

/// Terminal outcomes of a CLI execution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("input is {actual} chars, above the configured limit of {limit}")]
    InputTooLarge { actual: usize, limit: usize },

    #[error("command timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("execution aborted by cancellation request")]
    Aborted,

    #[error("command exited with status {exit_code}: {stderr_tail}")]
    CommandFailed { exit_code: i32, stderr_tail: String },

    #[error("failed to spawn '{binary}': {reason}")]
    SpawnFailed { binary: String, reason: String },

    #[error("invalid execution request: {0}")]
    InvalidRequest(String),

    #[error("i/o failure while driving the child process: {0}")]
    Io(String),
}

/// One CLI invocation: the command string, the payload, and per-call limit
/// overrides (`None` inherits the executor's process-wide limits).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliRequest {
    pub command: String,
    pub input_data: String,
    pub timeout_secs: u64,
    pub max_input_chars: Option<usize>,
    pub max_output_chars: Option<usize>,
}

impl CliRequest {
    pub fn new(command: impl Into<String>, input_data: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            input_data: input_data.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_input_chars: None,
            max_output_chars: None,
        }
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_max_input_chars(mut self, chars: Option<usize>) -> Self {
        self.max_input_chars = chars;
        self
    }

    pub fn with_max_output_chars(mut self, chars: Option<usize>) -> Self {
        self.max_output_chars = chars;
        self
    }
}

/// Callback receiving stdout chunks in child order, newline included.
///
/// Invoked from the executor's reader task; implementations must be callable
/// from any thread and must not block.
pub type OutputCallback<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Launches one external CLI per call, streaming its stdout.
#[async_trait]
pub trait CliExecutor: Send + Sync {
    /// Run one CLI command to completion.
    ///
    /// The concatenation of all chunks passed to `on_output` equals the
    /// returned string, modulo trailing-whitespace trimming and transparent
    /// spooling of oversized output.
    async fn run_cli(
        &self,
        request: &CliRequest,
        on_output: OutputCallback<'_>,
    ) -> Result<String, ExecutionError>;

    /// Request cancellation of the in-flight run, if any.
    ///
    /// The flag is cleared at the start of the next `run_cli`, so a stale
    /// request never poisons a later run.
    fn request_cancel(&self);
}
