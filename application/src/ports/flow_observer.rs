//! Flow observer port
//!
//! The streaming and rendering contract consumed by the terminal front-end.
//! Implementations live in the presentation layer (console renderer, TUI
//! panels) and can display events however they like.

use council_domain::FlowStep;

/// Receives rendering events during a flow run.
///
/// `on_stream` is invoked from the executor's reader task, so every callback
/// must be treated as callable from any thread; implementations marshal to
/// their own event loop as needed. All callbacks must be non-blocking.
pub trait FlowObserver: Send + Sync {
    /// A run is starting with `total_steps` planned steps.
    fn on_flow_start(&self, _user_prompt: &str, _total_steps: usize) {}

    /// A step is about to execute.
    fn on_step_start(&self, _step: &FlowStep, _index: usize, _total: usize) {}

    /// One stdout chunk from the step's child process, in child order.
    fn on_stream(&self, step_key: &str, chunk: &str);

    /// Final (possibly code-extracted) output of a successful step.
    fn on_step_final(&self, step_key: &str, content: &str, style: &str, is_code: bool);

    /// A disabled step was passed over without executing.
    fn on_step_skipped(&self, _step_key: &str) {}

    /// The run ended in a failure; `message` is the one-line summary.
    fn on_flow_error(&self, _message: &str) {}

    /// Every enabled step completed and passed its checkpoint.
    fn on_flow_success(&self) {}
}

/// Observer that drops every event.
pub struct NoObserver;

impl FlowObserver for NoObserver {
    fn on_stream(&self, _step_key: &str, _chunk: &str) {}
    fn on_step_final(&self, _step_key: &str, _content: &str, _style: &str, _is_code: bool) {}
}
