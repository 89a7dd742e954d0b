//! Run-flow use case
//!
//! The step-sequencing state machine: build the per-step template context,
//! render the input, invoke the executor, gate `is_code` output, record the
//! turn, and drive the human checkpoint. Execution is strictly serial; the
//! first failure ends the run.

use crate::ports::audit::{events, AuditLevel, AuditLogger};
use crate::ports::checkpoint::{
    AutoContinueCheckpoint, CheckpointDecision, CheckpointError, CheckpointPort,
};
use crate::ports::executor::{CliExecutor, CliRequest, ExecutionError};
use crate::ports::flow_observer::FlowObserver;
use council_domain::{
    build_follow_up_input, extract_code_block, render_template, wrap_agent_data, CouncilState,
    FlowStep, Role, TemplateError,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Terminal outcomes of a flow run.
#[derive(Error, Debug)]
pub enum RunFlowError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("step '{step}' required a fenced code block but none was found")]
    SafetyBlock { step: String },

    #[error("flow aborted at step '{step}' by checkpoint decision")]
    AbortedByUser { step: String },

    #[error("checkpoint failed at step '{step}': {source}")]
    Checkpoint {
        step: String,
        #[source]
        source: CheckpointError,
    },

    #[error("step '{step}' failed to render its input template: {source}")]
    Render {
        step: String,
        #[source]
        source: TemplateError,
    },
}

/// Input for one flow run.
#[derive(Debug, Clone)]
pub struct RunFlowInput {
    pub user_prompt: String,
    pub steps: Vec<FlowStep>,
    /// Bound for the aggregated context; per-step overrides win.
    pub max_context_chars: usize,
}

/// Result of a run in which every enabled step succeeded.
#[derive(Debug)]
pub struct RunFlowOutput {
    pub state: CouncilState,
    /// Output of each successful step, keyed by step key.
    pub step_outputs: HashMap<String, String>,
    /// Number of executions performed, adjust re-runs included.
    pub executed_steps: usize,
}

/// Drives an ordered list of [`FlowStep`]s through the executor.
pub struct RunFlowUseCase {
    executor: Arc<dyn CliExecutor>,
    audit: Arc<dyn AuditLogger>,
    observer: Arc<dyn FlowObserver>,
    checkpoint: Arc<dyn CheckpointPort>,
}

impl RunFlowUseCase {
    pub fn new(
        executor: Arc<dyn CliExecutor>,
        audit: Arc<dyn AuditLogger>,
        observer: Arc<dyn FlowObserver>,
        checkpoint: Arc<dyn CheckpointPort>,
    ) -> Self {
        Self {
            executor,
            audit,
            observer,
            checkpoint,
        }
    }

    /// Execute the flow for `user_prompt`, step by step.
    pub async fn run_flow(&self, input: RunFlowInput) -> Result<RunFlowOutput, RunFlowError> {
        let total = input.steps.len();
        let mut state = CouncilState::new(input.max_context_chars);
        let mut step_outputs: HashMap<String, String> = HashMap::new();
        let mut skipped_keys: Vec<String> = Vec::new();
        let mut last_output: Option<String> = None;
        let mut executed_steps = 0usize;

        info!("Starting flow with {total} step(s)");
        self.observer.on_flow_start(&input.user_prompt, total);
        state.add_turn("Human", Role::Human, &input.user_prompt, "Initial request");

        for (index, step) in input.steps.iter().enumerate() {
            if !step.enabled {
                debug!("Step '{}' is disabled, skipping", step.key);
                self.audit.emit(
                    AuditLevel::Info,
                    events::STEP_SKIPPED,
                    json!({ "step_key": step.key }),
                );
                self.observer.on_step_skipped(&step.key);
                skipped_keys.push(step.key.clone());
                continue;
            }

            self.observer.on_step_start(step, index, total);
            self.audit.emit(
                AuditLevel::Info,
                events::STEP_START,
                json!({
                    "step_key": step.key,
                    "agent": step.agent_name,
                    "command": step.command,
                }),
            );

            let context = build_template_context(
                &input.user_prompt,
                step,
                &state,
                &step_outputs,
                &skipped_keys,
                last_output.as_deref(),
            );
            let rendered = match render_template(&step.input_template, &context) {
                Ok(rendered) => rendered,
                Err(source) => {
                    // placeholders were validated at parse time; reaching
                    // this branch is a programming defect
                    self.step_failed(&step.key, &source.to_string());
                    return Err(RunFlowError::Render {
                        step: step.key.clone(),
                        source,
                    });
                }
            };

            let mut exec_input = rendered;
            let accepted = loop {
                let raw_output = match self.execute_step(step, &exec_input).await {
                    Ok(output) => output,
                    Err(err) => {
                        self.step_failed(&step.key, &err.to_string());
                        return Err(err.into());
                    }
                };
                executed_steps += 1;

                let output = if step.is_code {
                    match extract_code_block(&raw_output) {
                        Some(code) => code,
                        None => {
                            warn!("Step '{}' produced no fenced code block", step.key);
                            self.step_failed(&step.key, "missing fenced code block");
                            return Err(RunFlowError::SafetyBlock {
                                step: step.key.clone(),
                            });
                        }
                    }
                } else {
                    raw_output
                };

                state.add_turn(&step.agent_name, Role::Assistant, &output, &step.role_desc);
                self.observer
                    .on_step_final(&step.key, &output, &step.style, step.is_code);
                self.audit.emit(
                    AuditLevel::Info,
                    events::STEP_END,
                    json!({
                        "step_key": step.key,
                        "output_chars": output.chars().count(),
                    }),
                );

                let decision = self
                    .checkpoint
                    .ask_checkpoint(step, &output)
                    .await
                    .map_err(|source| RunFlowError::Checkpoint {
                        step: step.key.clone(),
                        source,
                    })?;
                self.audit.emit(
                    AuditLevel::Info,
                    events::CHECKPOINT_DECISION,
                    json!({
                        "step_key": step.key,
                        "decision": decision.label(),
                    }),
                );

                match decision {
                    CheckpointDecision::Continue => break output,
                    CheckpointDecision::Abort => {
                        self.observer
                            .on_flow_error(&format!("Flow aborted at step '{}'", step.key));
                        return Err(RunFlowError::AbortedByUser {
                            step: step.key.clone(),
                        });
                    }
                    CheckpointDecision::Adjust { feedback } => {
                        info!("Re-running step '{}' with user feedback", step.key);
                        exec_input = build_follow_up_input(
                            &step.key,
                            &step.instruction,
                            &output,
                            &feedback,
                        );
                    }
                }
            };

            last_output = Some(accepted.clone());
            step_outputs.insert(step.key.clone(), accepted);
        }

        info!("Flow completed: {executed_steps} execution(s)");
        self.observer.on_flow_success();
        Ok(RunFlowOutput {
            state,
            step_outputs,
            executed_steps,
        })
    }

    async fn execute_step(
        &self,
        step: &FlowStep,
        input_data: &str,
    ) -> Result<String, ExecutionError> {
        let request = CliRequest::new(&step.command, input_data)
            .with_timeout_secs(step.timeout_secs)
            .with_max_input_chars(step.max_input_chars)
            .with_max_output_chars(step.max_output_chars);

        let observer = &self.observer;
        let step_key = step.key.as_str();
        let on_output = move |chunk: &str| observer.on_stream(step_key, chunk);
        self.executor.run_cli(&request, &on_output).await
    }

    fn step_failed(&self, step_key: &str, message: &str) {
        self.audit.emit(
            AuditLevel::Error,
            events::STEP_ERROR,
            json!({ "step_key": step_key, "error": message }),
        );
        self.observer.on_flow_error(message);
    }
}

/// Assemble the substitution map for one step.
///
/// `user_prompt` and `instruction` are raw; everything that originated from
/// an agent travels inside a delimiter block. Skipped steps contribute an
/// empty block so templates referencing them still render.
fn build_template_context(
    user_prompt: &str,
    step: &FlowStep,
    state: &CouncilState,
    step_outputs: &HashMap<String, String>,
    skipped_keys: &[String],
    last_output: Option<&str>,
) -> HashMap<String, String> {
    let mut context: HashMap<String, String> = HashMap::new();
    context.insert("user_prompt".to_string(), user_prompt.to_string());
    context.insert("instruction".to_string(), step.instruction.clone());

    let full_context = match step.max_context_chars {
        Some(limit) => state.full_context_with_limit(limit),
        None => state.full_context(),
    };
    context.insert(
        "full_context".to_string(),
        wrap_agent_data("full_context", &full_context),
    );
    context.insert(
        "last_output".to_string(),
        wrap_agent_data("last_output", last_output.unwrap_or("")),
    );

    for (key, output) in step_outputs {
        context.insert(key.clone(), wrap_agent_data(key, output));
    }
    for key in skipped_keys {
        context.insert(key.clone(), wrap_agent_data(key, ""));
    }

    context
}
