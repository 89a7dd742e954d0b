//! Console front-end
//!
//! Renders flow events as colored terminal output and collects checkpoint
//! decisions on stdin. Stream chunks arrive from the executor's reader task;
//! printing to stdout is safe from any thread, so no marshaling is needed
//! here.

use async_trait::async_trait;
use colored::Colorize;
use council_application::ports::checkpoint::{
    CheckpointDecision, CheckpointError, CheckpointPort,
};
use council_application::ports::flow_observer::FlowObserver;
use council_domain::FlowStep;
use std::io::{BufRead, Write};

/// Line-based renderer for flow events.
pub struct ConsolePresenter {
    /// Suppress live streaming; only final panels are printed.
    quiet: bool,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self { quiet: false }
    }

    pub fn quiet() -> Self {
        Self { quiet: true }
    }

    fn rule(title: &str) -> String {
        format!("──── {title} ────")
    }
}

impl Default for ConsolePresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowObserver for ConsolePresenter {
    fn on_flow_start(&self, user_prompt: &str, total_steps: usize) {
        println!("{}", Self::rule("Request (User)").cyan().bold());
        println!("{user_prompt}");
        println!("{}", format!("{total_steps} step(s) planned").dimmed());
    }

    fn on_step_start(&self, step: &FlowStep, index: usize, total: usize) {
        println!(
            "\n{} {} ({}) via {}",
            format!("[{}/{}]", index + 1, total).bold(),
            step.agent_name.bold(),
            step.role_desc,
            step.command.dimmed(),
        );
    }

    fn on_stream(&self, _step_key: &str, chunk: &str) {
        if self.quiet {
            return;
        }
        print!("{}", chunk.dimmed());
        let _ = std::io::stdout().flush();
    }

    fn on_step_final(&self, step_key: &str, content: &str, _style: &str, is_code: bool) {
        let title = if is_code {
            format!("{step_key} (code)")
        } else {
            step_key.to_string()
        };
        println!("\n{}", Self::rule(&title).green().bold());
        println!("{content}");
    }

    fn on_step_skipped(&self, step_key: &str) {
        println!("{}", format!("Step '{step_key}' is disabled, skipping.").yellow());
    }

    fn on_flow_error(&self, message: &str) {
        eprintln!("{}", format!("Error: {message}").red().bold());
    }

    fn on_flow_success(&self) {
        println!("\n{}", "Flow completed successfully.".green().bold());
    }
}

/// What the user typed at a checkpoint prompt.
enum Choice {
    Continue,
    Adjust,
    Abort,
    Unknown,
}

fn parse_choice(raw: &str) -> Choice {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "c" | "continue" => Choice::Continue,
        "a" | "adjust" => Choice::Adjust,
        "x" | "q" | "abort" => Choice::Abort,
        _ => Choice::Unknown,
    }
}

/// Checkpoint prompt on the controlling terminal.
///
/// Accepts `c` / enter (continue), `a` (adjust, then one line of feedback)
/// and `x` / `q` (abort). EOF on stdin cancels the checkpoint.
pub struct InteractiveCheckpoint;

#[async_trait]
impl CheckpointPort for InteractiveCheckpoint {
    async fn ask_checkpoint(
        &self,
        step: &FlowStep,
        _output: &str,
    ) -> Result<CheckpointDecision, CheckpointError> {
        let step_key = step.key.clone();
        tokio::task::spawn_blocking(move || prompt_decision(&step_key))
            .await
            .map_err(|err| CheckpointError::Io(err.to_string()))?
    }
}

fn prompt_decision(step_key: &str) -> Result<CheckpointDecision, CheckpointError> {
    let stdin = std::io::stdin();
    loop {
        print!(
            "{} [c]ontinue / [a]djust / [x] abort > ",
            format!("Checkpoint '{step_key}':").bold()
        );
        let _ = std::io::stdout().flush();

        let line = read_line(&stdin)?;
        match parse_choice(&line) {
            Choice::Continue => return Ok(CheckpointDecision::Continue),
            Choice::Abort => return Ok(CheckpointDecision::Abort),
            Choice::Adjust => {
                print!("Feedback for the agent > ");
                let _ = std::io::stdout().flush();
                let feedback = read_line(&stdin)?.trim().to_string();
                return Ok(CheckpointDecision::Adjust { feedback });
            }
            Choice::Unknown => {
                println!("{}", "Unrecognized choice; type c, a or x.".yellow());
            }
        }
    }
}

fn read_line(stdin: &std::io::Stdin) -> Result<String, CheckpointError> {
    let mut line = String::new();
    let read = stdin
        .lock()
        .read_line(&mut line)
        .map_err(|err| CheckpointError::Io(err.to_string()))?;
    if read == 0 {
        return Err(CheckpointError::Cancelled);
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_parsing() {
        assert!(matches!(parse_choice(""), Choice::Continue));
        assert!(matches!(parse_choice("c"), Choice::Continue));
        assert!(matches!(parse_choice("Continue"), Choice::Continue));
        assert!(matches!(parse_choice(" a "), Choice::Adjust));
        assert!(matches!(parse_choice("adjust"), Choice::Adjust));
        assert!(matches!(parse_choice("x"), Choice::Abort));
        assert!(matches!(parse_choice("q"), Choice::Abort));
        assert!(matches!(parse_choice("abort"), Choice::Abort));
        assert!(matches!(parse_choice("nope"), Choice::Unknown));
    }

    #[test]
    fn test_presenter_callbacks_do_not_panic() {
        let presenter = ConsolePresenter::quiet();
        let step = FlowStep::new("plan", "Claude", "Planning", "claude -p", "Plan it.");
        presenter.on_flow_start("prompt", 1);
        presenter.on_step_start(&step, 0, 1);
        presenter.on_stream("plan", "chunk\n");
        presenter.on_step_final("plan", "content", "blue", false);
        presenter.on_step_skipped("plan");
        presenter.on_flow_error("boom");
        presenter.on_flow_success();
    }
}
