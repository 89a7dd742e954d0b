//! Subprocess executor for LLM CLIs
//!
//! Spawns the step command directly (argv, never a shell), streams stdout
//! line by line to the caller's callback, enforces the timeout, honors the
//! shared cancellation flag, and spools output to an owner-only temp file
//! once the in-memory cap is crossed. The child process belongs exclusively
//! to one `run_cli` call and is reaped on every exit path; `kill_on_drop`
//! covers the panic path.
//!
//! Input delivery picks one of two channels: argv (a `{input}` placeholder,
//! or a `gemini -p`/`gemini --prompt` with the positional value missing) or
//! the child's stdin. Argv payloads are framed with literal markers so the
//! child can tell data from instruction.

use crate::config::limits::Limits;
use async_trait::async_trait;
use council_application::ports::audit::{events, AuditLevel, AuditLogger};
use council_application::ports::executor::{
    CliExecutor, CliRequest, ExecutionError, OutputCallback,
};
use serde_json::json;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Opens the payload block when input travels through argv. Stable public
/// contract.
pub const ARGV_INPUT_START: &str = "===COUNCIL_INPUT_ARGV_START===";

/// Closes the argv payload block.
pub const ARGV_INPUT_END: &str = "===COUNCIL_INPUT_ARGV_END===";

/// Literal token replaced by the framed payload.
pub const ARGV_INPUT_PLACEHOLDER: &str = "{input}";

/// Wait this long after the polite termination signal before the hard kill.
const TERMINATION_GRACE: Duration = Duration::from_millis(1500);

/// How long to keep draining pipe leftovers after the child was told to
/// stop.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Chars of stderr retained for failure reports.
const STDERR_TAIL_CHARS: usize = 2000;

/// [`CliExecutor`] adapter backed by `tokio::process`.
pub struct ProcessExecutor {
    audit: Arc<dyn AuditLogger>,
    limits: Limits,
    cancel: Mutex<CancellationToken>,
}

impl ProcessExecutor {
    pub fn new(audit: Arc<dyn AuditLogger>, limits: Limits) -> Self {
        Self {
            audit,
            limits,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Install and return a fresh token, so a cancel raised before this run
    /// cannot poison it.
    fn fresh_cancel_token(&self) -> CancellationToken {
        let mut guard = self.cancel.lock().unwrap_or_else(|err| err.into_inner());
        *guard = CancellationToken::new();
        guard.clone()
    }
}

#[async_trait]
impl CliExecutor for ProcessExecutor {
    async fn run_cli(
        &self,
        request: &CliRequest,
        on_output: OutputCallback<'_>,
    ) -> Result<String, ExecutionError> {
        let cancel = self.fresh_cancel_token();

        if request.timeout_secs == 0 {
            return Err(ExecutionError::InvalidRequest(
                "timeout must be positive".to_string(),
            ));
        }
        if request.max_input_chars == Some(0) {
            return Err(ExecutionError::InvalidRequest(
                "max_input_chars must be positive".to_string(),
            ));
        }
        if request.max_output_chars == Some(0) {
            return Err(ExecutionError::InvalidRequest(
                "max_output_chars must be positive".to_string(),
            ));
        }

        let max_input = request.max_input_chars.unwrap_or(self.limits.max_input_chars);
        let max_output = request
            .max_output_chars
            .unwrap_or(self.limits.max_output_chars);

        let input_chars = request.input_data.chars().count();
        if input_chars > max_input {
            return Err(ExecutionError::InputTooLarge {
                actual: input_chars,
                limit: max_input,
            });
        }

        let prepared = prepare_command(&request.command, &request.input_data)?;
        let channel = if prepared.stdin_payload.is_some() {
            "stdin"
        } else {
            "argv"
        };
        self.audit.emit(
            AuditLevel::Info,
            events::COMMAND_START,
            json!({
                "command": request.command,
                "channel": channel,
                "input_chars": input_chars,
                "timeout_secs": request.timeout_secs,
            }),
        );

        let binary = prepared.argv[0].clone();
        debug!("Spawning '{binary}' ({channel} channel)");
        let mut child = Command::new(&binary)
            .args(&prepared.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                self.audit.emit(
                    AuditLevel::Error,
                    events::COMMAND_FAILURE,
                    json!({ "command": request.command, "error": err.to_string() }),
                );
                ExecutionError::SpawnFailed {
                    binary: binary.clone(),
                    reason: err.to_string(),
                }
            })?;

        // stdin: write the payload, or close at once on the argv channel so
        // the child never blocks waiting for input
        if let Some(mut stdin) = child.stdin.take() {
            let payload = prepared.stdin_payload.clone().unwrap_or_default();
            tokio::spawn(async move {
                if !payload.is_empty() {
                    let _ = stdin.write_all(payload.as_bytes()).await;
                }
                let _ = stdin.shutdown().await;
            });
        }

        // stderr drains in parallel so a full pipe can never deadlock the
        // child
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut tail = String::new();
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {
                            tail.push_str(&line);
                            let excess = tail.chars().count().saturating_sub(STDERR_TAIL_CHARS);
                            if excess > 0 {
                                tail = tail.chars().skip(excess).collect();
                            }
                        }
                    }
                }
                tail
            })
        });

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::Io("missing stdout pipe".to_string()))?;
        let mut reader = BufReader::new(stdout);
        let mut spool = OutputSpool::new(max_output);
        let deadline = Instant::now() + Duration::from_secs(request.timeout_secs);
        let mut line = String::new();

        loop {
            line.clear();
            tokio::select! {
                _ = cancel.cancelled() => {
                    terminate_child(&mut child).await;
                    drain_remaining(&mut reader, &mut spool).await;
                    self.audit.emit(
                        AuditLevel::Warning,
                        events::COMMAND_ABORT,
                        json!({ "command": request.command }),
                    );
                    return Err(ExecutionError::Aborted);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    terminate_child(&mut child).await;
                    drain_remaining(&mut reader, &mut spool).await;
                    self.audit.emit(
                        AuditLevel::Error,
                        events::COMMAND_TIMEOUT,
                        json!({
                            "command": request.command,
                            "timeout_secs": request.timeout_secs,
                        }),
                    );
                    return Err(ExecutionError::Timeout {
                        timeout_secs: request.timeout_secs,
                    });
                }
                read = reader.read_line(&mut line) => match read {
                    Ok(0) => break,
                    Ok(_) => {
                        on_output(&line);
                        spool
                            .push(&line)
                            .map_err(|err| ExecutionError::Io(err.to_string()))?;
                    }
                    Err(err) => {
                        terminate_child(&mut child).await;
                        return Err(ExecutionError::Io(err.to_string()));
                    }
                }
            }
        }

        // stdout hit EOF; the child still has to exit within the timeout
        let status = tokio::select! {
            _ = cancel.cancelled() => {
                terminate_child(&mut child).await;
                self.audit.emit(
                    AuditLevel::Warning,
                    events::COMMAND_ABORT,
                    json!({ "command": request.command }),
                );
                return Err(ExecutionError::Aborted);
            }
            _ = tokio::time::sleep_until(deadline) => {
                terminate_child(&mut child).await;
                self.audit.emit(
                    AuditLevel::Error,
                    events::COMMAND_TIMEOUT,
                    json!({
                        "command": request.command,
                        "timeout_secs": request.timeout_secs,
                    }),
                );
                return Err(ExecutionError::Timeout {
                    timeout_secs: request.timeout_secs,
                });
            }
            status = child.wait() => {
                status.map_err(|err| ExecutionError::Io(err.to_string()))?
            }
        };

        let stderr_tail = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            let exit_code = status.code().unwrap_or(-1);
            self.audit.emit(
                AuditLevel::Error,
                events::COMMAND_FAILURE,
                json!({
                    "command": request.command,
                    "exit_code": exit_code,
                    "stderr_tail": stderr_tail,
                }),
            );
            return Err(ExecutionError::CommandFailed {
                exit_code,
                stderr_tail: stderr_tail.trim().to_string(),
            });
        }

        let spilled = spool.spilled();
        let output = spool
            .into_string()
            .map_err(|err| ExecutionError::Io(err.to_string()))?;
        let output = output.trim().to_string();
        self.audit.emit(
            AuditLevel::Info,
            events::COMMAND_SUCCESS,
            json!({
                "command": request.command,
                "output_chars": output.chars().count(),
                "spooled": spilled,
            }),
        );
        Ok(output)
    }

    fn request_cancel(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .cancel();
    }
}

/// The prepared argv plus the stdin payload; `None` payload means the input
/// travels through argv and stdin closes with no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PreparedCommand {
    pub argv: Vec<String>,
    pub stdin_payload: Option<String>,
}

/// Tokenize `command` and pick the input delivery channel.
pub(crate) fn prepare_command(
    command: &str,
    input_data: &str,
) -> Result<PreparedCommand, ExecutionError> {
    let tokens = shlex::split(command).ok_or_else(|| {
        ExecutionError::InvalidRequest(format!("command has invalid shell syntax: '{command}'"))
    })?;
    if tokens.is_empty() {
        return Err(ExecutionError::InvalidRequest(
            "command cannot be empty".to_string(),
        ));
    }

    if tokens
        .iter()
        .any(|token| token.contains(ARGV_INPUT_PLACEHOLDER))
    {
        let payload = wrap_argv_payload(input_data);
        let argv = tokens
            .into_iter()
            .map(|token| {
                if token.contains(ARGV_INPUT_PLACEHOLDER) {
                    token.replace(ARGV_INPUT_PLACEHOLDER, &payload)
                } else {
                    token
                }
            })
            .collect();
        return Ok(PreparedCommand {
            argv,
            stdin_payload: None,
        });
    }

    if is_prompt_flag_missing_value(&tokens) {
        let mut argv = tokens;
        argv.push(wrap_argv_payload(input_data));
        return Ok(PreparedCommand {
            argv,
            stdin_payload: None,
        });
    }

    Ok(PreparedCommand {
        argv: tokens,
        stdin_payload: Some(input_data.to_string()),
    })
}

/// Frame an argv payload with the public markers. A blank payload stays an
/// empty argument with no markers.
fn wrap_argv_payload(input_data: &str) -> String {
    if input_data.trim().is_empty() {
        return String::new();
    }
    format!("{ARGV_INPUT_START}\n{input_data}\n{ARGV_INPUT_END}")
}

/// `gemini -p` / `gemini --prompt` with the prompt value missing. The
/// payload must become the final argument or gemini would read the next
/// (absent) token as the prompt. Matches by basename so a path-qualified
/// binary behaves the same.
fn is_prompt_flag_missing_value(tokens: &[String]) -> bool {
    if tokens.len() != 2 {
        return false;
    }
    let binary = Path::new(&tokens[0])
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("");
    binary == "gemini" && matches!(tokens[1].as_str(), "-p" | "--prompt")
}

/// Accumulates stdout chunks in memory, transparently spilling everything to
/// an owner-only anonymous temp file once the char cap is crossed.
struct OutputSpool {
    max_in_memory_chars: usize,
    buffer: String,
    buffered_chars: usize,
    spill: Option<std::fs::File>,
}

impl OutputSpool {
    fn new(max_in_memory_chars: usize) -> Self {
        Self {
            max_in_memory_chars,
            buffer: String::new(),
            buffered_chars: 0,
            spill: None,
        }
    }

    fn push(&mut self, chunk: &str) -> std::io::Result<()> {
        if let Some(file) = self.spill.as_mut() {
            return file.write_all(chunk.as_bytes());
        }

        let chunk_chars = chunk.chars().count();
        if self.buffered_chars + chunk_chars > self.max_in_memory_chars {
            let mut file = tempfile::tempfile()?;
            file.write_all(self.buffer.as_bytes())?;
            file.write_all(chunk.as_bytes())?;
            self.buffer.clear();
            self.buffered_chars = 0;
            self.spill = Some(file);
            return Ok(());
        }

        self.buffer.push_str(chunk);
        self.buffered_chars += chunk_chars;
        Ok(())
    }

    fn spilled(&self) -> bool {
        self.spill.is_some()
    }

    fn into_string(self) -> std::io::Result<String> {
        match self.spill {
            None => Ok(self.buffer),
            Some(mut file) => {
                file.flush()?;
                file.seek(SeekFrom::Start(0))?;
                let mut output = String::new();
                file.read_to_string(&mut output)?;
                Ok(output)
            }
        }
    }
}

/// Polite termination first, hard kill after the grace period. Reaps on
/// every path.
async fn terminate_child(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
            if tokio::time::timeout(TERMINATION_GRACE, child.wait())
                .await
                .is_ok()
            {
                return;
            }
        }
    }
    if let Err(err) = child.kill().await {
        warn!("Failed to kill child process: {err}");
    }
}

/// After a kill, collect whatever the pipe still holds so the child can
/// flush and exit. Nothing here reaches the streaming callback; the run has
/// already failed.
async fn drain_remaining(reader: &mut BufReader<ChildStdout>, spool: &mut OutputSpool) {
    let mut line = String::new();
    loop {
        line.clear();
        match tokio::time::timeout(DRAIN_TIMEOUT, reader.read_line(&mut line)).await {
            Ok(Ok(read)) if read > 0 => {
                let _ = spool.push(&line);
            }
            _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_application::ports::audit::NoAudit;

    struct ChunkSink {
        chunks: Mutex<Vec<String>>,
    }

    impl ChunkSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                chunks: Mutex::new(Vec::new()),
            })
        }

        fn all(&self) -> Vec<String> {
            self.chunks.lock().unwrap().clone()
        }

        fn concatenated(&self) -> String {
            self.all().concat()
        }
    }

    fn executor() -> ProcessExecutor {
        ProcessExecutor::new(Arc::new(NoAudit), Limits::default())
    }

    fn sink_callback(sink: &Arc<ChunkSink>) -> impl Fn(&str) + Send + Sync + '_ {
        move |chunk: &str| sink.chunks.lock().unwrap().push(chunk.to_string())
    }

    // ==================== channel selection ====================

    #[test]
    fn test_placeholder_token_becomes_framed_argv_payload() {
        let prepared = prepare_command("gemini -p {input}", "abc").unwrap();
        assert_eq!(
            prepared.argv,
            vec![
                "gemini".to_string(),
                "-p".to_string(),
                format!("{ARGV_INPUT_START}\nabc\n{ARGV_INPUT_END}"),
            ]
        );
        assert_eq!(prepared.stdin_payload, None);
    }

    #[test]
    fn test_placeholder_with_quoted_payload_stays_single_argument() {
        let prepared = prepare_command("gemini -p {input}", "a 'quoted' prompt").unwrap();
        assert_eq!(prepared.argv.len(), 3);
        assert!(prepared.argv[2].contains("a 'quoted' prompt"));
        assert_eq!(prepared.stdin_payload, None);
    }

    #[test]
    fn test_blank_payload_becomes_empty_argument_without_markers() {
        let prepared = prepare_command("gemini -p {input}", "   ").unwrap();
        assert_eq!(prepared.argv, vec!["gemini", "-p", ""]);
        assert_eq!(prepared.stdin_payload, None);
    }

    #[test]
    fn test_gemini_prompt_missing_value_appends_payload() {
        for command in ["gemini -p", "gemini --prompt", "/usr/local/bin/gemini -p"] {
            let prepared = prepare_command(command, "hello world").unwrap();
            assert_eq!(
                prepared.argv.last().unwrap(),
                &format!("{ARGV_INPUT_START}\nhello world\n{ARGV_INPUT_END}")
            );
            assert_eq!(prepared.stdin_payload, None);
        }
    }

    #[test]
    fn test_gemini_with_value_and_other_tools_use_stdin() {
        for command in [
            "claude -p",
            "gemini -p texto",
            "gemini --prompt=texto",
            "gemini",
            "codex exec --skip-git-repo-check",
        ] {
            let prepared = prepare_command(command, "hello").unwrap();
            assert_eq!(
                prepared.stdin_payload.as_deref(),
                Some("hello"),
                "command {command:?} should use stdin"
            );
        }
    }

    #[test]
    fn test_unparseable_command_is_rejected() {
        assert!(matches!(
            prepare_command("tool 'unterminated", "x"),
            Err(ExecutionError::InvalidRequest(_))
        ));
        assert!(matches!(
            prepare_command("", "x"),
            Err(ExecutionError::InvalidRequest(_))
        ));
    }

    // ==================== process lifecycle ====================

    #[tokio::test]
    async fn test_streams_lines_and_returns_trimmed_output() {
        let sink = ChunkSink::new();
        let callback = sink_callback(&sink);
        let request = CliRequest::new("printf 'line 1\\nline 2\\n'", "");
        let output = executor().run_cli(&request, &callback).await.unwrap();

        assert_eq!(output, "line 1\nline 2");
        assert_eq!(sink.all(), vec!["line 1\n", "line 2\n"]);
        // chunk concatenation equals the return value modulo final trim
        assert_eq!(sink.concatenated().trim(), output);
    }

    #[tokio::test]
    async fn test_stdin_payload_reaches_child() {
        let sink = ChunkSink::new();
        let callback = sink_callback(&sink);
        let request = CliRequest::new("cat", "payload via stdin");
        let output = executor().run_cli(&request, &callback).await.unwrap();
        assert_eq!(output, "payload via stdin");
    }

    #[tokio::test]
    async fn test_non_zero_exit_reports_code_and_stderr_tail() {
        let callback = |_: &str| {};
        let request = CliRequest::new("sh -c 'printf boom >&2; exit 3'", "");
        let err = executor().run_cli(&request, &callback).await.unwrap_err();
        match err {
            ExecutionError::CommandFailed {
                exit_code,
                stderr_tail,
            } => {
                assert_eq!(exit_code, 3);
                assert!(stderr_tail.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let callback = |_: &str| {};
        let request = CliRequest::new("sleep 5", "").with_timeout_secs(1);
        let started = std::time::Instant::now();
        let err = executor().run_cli(&request, &callback).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout { timeout_secs: 1 }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancel_before_run_does_not_poison_next_run() {
        let exec = executor();
        exec.request_cancel();
        let callback = |_: &str| {};
        let request = CliRequest::new("printf ok", "");
        let output = exec.run_cli(&request, &callback).await.unwrap();
        assert_eq!(output, "ok");
    }

    #[tokio::test]
    async fn test_cancel_during_run_aborts() {
        let exec = Arc::new(executor());
        let runner = Arc::clone(&exec);
        let task = tokio::spawn(async move {
            let callback = |_: &str| {};
            let request = CliRequest::new("sleep 5", "").with_timeout_secs(30);
            runner.run_cli(&request, &callback).await
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        exec.request_cancel();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ExecutionError::Aborted)));
    }

    #[tokio::test]
    async fn test_oversized_input_fails_before_spawn() {
        let callback = |_: &str| {};
        // a spawn attempt would surface as SpawnFailed for this binary
        let request =
            CliRequest::new("definitely-not-a-binary", "12345").with_max_input_chars(Some(4));
        let err = executor().run_cli(&request, &callback).await.unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::InputTooLarge {
                actual: 5,
                limit: 4
            }
        ));
    }

    #[tokio::test]
    async fn test_output_past_cap_spools_transparently() {
        let sink = ChunkSink::new();
        let callback = sink_callback(&sink);
        let request = CliRequest::new("printf 'aaaaaaaaaa\\nbbbbbbbbbb\\ncccccccccc\\n'", "")
            .with_max_output_chars(Some(12));
        let output = executor().run_cli(&request, &callback).await.unwrap();

        // nothing lost, nothing truncated
        assert_eq!(output, "aaaaaaaaaa\nbbbbbbbbbb\ncccccccccc");
        assert_eq!(sink.concatenated().trim(), output);
    }

    #[tokio::test]
    async fn test_invalid_request_values_are_rejected() {
        let callback = |_: &str| {};
        let exec = executor();

        let zero_timeout = CliRequest::new("printf ok", "").with_timeout_secs(0);
        assert!(matches!(
            exec.run_cli(&zero_timeout, &callback).await,
            Err(ExecutionError::InvalidRequest(_))
        ));

        let zero_input = CliRequest::new("printf ok", "").with_max_input_chars(Some(0));
        assert!(matches!(
            exec.run_cli(&zero_input, &callback).await,
            Err(ExecutionError::InvalidRequest(_))
        ));

        let zero_output = CliRequest::new("printf ok", "").with_max_output_chars(Some(0));
        assert!(matches!(
            exec.run_cli(&zero_output, &callback).await,
            Err(ExecutionError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_failure() {
        let callback = |_: &str| {};
        let request = CliRequest::new("definitely-not-a-binary-xyz", "");
        let err = executor().run_cli(&request, &callback).await.unwrap_err();
        assert!(matches!(err, ExecutionError::SpawnFailed { .. }));
    }

    // ==================== spool unit tests ====================

    #[test]
    fn test_spool_stays_in_memory_below_cap() {
        let mut spool = OutputSpool::new(100);
        spool.push("hello\n").unwrap();
        assert!(!spool.spilled());
        assert_eq!(spool.into_string().unwrap(), "hello\n");
    }

    #[test]
    fn test_spool_spills_and_preserves_content() {
        let mut spool = OutputSpool::new(8);
        spool.push("12345\n").unwrap();
        spool.push("67890\n").unwrap();
        spool.push("abcde\n").unwrap();
        assert!(spool.spilled());
        assert_eq!(spool.into_string().unwrap(), "12345\n67890\nabcde\n");
    }
}
