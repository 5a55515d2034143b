//! Subprocess agent variants: external CLIs whose stdout is streamed to the
//! response sink while a copy is accumulated for the caller.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use crate::client::AgentClient;
use crate::error::AgentError;
use crate::retry::{run_with_retry, Attempt, BackoffPolicy};

const STREAM_BUF_LEN: usize = 4096;
const RENDERED_COMMAND_MAX: usize = 120;

/// Gemini CLI variant. The prompt is passed as the final argument and the
/// process runs inside the task's worktree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiClient {
    pub executable: String,
    pub extra_args: Vec<String>,
    pub backoff: BackoffPolicy,
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self {
            executable: "gemini".to_string(),
            extra_args: vec!["--yolo".to_string()],
            backoff: BackoffPolicy::default(),
        }
    }
}

impl GeminiClient {
    pub fn new(executable: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            executable: executable.into(),
            extra_args,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl AgentClient for GeminiClient {
    fn send_prompt_in_dir(
        &self,
        prompt: &str,
        sink: &mut dyn Write,
        work_dir: Option<&Path>,
    ) -> Result<String, AgentError> {
        run_with_retry(
            prompt,
            sink,
            self.backoff,
            |attempt_prompt, attempt_sink| {
                let mut cmd = Command::new(&self.executable);
                cmd.args(&self.extra_args);
                cmd.arg(attempt_prompt);
                if let Some(dir) = work_dir {
                    cmd.current_dir(dir);
                }
                stream_to_sink(cmd, attempt_sink)
            },
            thread::sleep,
        )
    }
}

/// Copilot CLI variant with an ordered model fallback chain.
///
/// A non-rate-limit failure moves on to the next model; a rate-limit failure
/// goes through the backoff retry and never falls back, since every model
/// shares the same quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopilotClient {
    pub executable: String,
    pub models: Vec<String>,
    pub backoff: BackoffPolicy,
}

impl Default for CopilotClient {
    fn default() -> Self {
        Self::with_model("gpt-5")
    }
}

impl CopilotClient {
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            executable: "copilot".to_string(),
            models: vec![model.into()],
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_fallback_chain(models: Vec<String>) -> Self {
        Self {
            executable: "copilot".to_string(),
            models,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl AgentClient for CopilotClient {
    fn send_prompt_in_dir(
        &self,
        prompt: &str,
        sink: &mut dyn Write,
        work_dir: Option<&Path>,
    ) -> Result<String, AgentError> {
        let mut last_error = None;

        for model in &self.models {
            let result = run_with_retry(
                prompt,
                sink,
                self.backoff,
                |attempt_prompt, attempt_sink| {
                    let mut cmd = Command::new(&self.executable);
                    cmd.args(["--model", model, "-p"]);
                    cmd.arg(attempt_prompt);
                    cmd.arg("--allow-all-tools");
                    if let Some(dir) = work_dir {
                        cmd.current_dir(dir);
                    }
                    stream_to_sink(cmd, attempt_sink)
                },
                thread::sleep,
            );

            match result {
                Ok(text) => return Ok(text),
                Err(err @ AgentError::RateLimitExhausted { .. }) => return Err(err),
                Err(err) => last_error = Some(err),
            }
        }

        Err(last_error.unwrap_or(AgentError::NoModelConfigured))
    }
}

/// Run a prepared command, forwarding stdout to the sink chunk by chunk.
/// Stderr is drained on its own thread so a chatty agent cannot wedge the
/// pipe, and is attached to the failure on non-zero exit.
pub(crate) fn stream_to_sink(mut cmd: Command, sink: &mut dyn Write) -> Attempt {
    let rendered = render_command(&cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(source) => {
            return Attempt {
                text: String::new(),
                error: Some(AgentError::Spawn {
                    command: rendered,
                    source,
                }),
            }
        }
    };

    let stderr_handle = child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        })
    });

    let mut raw = Vec::new();
    let mut error = None;
    if let Some(mut stdout) = child.stdout.take() {
        let mut buf = [0u8; STREAM_BUF_LEN];
        loop {
            match stdout.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if let Err(source) = sink.write_all(&buf[..n]) {
                        error = Some(AgentError::Sink { source });
                        break;
                    }
                    raw.extend_from_slice(&buf[..n]);
                }
                Err(source) => {
                    error = Some(AgentError::Read { source });
                    break;
                }
            }
        }
    }

    let status = child.wait();
    let stderr = stderr_handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    if error.is_none() {
        match status {
            Ok(st) if st.success() => {}
            Ok(st) => {
                error = Some(AgentError::CommandFailed {
                    command: rendered,
                    status: st.code(),
                    stderr,
                });
            }
            Err(source) => error = Some(AgentError::Read { source }),
        }
    }

    Attempt {
        text: String::from_utf8_lossy(&raw).into_owned(),
        error,
    }
}

/// Human-readable command line for error messages, truncated so a multi-page
/// prompt argument does not drown the report.
fn render_command(cmd: &Command) -> String {
    let mut rendered = cmd.get_program().to_string_lossy().into_owned();
    for arg in cmd.get_args() {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
        if rendered.len() > RENDERED_COMMAND_MAX {
            rendered.truncate(RENDERED_COMMAND_MAX);
            rendered.push_str("...");
            break;
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_to_sink_forwards_stdout_and_accumulates_it() {
        let mut cmd = Command::new("echo");
        cmd.arg("created hello.txt");

        let mut sink = Vec::new();
        let attempt = stream_to_sink(cmd, &mut sink);

        assert!(attempt.error.is_none());
        assert_eq!(attempt.text, "created hello.txt\n");
        assert_eq!(String::from_utf8(sink).unwrap(), "created hello.txt\n");
    }

    #[test]
    fn stream_to_sink_classifies_non_zero_exit() {
        let cmd = Command::new("false");

        let mut sink = Vec::new();
        let attempt = stream_to_sink(cmd, &mut sink);

        assert!(matches!(
            attempt.error,
            Some(AgentError::CommandFailed { status: Some(1), .. })
        ));
    }

    #[test]
    fn stream_to_sink_classifies_missing_binary_as_spawn() {
        let cmd = Command::new("/no/such/agent-binary");

        let mut sink = Vec::new();
        let attempt = stream_to_sink(cmd, &mut sink);

        assert!(matches!(attempt.error, Some(AgentError::Spawn { .. })));
        assert!(attempt.text.is_empty());
    }

    #[test]
    fn gemini_client_streams_through_the_capability() {
        // `echo` stands in for the agent binary; the prompt comes back as
        // the streamed output.
        let client = GeminiClient::new("echo", Vec::new());
        let mut sink = Vec::new();

        let text = client
            .send_prompt("hello from the agent", &mut sink)
            .expect("echo succeeds");

        assert_eq!(text, "hello from the agent\n");
        assert_eq!(
            String::from_utf8(sink).unwrap(),
            "hello from the agent\n"
        );
    }

    #[test]
    fn copilot_client_without_models_reports_misconfiguration() {
        let client = CopilotClient::with_fallback_chain(Vec::new());
        let mut sink = Vec::new();

        let err = client
            .send_prompt("anything", &mut sink)
            .expect_err("empty chain");
        assert!(matches!(err, AgentError::NoModelConfigured));
    }

    #[test]
    fn rendered_command_is_truncated_for_long_prompts() {
        let mut cmd = Command::new("gemini");
        cmd.arg("x".repeat(500));
        let rendered = render_command(&cmd);
        assert!(rendered.len() <= RENDERED_COMMAND_MAX + 3);
        assert!(rendered.ends_with("..."));
    }
}
