//! Rate-limit classification and the backoff retry loop shared by all agent
//! variants.
//!
//! A rate-limited attempt is retried with exponential backoff, and the retry
//! prompt carries the partial output already received so the agent can pick
//! up where it stopped instead of starting over.

use std::io::Write;
use std::time::Duration;

use crate::error::AgentError;

pub const RETRY_CONTEXT_HEADER: &str = "[PREVIOUS WORK COMPLETED ON RETRY]:";
pub const RETRY_CONTEXT_FOOTER: &str = "[END PREVIOUS WORK]";

const RATE_LIMIT_SIGNALS: &[&str] = &[
    "resource has been exhausted",
    "429",
    "rate limit",
    "too many requests",
];

/// Retry schedule for rate-limited attempts: 30s, 60s, 120s by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(retry)
    }
}

pub fn is_rate_limit_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    RATE_LIMIT_SIGNALS.iter().any(|signal| lower.contains(signal))
}

/// Outcome of a single agent invocation: whatever text was produced, plus the
/// failure if the attempt did not complete cleanly.
#[derive(Debug)]
pub struct Attempt {
    pub text: String,
    pub error: Option<AgentError>,
}

impl Attempt {
    /// A failed attempt counts as rate-limited when the signal shows up in
    /// either the partial output or the error text.
    fn rate_limited(&self) -> bool {
        match &self.error {
            Some(error) => {
                is_rate_limit_text(&self.text) || is_rate_limit_text(&error.to_string())
            }
            None => false,
        }
    }
}

/// Drive `attempt` until it succeeds, fails for a non-transient reason, or
/// exhausts the backoff schedule.
///
/// `sleep` is injected so tests can observe the schedule without waiting out
/// real minutes.
pub fn run_with_retry<A, S>(
    prompt: &str,
    sink: &mut dyn Write,
    policy: BackoffPolicy,
    mut attempt: A,
    mut sleep: S,
) -> Result<String, AgentError>
where
    A: FnMut(&str, &mut dyn Write) -> Attempt,
    S: FnMut(Duration),
{
    let mut current_prompt = prompt.to_string();

    for retry in 0..=policy.max_retries {
        let outcome = attempt(&current_prompt, sink);
        let rate_limited = outcome.rate_limited();

        match outcome.error {
            None => return Ok(outcome.text),
            Some(_) if rate_limited => {
                if retry == policy.max_retries {
                    return Err(AgentError::RateLimitExhausted {
                        retries: policy.max_retries,
                    });
                }
                let delay = policy.delay_for(retry);
                let _ = writeln!(
                    sink,
                    "\n[rate limited; retrying in {}s (attempt {}/{})]\n",
                    delay.as_secs(),
                    retry + 1,
                    policy.max_retries
                );
                sleep(delay);
                current_prompt = build_retry_prompt(prompt, &outcome.text);
            }
            Some(error) => return Err(error),
        }
    }

    Err(AgentError::RateLimitExhausted {
        retries: policy.max_retries,
    })
}

/// Rewrite the prompt for a retry: the original request, the partial output
/// bracketed by sentinel markers, and an instruction to continue from there.
pub fn build_retry_prompt(original: &str, partial: &str) -> String {
    if partial.is_empty() {
        return original.to_string();
    }

    format!(
        "{original}\n\n---\n\n{RETRY_CONTEXT_HEADER}\n{partial}\n{RETRY_CONTEXT_FOOTER}\n\n\
         Review the work above. If it already completes the task, confirm that and \
         summarize it. If it is incomplete, continue from where it stopped."
    )
}
