use std::io::Write;
use std::path::Path;

use crate::error::AgentError;

/// Uniform capability over all agent variants.
///
/// Implementations block until the agent is done, stream every output byte to
/// `sink` as it arrives, and return the accumulated text. `work_dir` is the
/// task's worktree; subprocess variants run there so the agent's file
/// operations stay inside the sandbox, remote variants render it into the
/// prompt instead. Nothing subprocess-specific leaks through this trait.
pub trait AgentClient: Send + Sync {
    fn send_prompt(&self, prompt: &str, sink: &mut dyn Write) -> Result<String, AgentError> {
        self.send_prompt_in_dir(prompt, sink, None)
    }

    fn send_prompt_in_dir(
        &self,
        prompt: &str,
        sink: &mut dyn Write,
        work_dir: Option<&Path>,
    ) -> Result<String, AgentError>;
}
