//! Agent clients for the drover orchestrator.
//!
//! Every variant implements the same capability: given a prompt, a byte sink,
//! and an optional working directory, run the external agent to completion,
//! forward its output byte for byte, and hand back the accumulated text.

pub mod client;
pub mod error;
pub mod http;
pub mod probe;
pub mod retry;
pub mod subprocess;

pub use client::AgentClient;
pub use error::AgentError;
pub use http::OllamaClient;
pub use probe::{probe_executable, ProbeResult};
pub use retry::BackoffPolicy;
pub use subprocess::{CopilotClient, GeminiClient};
