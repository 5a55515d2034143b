//! HTTP agent variant: a local Ollama server driven through its streaming
//! generate endpoint.

use std::io::{Read, Write};
use std::path::Path;
use std::thread;

use crate::client::AgentClient;
use crate::error::AgentError;
use crate::retry::{run_with_retry, Attempt, BackoffPolicy};

const STREAM_BUF_LEN: usize = 4096;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    pub base_url: String,
    pub model: String,
    pub backoff: BackoffPolicy,
    http: reqwest::blocking::Client,
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new("http://localhost:11434", "mistral")
    }
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            backoff: BackoffPolicy::default(),
            http: reqwest::blocking::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }

    fn execute(&self, prompt: &str, sink: &mut dyn Write) -> Attempt {
        let url = self.endpoint();
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": true,
            "raw": true,
        });

        let response = match self.http.post(&url).json(&body).send() {
            Ok(response) => response,
            Err(source) => {
                return Attempt {
                    text: String::new(),
                    error: Some(AgentError::HttpTransport { url, source }),
                }
            }
        };

        let status = response.status();
        if !status.is_success() {
            let mut response = response;
            let mut body = String::new();
            let _ = response.read_to_string(&mut body);
            return Attempt {
                text: String::new(),
                error: Some(AgentError::Http {
                    url,
                    status: status.as_u16(),
                    body,
                }),
            };
        }

        let mut reader = response;
        let mut raw = Vec::new();
        let mut buf = [0u8; STREAM_BUF_LEN];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if let Err(source) = sink.write_all(&buf[..n]) {
                        return Attempt {
                            text: String::from_utf8_lossy(&raw).into_owned(),
                            error: Some(AgentError::Sink { source }),
                        };
                    }
                    raw.extend_from_slice(&buf[..n]);
                }
                Err(source) => {
                    return Attempt {
                        text: String::from_utf8_lossy(&raw).into_owned(),
                        error: Some(AgentError::Read { source }),
                    }
                }
            }
        }

        Attempt {
            text: String::from_utf8_lossy(&raw).into_owned(),
            error: None,
        }
    }
}

impl AgentClient for OllamaClient {
    fn send_prompt_in_dir(
        &self,
        prompt: &str,
        sink: &mut dyn Write,
        work_dir: Option<&Path>,
    ) -> Result<String, AgentError> {
        // A remote process cannot chdir into the worktree, so the directory
        // rides along in the prompt instead.
        let prompt = match work_dir {
            Some(dir) => format!("Current working directory: {}\n\n{prompt}", dir.display()),
            None => prompt.to_string(),
        };

        run_with_retry(
            &prompt,
            sink,
            self.backoff,
            |attempt_prompt, attempt_sink| self.execute(attempt_prompt, attempt_sink),
            thread::sleep,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalizes_trailing_slashes() {
        let client = OllamaClient::new("http://localhost:11434/", "mistral");
        assert_eq!(client.endpoint(), "http://localhost:11434/api/generate");

        let bare = OllamaClient::new("http://127.0.0.1:9999", "neural-chat");
        assert_eq!(bare.endpoint(), "http://127.0.0.1:9999/api/generate");
    }

    #[test]
    fn unreachable_server_surfaces_a_transport_error() {
        // Reserved TEST-NET address, nothing listens there.
        let mut client = OllamaClient::new("http://192.0.2.1:1", "mistral");
        client.backoff = BackoffPolicy {
            max_retries: 0,
            base_delay: std::time::Duration::from_millis(1),
        };
        client.http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(200))
            .connect_timeout(std::time::Duration::from_millis(200))
            .build()
            .expect("build client");

        let mut sink = Vec::new();
        let err = client
            .send_prompt("hello", &mut sink)
            .expect_err("nothing is listening");
        assert!(matches!(err, AgentError::HttpTransport { .. }));
    }
}
