#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("failed to start agent {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("agent {command} exited with status {status:?}: {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("failed to read agent output: {source}")]
    Read {
        #[source]
        source: std::io::Error,
    },
    #[error("failed to forward agent output to the response sink: {source}")]
    Sink {
        #[source]
        source: std::io::Error,
    },
    #[error("agent endpoint {url} returned status {status}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },
    #[error("failed to reach agent endpoint {url}: {source}")]
    HttpTransport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("rate limit still exceeded after {retries} retries")]
    RateLimitExhausted { retries: u32 },
    #[error("no models configured in the fallback chain")]
    NoModelConfigured,
}

#[cfg(test)]
mod tests {
    use super::AgentError;
    use std::error::Error;

    #[test]
    fn command_failed_mentions_command_and_stderr() {
        let err = AgentError::CommandFailed {
            command: "gemini --yolo".to_string(),
            status: Some(1),
            stderr: "quota exceeded".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("gemini --yolo"));
        assert!(rendered.contains("quota exceeded"));
    }

    #[test]
    fn spawn_chains_its_io_source() {
        let err = AgentError::Spawn {
            command: "copilot".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
        };
        assert!(err.source().is_some());
    }

    #[test]
    fn rate_limit_exhausted_reports_the_retry_count() {
        let err = AgentError::RateLimitExhausted { retries: 3 };
        assert!(err.to_string().contains("3 retries"));
    }
}
