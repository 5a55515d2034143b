//! Per-project configuration, loaded from `<project>/.drover/config.toml`.
//!
//! An absent file means all defaults; a malformed file is a hard error so the
//! orchestrator refuses to start instead of guessing.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the per-project data directory holding config and responses.
pub const DATA_DIR: &str = ".drover";

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },
    #[error("failed to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write config file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Which agent client variant the orchestrator talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Gemini,
    Ollama,
    Copilot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Minimum delay between agent request start times, in milliseconds.
    /// Zero disables pacing.
    pub delay_ms: u64,
    pub ai_provider: AiProvider,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub copilot_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delay_ms: 0,
            ai_provider: AiProvider::Gemini,
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "mistral".to_string(),
            copilot_model: "gpt-5".to_string(),
        }
    }
}

pub fn config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(DATA_DIR).join(CONFIG_FILE)
}

pub fn parse_config(contents: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(contents)
}

/// Load the project config. `Ok(None)` means no config file exists and the
/// defaults apply.
pub fn load_config(project_dir: &Path) -> Result<Option<Config>, ConfigError> {
    let path = config_path(project_dir);
    let body = match fs::read_to_string(&path) {
        Ok(body) => body,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(ConfigError::Read { path, source }),
    };

    parse_config(&body)
        .map(Some)
        .map_err(|source| ConfigError::Parse { path, source })
}

pub fn save_config(project_dir: &Path, config: &Config) -> Result<(), ConfigError> {
    let path = config_path(project_dir);
    let dir = project_dir.join(DATA_DIR);
    fs::create_dir_all(&dir).map_err(|source| ConfigError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let body = toml::to_string_pretty(config).map_err(|source| ConfigError::Serialize {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, body).map_err(|source| ConfigError::Write { path, source })
}
