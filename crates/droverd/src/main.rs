use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use drover_agents::client::AgentClient;
use drover_agents::http::OllamaClient;
use drover_agents::probe::probe_executable;
use drover_agents::subprocess::{CopilotClient, GeminiClient};
use drover_core::config::{load_config, AiProvider, Config, ConfigError};
use drover_core::validation::Validate;
use drover_git::command::GitCli;
use drover_git::error::GitError;
use drover_git::repo::discover_repo;
use droverd::orchestrator::{Orchestrator, OrchestratorConfig};
use droverd::store::{StoreError, TaskStore};

#[derive(Debug, thiserror::Error)]
enum MainError {
    #[error("failed to resolve the current directory: {source}")]
    Cwd {
        #[source]
        source: std::io::Error,
    },
    #[error("could not locate a home directory for the task store")]
    NoHome,
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn main() {
    droverd::logging::init();
    if let Err(err) = run() {
        eprintln!("droverd startup failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), MainError> {
    let cwd = env::current_dir().map_err(|source| MainError::Cwd { source })?;
    let git = GitCli::default();
    let repo = discover_repo(&cwd, &git)?;

    // A malformed config aborts startup; only an absent one means defaults.
    let config = load_config(&repo.root)?.unwrap_or_default();
    check_config(&config)?;
    probe_provider(&config);

    let store = Arc::new(TaskStore::open(task_store_path()?)?);
    let task_count = store.list()?.len();

    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        repo.clone(),
        build_client(&config),
        OrchestratorConfig {
            min_request_delay: Duration::from_millis(config.delay_ms),
            ..OrchestratorConfig::default()
        },
    );
    orchestrator.start();

    tracing::info!(
        repo = %repo.root.display(),
        store = %store.path().display(),
        tasks = task_count,
        provider = ?config.ai_provider,
        "droverd running; press Ctrl+C to stop"
    );
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

fn check_config(config: &Config) -> Result<(), MainError> {
    let issues = config.validate();
    for issue in &issues {
        if issue.is_error() {
            tracing::error!(code = issue.code, "{}", issue.message);
        } else {
            tracing::warn!(code = issue.code, "{}", issue.message);
        }
    }

    let errors: Vec<&str> = issues
        .iter()
        .filter(|issue| issue.is_error())
        .map(|issue| issue.code)
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(MainError::InvalidConfig(errors.join(", ")))
    }
}

/// Advisory only: a missing agent CLI is worth one loud diagnostic at
/// startup, but the operator may install it while the daemon runs.
fn probe_provider(config: &Config) {
    let executable = match config.ai_provider {
        AiProvider::Gemini => "gemini",
        AiProvider::Copilot => "copilot",
        AiProvider::Ollama => return,
    };

    let result = probe_executable(executable);
    if !result.installed {
        tracing::warn!(
            executable,
            "agent CLI not found; tasks will fail until it is installed"
        );
    } else if let Some(version) = result.version_output {
        tracing::info!(executable, version, "agent CLI detected");
    }
}

fn task_store_path() -> Result<PathBuf, MainError> {
    let home = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or(MainError::NoHome)?;
    Ok(home.join(".drover").join("tasks.json"))
}

fn build_client(config: &Config) -> Arc<dyn AgentClient> {
    match config.ai_provider {
        AiProvider::Gemini => Arc::new(GeminiClient::default()),
        AiProvider::Ollama => Arc::new(OllamaClient::new(
            config.ollama_base_url.clone(),
            config.ollama_model.clone(),
        )),
        AiProvider::Copilot => Arc::new(CopilotClient::with_model(config.copilot_model.clone())),
    }
}
