//! Startup probing for subprocess agent binaries.
//!
//! The daemon checks the configured agent CLI before scheduling work so a
//! missing installation shows up as one clear diagnostic instead of a failed
//! pipeline per task. Probing is advisory; the orchestrator still starts,
//! since the operator may install the agent while the daemon runs.

use std::process::Command;

/// Shell-independent command checks, swappable in tests.
pub trait ProbeRunner {
    fn command_exists(&self, executable: &str) -> bool;
    fn command_version(&self, executable: &str) -> Result<String, String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessProbeRunner;

impl ProbeRunner for ProcessProbeRunner {
    fn command_exists(&self, executable: &str) -> bool {
        // Spawning with --version doubles as the existence check; a missing
        // binary fails with NotFound before it ever runs.
        Command::new(executable)
            .arg("--version")
            .output()
            .is_ok()
    }

    fn command_version(&self, executable: &str) -> Result<String, String> {
        let output = Command::new(executable)
            .arg("--version")
            .output()
            .map_err(|err| err.to_string())?;

        if !output.status.success() {
            return Err(format!(
                "non-zero exit {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        Ok(text
            .lines()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("")
            .trim()
            .to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub executable: String,
    pub installed: bool,
    pub version_output: Option<String>,
    pub healthy: bool,
}

pub fn probe_executable(executable: &str) -> ProbeResult {
    probe_executable_with(executable, &ProcessProbeRunner)
}

pub fn probe_executable_with(executable: &str, runner: &dyn ProbeRunner) -> ProbeResult {
    let installed = runner.command_exists(executable);
    if !installed {
        return ProbeResult {
            executable: executable.to_string(),
            installed: false,
            version_output: None,
            healthy: false,
        };
    }

    match runner.command_version(executable) {
        Ok(version) => ProbeResult {
            executable: executable.to_string(),
            installed: true,
            version_output: Some(version),
            healthy: true,
        },
        Err(_) => ProbeResult {
            executable: executable.to_string(),
            installed: true,
            version_output: None,
            healthy: false,
        },
    }
}
