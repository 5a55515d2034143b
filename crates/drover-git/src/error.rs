use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("failed to run {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} exited with status {status:?}: {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("not a git repository: {path}")]
    NotARepository { path: PathBuf },
    #[error("no usable branch name could be derived from task name {task_name:?}")]
    NoValidName { task_name: String },
    #[error("base branch {configured:?} does not exist and no fallback branch is usable")]
    NoBaseBranch { configured: String },
    #[error("unexpected git output: {context}")]
    Parse { context: String },
}

#[cfg(test)]
mod tests {
    use super::GitError;
    use std::error::Error;

    #[test]
    fn command_failed_renders_status_and_stderr() {
        let err = GitError::CommandFailed {
            command: "git worktree add".to_string(),
            status: Some(128),
            stdout: String::new(),
            stderr: "fatal: branch already exists".to_string(),
        };

        let rendered = err.to_string();
        assert!(rendered.contains("git worktree add"));
        assert!(rendered.contains("128"));
        assert!(rendered.contains("branch already exists"));
    }

    #[test]
    fn io_variant_chains_the_source_error() {
        let err = GitError::Io {
            command: "git status".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such binary"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("git status"));
    }

    #[test]
    fn domain_variants_carry_their_inputs() {
        let name_err = GitError::NoValidName {
            task_name: "!!".to_string(),
        };
        assert!(name_err.to_string().contains("!!"));

        let base_err = GitError::NoBaseBranch {
            configured: "main".to_string(),
        };
        assert!(base_err.to_string().contains("main"));
    }
}
