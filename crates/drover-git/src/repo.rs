use std::path::{Path, PathBuf};

use crate::command::GitCli;
use crate::error::GitError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoHandle {
    pub root: PathBuf,
}

/// Resolve the repository root containing `start_path`.
pub fn discover_repo(start_path: &Path, git: &GitCli) -> Result<RepoHandle, GitError> {
    match git.run(start_path, ["rev-parse", "--show-toplevel"]) {
        Ok(output) => Ok(RepoHandle {
            root: PathBuf::from(output.stdout.trim()),
        }),
        Err(GitError::CommandFailed { .. }) => Err(GitError::NotARepository {
            path: start_path.to_path_buf(),
        }),
        Err(err) => Err(err),
    }
}

pub fn current_branch(repo: &RepoHandle, git: &GitCli) -> Result<String, GitError> {
    let output = git.run(&repo.root, ["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(output.stdout.trim().to_string())
}

/// Whether a local branch with this name exists. A failing `rev-parse
/// --verify` means "no such ref"; other failures still propagate.
pub fn branch_exists(repo: &RepoHandle, git: &GitCli, name: &str) -> Result<bool, GitError> {
    let refname = format!("refs/heads/{name}");
    match git.run(&repo.root, ["rev-parse", "--verify", "--quiet", &refname]) {
        Ok(_) => Ok(true),
        Err(GitError::CommandFailed { .. }) => Ok(false),
        Err(err) => Err(err),
    }
}

/// Pick the branch new task worktrees fork from: the configured integration
/// branch when it exists, otherwise the branch currently checked out. When
/// neither resolves to a real branch the task cannot be admitted.
pub fn resolve_base_branch(
    repo: &RepoHandle,
    git: &GitCli,
    configured: &str,
) -> Result<String, GitError> {
    if branch_exists(repo, git, configured)? {
        return Ok(configured.to_string());
    }

    // HEAD does not resolve in a repository with no commits; that is simply
    // "no fallback", not an error worth propagating.
    let fallback = match current_branch(repo, git) {
        Ok(branch) => branch,
        Err(GitError::CommandFailed { .. }) => {
            return Err(GitError::NoBaseBranch {
                configured: configured.to_string(),
            })
        }
        Err(err) => return Err(err),
    };
    if fallback != "HEAD" && branch_exists(repo, git, &fallback)? {
        return Ok(fallback);
    }

    Err(GitError::NoBaseBranch {
        configured: configured.to_string(),
    })
}
