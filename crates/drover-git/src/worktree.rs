use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use drover_core::types::TaskId;
use serde::{Deserialize, Serialize};

use crate::command::GitCli;
use crate::error::GitError;
use crate::repo::{resolve_base_branch, RepoHandle};

/// Where task worktrees live, relative to the repository root.
pub const DEFAULT_WORKTREE_ROOT: &str = ".drover/worktrees";

/// Integration branch new task branches fork from when present.
pub const DEFAULT_BASE_BRANCH: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedWorktree {
    pub path: PathBuf,
    pub branch: Option<String>,
    pub head: Option<String>,
}

/// Creates and destroys the isolated working directories tasks run in, one
/// directory per task id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeManager {
    relative_root: PathBuf,
    base_branch: String,
}

impl Default for WorktreeManager {
    fn default() -> Self {
        Self {
            relative_root: PathBuf::from(DEFAULT_WORKTREE_ROOT),
            base_branch: DEFAULT_BASE_BRANCH.to_string(),
        }
    }
}

impl WorktreeManager {
    pub fn new(relative_root: impl Into<PathBuf>, base_branch: impl Into<String>) -> Self {
        Self {
            relative_root: relative_root.into(),
            base_branch: base_branch.into(),
        }
    }

    pub fn worktree_path(&self, repo: &RepoHandle, task_id: &TaskId) -> PathBuf {
        repo.root.join(&self.relative_root).join(&task_id.0)
    }

    /// Create the worktree for a task on a fresh branch forked from the base
    /// branch. Nothing is left behind on failure; the task stays admissible.
    pub fn create(
        &self,
        repo: &RepoHandle,
        git: &GitCli,
        branch: &str,
        task_id: &TaskId,
    ) -> Result<PathBuf, GitError> {
        let base = resolve_base_branch(repo, git, &self.base_branch)?;

        let root = repo.root.join(&self.relative_root);
        fs::create_dir_all(&root).map_err(|source| GitError::Io {
            command: format!("create_dir_all {}", root.display()),
            source,
        })?;

        let path = self.worktree_path(repo, task_id);
        let args = vec![
            OsString::from("worktree"),
            OsString::from("add"),
            OsString::from("-b"),
            OsString::from(branch),
            path.as_os_str().to_os_string(),
            OsString::from(base),
        ];
        git.run(&repo.root, args)?;

        Ok(path)
    }

    /// Release the worktree and make sure the directory is gone.
    pub fn remove(&self, repo: &RepoHandle, git: &GitCli, path: &Path) -> Result<(), GitError> {
        let args = vec![
            OsString::from("worktree"),
            OsString::from("remove"),
            OsString::from("--force"),
            path.as_os_str().to_os_string(),
        ];
        git.run(&repo.root, args)?;

        if path.exists() {
            fs::remove_dir_all(path).map_err(|source| GitError::Io {
                command: format!("remove_dir_all {}", path.display()),
                source,
            })?;
        }
        Ok(())
    }

    /// Stage and commit whatever the agent left uncommitted, so its work
    /// survives the teardown. A clean tree is a successful no-op.
    pub fn commit_any_changes(
        &self,
        git: &GitCli,
        worktree: &Path,
        task_id: &TaskId,
    ) -> Result<(), GitError> {
        let status = git.run(worktree, ["status", "--porcelain"])?;
        if status.stdout.trim().is_empty() {
            return Ok(());
        }

        git.run(worktree, ["add", "-A"])?;
        let message = format!("Task completed: {task_id}");
        git.run(worktree, ["commit", "-m", &message])?;
        Ok(())
    }

    pub fn list(&self, repo: &RepoHandle, git: &GitCli) -> Result<Vec<ListedWorktree>, GitError> {
        let output = git.run(&repo.root, ["worktree", "list", "--porcelain"])?;
        parse_worktree_list(&output.stdout)
    }
}

fn parse_worktree_list(raw: &str) -> Result<Vec<ListedWorktree>, GitError> {
    let mut listed = Vec::new();
    let mut path: Option<PathBuf> = None;
    let mut branch: Option<String> = None;
    let mut head: Option<String> = None;

    for line in raw.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if let Some(path) = path.take() {
                listed.push(ListedWorktree {
                    path,
                    branch: branch.take(),
                    head: head.take(),
                });
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("worktree ") {
            path = Some(PathBuf::from(rest.trim()));
        } else if let Some(rest) = line.strip_prefix("branch ") {
            branch = Some(rest.trim().trim_start_matches("refs/heads/").to_string());
        } else if let Some(rest) = line.strip_prefix("HEAD ") {
            head = Some(rest.trim().to_string());
        }
    }

    if listed.is_empty() && !raw.trim().is_empty() {
        return Err(GitError::Parse {
            context: "unrecognized git worktree list output".to_string(),
        });
    }

    Ok(listed)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::process::Command;
    use std::time::{SystemTime, UNIX_EPOCH};

    use drover_core::types::TaskId;

    use super::{parse_worktree_list, WorktreeManager};
    use crate::command::GitCli;
    use crate::error::GitError;
    use crate::repo::discover_repo;

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        std::env::temp_dir().join(format!("drover-worktree-{prefix}-{now}"))
    }

    fn run_git(cwd: &Path, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .output()
            .expect("spawn git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn init_repo() -> PathBuf {
        let root = unique_temp_dir("repo");
        fs::create_dir_all(&root).expect("create temp repo");
        run_git(&root, &["init", "-b", "main"]);
        run_git(&root, &["config", "user.name", "Test User"]);
        run_git(&root, &["config", "user.email", "test@example.com"]);
        fs::write(root.join("README.md"), "fixture\n").expect("write file");
        run_git(&root, &["add", "README.md"]);
        run_git(&root, &["commit", "-m", "init"]);
        root
    }

    #[test]
    fn parse_worktree_list_reads_multiple_entries() {
        let raw = "\
worktree /repo
HEAD 1111111111111111111111111111111111111111
branch refs/heads/main

worktree /repo/.drover/worktrees/task-1
HEAD 2222222222222222222222222222222222222222
branch refs/heads/drover/write-hello-file

";
        let parsed = parse_worktree_list(raw).expect("parse");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].branch.as_deref(), Some("main"));
        assert_eq!(
            parsed[1].path,
            PathBuf::from("/repo/.drover/worktrees/task-1")
        );
        assert_eq!(parsed[1].branch.as_deref(), Some("drover/write-hello-file"));
    }

    #[test]
    fn parse_worktree_list_accepts_detached_entries() {
        let raw = "\
worktree /repo/.drover/worktrees/task-2
HEAD 3333333333333333333333333333333333333333
detached

";
        let parsed = parse_worktree_list(raw).expect("parse");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].branch, None);
    }

    #[test]
    fn parse_worktree_list_rejects_garbage() {
        let err = parse_worktree_list("nonsense").expect_err("garbage output");
        assert!(matches!(err, GitError::Parse { .. }));
    }

    #[test]
    fn create_checks_out_a_new_branch_into_the_task_directory() {
        let root = init_repo();
        let git = GitCli::default();
        let repo = discover_repo(&root, &git).expect("discover repo");
        let manager = WorktreeManager::default();
        let task_id = TaskId::new("task-1");

        let path = manager
            .create(&repo, &git, "drover/write-hello-file", &task_id)
            .expect("create worktree");
        assert!(path.ends_with(".drover/worktrees/task-1"));
        assert!(path.join("README.md").exists());

        let listed = manager.list(&repo, &git).expect("list worktrees");
        assert!(listed
            .iter()
            .any(|wt| wt.branch.as_deref() == Some("drover/write-hello-file")));

        manager.remove(&repo, &git, &path).expect("remove worktree");
        assert!(!path.exists());

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn create_fails_cleanly_when_no_base_branch_is_usable() {
        let root = unique_temp_dir("empty-repo");
        fs::create_dir_all(&root).expect("create temp repo");
        run_git(&root, &["init", "-b", "main"]);

        let git = GitCli::default();
        let repo = discover_repo(&root, &git).expect("discover repo");
        let manager = WorktreeManager::default();

        let err = manager
            .create(&repo, &git, "drover/doomed", &TaskId::new("task-9"))
            .expect_err("no base branch");
        assert!(matches!(err, GitError::NoBaseBranch { .. }));
        assert!(!manager.worktree_path(&repo, &TaskId::new("task-9")).exists());

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn commit_any_changes_preserves_agent_output() {
        let root = init_repo();
        let git = GitCli::default();
        let repo = discover_repo(&root, &git).expect("discover repo");
        let manager = WorktreeManager::default();
        let task_id = TaskId::new("task-3");

        let path = manager
            .create(&repo, &git, "drover/preserve-agent-work", &task_id)
            .expect("create worktree");
        fs::write(path.join("hello.txt"), "hello\n").expect("agent writes a file");

        manager
            .commit_any_changes(&git, &path, &task_id)
            .expect("commit changes");

        let log = git
            .run(&path, ["log", "-1", "--pretty=%s"])
            .expect("read log");
        assert_eq!(log.stdout.trim(), "Task completed: task-3");

        let status = git.run(&path, ["status", "--porcelain"]).expect("status");
        assert!(status.stdout.trim().is_empty());

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn commit_any_changes_is_a_no_op_on_a_clean_tree() {
        let root = init_repo();
        let git = GitCli::default();
        let repo = discover_repo(&root, &git).expect("discover repo");
        let manager = WorktreeManager::default();
        let task_id = TaskId::new("task-4");

        let path = manager
            .create(&repo, &git, "drover/clean-tree", &task_id)
            .expect("create worktree");

        let before = git.run(&path, ["rev-parse", "HEAD"]).expect("head before");
        manager
            .commit_any_changes(&git, &path, &task_id)
            .expect("no-op commit");
        let after = git.run(&path, ["rev-parse", "HEAD"]).expect("head after");
        assert_eq!(before.stdout, after.stdout);

        let _ = fs::remove_dir_all(root);
    }
}
