//! Task branch naming: derive a short slug from the task description and
//! suffix it until it is unique among local branches.

use crate::command::GitCli;
use crate::error::GitError;
use crate::repo::{branch_exists, RepoHandle};

/// Namespace every task branch lives under.
pub const BRANCH_PREFIX: &str = "drover/";

const MAX_SLUG_LEN: usize = 40;
const MAX_SLUG_TOKENS: usize = 3;
const MIN_TOKEN_LEN: usize = 3;

/// Derive a unique branch name for a task.
///
/// Tokens come from splitting the task name on non-alphanumeric runs; tokens
/// of one or two characters are dropped, the first three survivors are
/// lowercased and hyphen-joined, and the slug is capped at 40 characters.
/// Collisions with existing branches get `-1`, `-2`, ... appended.
pub fn generate_branch_name(
    repo: &RepoHandle,
    git: &GitCli,
    task_name: &str,
) -> Result<String, GitError> {
    let slug = derive_slug(task_name).ok_or_else(|| GitError::NoValidName {
        task_name: task_name.to_string(),
    })?;
    let base = format!("{BRANCH_PREFIX}{slug}");

    if !branch_exists(repo, git, &base)? {
        return Ok(base);
    }

    let mut counter = 1u32;
    loop {
        let candidate = format!("{base}-{counter}");
        if !branch_exists(repo, git, &candidate)? {
            return Ok(candidate);
        }
        counter += 1;
    }
}

fn derive_slug(task_name: &str) -> Option<String> {
    let tokens: Vec<String> = task_name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| token.len() >= MIN_TOKEN_LEN)
        .take(MAX_SLUG_TOKENS)
        .map(|token| token.to_ascii_lowercase())
        .collect();

    if tokens.is_empty() {
        return None;
    }

    let mut slug = tokens.join("-");
    slug.truncate(MAX_SLUG_LEN);
    Some(slug.trim_end_matches('-').to_string())
}
