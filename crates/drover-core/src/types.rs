//! Task record and review types shared by the store, scheduler, and UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::state::TaskStatus;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unit of human-described work driven end-to-end by the orchestrator.
///
/// `branch_name` and `worktree_path` are populated together on the transition
/// into `InProgress` and cleared together when the task completes; a task in
/// `Pending` or `Completed` never owns a worktree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub worktree_path: Option<PathBuf>,
    #[serde(default)]
    pub work_in_progress: Option<String>,
    #[serde(default)]
    pub review: Option<ReviewRequest>,
    #[serde(default)]
    pub review_response: Option<ReviewResponse>,
    #[serde(default)]
    pub response_file: Option<String>,
}

impl Task {
    /// Create a new task in `Pending`.
    pub fn new(id: TaskId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            branch_name: None,
            worktree_path: None,
            work_in_progress: None,
            review: None,
            review_response: None,
            response_file: None,
        }
    }

    /// True when the human has answered an open review and the task is
    /// waiting to be picked back up.
    pub fn is_resume_eligible(&self) -> bool {
        self.status == TaskStatus::NeedsReview && self.review_response.is_some()
    }
}

/// A clarification the agent embedded in its output, asking the human to
/// choose among enumerated options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub question: String,
    #[serde(default)]
    pub context: Option<String>,
    pub options: Vec<ReviewOption>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewOption {
    pub id: String,
    pub label: String,
}

/// The human's answer to a [`ReviewRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub chosen_option_id: String,
    pub chosen_label: String,
    #[serde(default)]
    pub user_notes: String,
    pub responded_at: DateTime<Utc>,
}

/// Stable kanban ordering: creation time, then name length, then id.
///
/// The store itself returns tasks in an unspecified order; display callers
/// sort with this.
pub fn sort_for_display(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.name.len().cmp(&b.name.len()))
            .then_with(|| a.id.0.cmp(&b.id.0))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_task_starts_pending_with_no_worktree() {
        let task = Task::new(TaskId::new("task-1"), "Create user authentication");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.branch_name.is_none());
        assert!(task.worktree_path.is_none());
        assert!(task.review.is_none());
        assert!(task.response_file.is_none());
    }

    #[test]
    fn resume_eligibility_requires_both_review_state_and_response() {
        let mut task = Task::new(TaskId::new("task-2"), "Setup database schema");
        assert!(!task.is_resume_eligible());

        task.status = TaskStatus::NeedsReview;
        assert!(!task.is_resume_eligible());

        task.review_response = Some(ReviewResponse {
            chosen_option_id: "a".to_string(),
            chosen_label: "Option A".to_string(),
            user_notes: String::new(),
            responded_at: Utc::now(),
        });
        assert!(task.is_resume_eligible());

        task.status = TaskStatus::InProgress;
        assert!(!task.is_resume_eligible());
    }

    #[test]
    fn task_serde_roundtrip_preserves_review_fields() {
        let mut task = Task::new(TaskId::new("task-3"), "Design API endpoints");
        task.status = TaskStatus::NeedsReview;
        task.work_in_progress = Some("done step 1".to_string());
        task.review = Some(ReviewRequest {
            question: "A or B?".to_string(),
            context: Some("two valid designs".to_string()),
            options: vec![
                ReviewOption {
                    id: "a".to_string(),
                    label: "Option A".to_string(),
                },
                ReviewOption {
                    id: "b".to_string(),
                    label: "Option B".to_string(),
                },
            ],
            created_at: Utc::now(),
        });

        let json = serde_json::to_string(&task).expect("serialize task");
        let decoded: Task = serde_json::from_str(&json).expect("deserialize task");
        assert_eq!(decoded, task);
    }

    #[test]
    fn task_deserializes_without_optional_fields() {
        let json = r#"{
            "id": "task-4",
            "name": "Fix bug in login",
            "status": "PENDING",
            "created_at": "2026-01-04T10:00:00Z"
        }"#;

        let task: Task = serde_json::from_str(json).expect("deserialize minimal task");
        assert_eq!(task.id.0, "task-4");
        assert!(task.worktree_path.is_none());
        assert!(task.review_response.is_none());
    }

    #[test]
    fn sort_for_display_orders_by_creation_then_name_length_then_id() {
        let base = Utc::now();
        let mut early = Task::new(TaskId::new("z"), "long task name here");
        early.created_at = base;
        let mut later_short = Task::new(TaskId::new("b"), "short");
        later_short.created_at = base + Duration::seconds(5);
        let mut later_same_len = Task::new(TaskId::new("a"), "short");
        later_same_len.created_at = base + Duration::seconds(5);
        let mut later_long = Task::new(TaskId::new("c"), "a much longer task name");
        later_long.created_at = base + Duration::seconds(5);

        let mut tasks = vec![
            later_long.clone(),
            later_short.clone(),
            early.clone(),
            later_same_len.clone(),
        ];
        sort_for_display(&mut tasks);

        let ids: Vec<&str> = tasks.iter().map(|t| t.id.0.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "b", "c"]);
    }
}
