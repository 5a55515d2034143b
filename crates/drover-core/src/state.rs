//! Task status and the legal transitions between statuses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Task;

/// Lifecycle position of a task on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting to be admitted by the scheduler.
    Pending,
    /// An agent is working on it inside a dedicated worktree.
    InProgress,
    /// The agent asked the human to choose among options.
    NeedsReview,
    /// Work finished and the worktree has been torn down.
    Completed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::InProgress)
    }

    /// Column headings for the board.
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::NeedsReview => "In Review",
            TaskStatus::Completed => "Completed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid task status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub at: DateTime<Utc>,
}

/// Self-transitions are allowed so re-persisting an unchanged status is not
/// an error.
pub fn is_transition_allowed(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;

    if from == to {
        return true;
    }

    matches!(
        (from, to),
        (Pending, InProgress)
            | (InProgress, NeedsReview | Completed | Pending)
            | (NeedsReview, InProgress)
    )
}

pub fn transition(
    task: &mut Task,
    to: TaskStatus,
    at: DateTime<Utc>,
) -> Result<StatusChange, StateError> {
    let from = task.status;
    if !is_transition_allowed(from, to) {
        return Err(StateError::InvalidTransition { from, to });
    }

    task.status = to;
    Ok(StatusChange { from, to, at })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskId;

    #[test]
    fn status_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&TaskStatus::NeedsReview).unwrap();
        assert_eq!(json, "\"NEEDS_REVIEW\"");
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }

    #[test]
    fn allowed_edges_match_the_lifecycle() {
        use TaskStatus::*;

        assert!(is_transition_allowed(Pending, InProgress));
        assert!(is_transition_allowed(InProgress, NeedsReview));
        assert!(is_transition_allowed(InProgress, Completed));
        assert!(is_transition_allowed(InProgress, Pending));
        assert!(is_transition_allowed(NeedsReview, InProgress));
    }

    #[test]
    fn forbidden_edges_are_rejected() {
        use TaskStatus::*;

        assert!(!is_transition_allowed(Pending, Completed));
        assert!(!is_transition_allowed(Pending, NeedsReview));
        assert!(!is_transition_allowed(NeedsReview, Completed));
        assert!(!is_transition_allowed(NeedsReview, Pending));
        assert!(!is_transition_allowed(Completed, Pending));
        assert!(!is_transition_allowed(Completed, InProgress));
    }

    #[test]
    fn self_transition_is_idempotent() {
        assert!(is_transition_allowed(
            TaskStatus::Pending,
            TaskStatus::Pending
        ));
        assert!(is_transition_allowed(
            TaskStatus::Completed,
            TaskStatus::Completed
        ));
    }

    #[test]
    fn transition_updates_the_task_and_reports_the_change() {
        let mut task = Task::new(TaskId::new("T1"), "Implement API v2");
        let at = Utc::now();

        let change = transition(&mut task, TaskStatus::InProgress, at).expect("legal transition");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(change.from, TaskStatus::Pending);
        assert_eq!(change.to, TaskStatus::InProgress);
        assert_eq!(change.at, at);
    }

    #[test]
    fn transition_rejects_illegal_moves_without_mutating() {
        let mut task = Task::new(TaskId::new("T2"), "Add feature X");

        let err = transition(&mut task, TaskStatus::Completed, Utc::now())
            .expect_err("pending cannot jump to completed");
        assert!(matches!(
            err,
            StateError::InvalidTransition {
                from: TaskStatus::Pending,
                to: TaskStatus::Completed
            }
        ));
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn labels_match_board_columns() {
        assert_eq!(TaskStatus::Pending.label(), "Pending");
        assert_eq!(TaskStatus::InProgress.label(), "In Progress");
        assert_eq!(TaskStatus::NeedsReview.label(), "In Review");
        assert_eq!(TaskStatus::Completed.label(), "Completed");
    }
}
