//! Per-task pipelines: the sequence of store, git, sink, and agent steps a
//! worker runs once a task has been admitted.
//!
//! Each pipeline owns its task from admission to release and talks to its
//! peers only through the task store.

use chrono::Utc;
use drover_core::state::{transition, TaskStatus};
use drover_core::types::Task;
use drover_git::branch::generate_branch_name;
use tracing::{info, warn};

use crate::journal::{JournalEvent, JournalKind};
use crate::orchestrator::Shared;
use crate::prompts;
use crate::response_sink::ResponseWriter;
use crate::review::parse_review;

/// First invocation of a task: isolate it in a fresh worktree, run the agent,
/// then either complete, park for review, or put it back in the queue.
pub(crate) fn run_new_task(shared: &Shared, mut task: Task) {
    let branch = match generate_branch_name(&shared.repo, &shared.git, &task.name) {
        Ok(branch) => branch,
        Err(err) => {
            warn!(task = %task.id, error = %err, "branch name generation failed");
            return;
        }
    };

    let worktree = match shared.worktrees.create(&shared.repo, &shared.git, &branch, &task.id) {
        Ok(path) => path,
        Err(err) => {
            warn!(task = %task.id, error = %err, "worktree creation failed");
            return;
        }
    };

    task.branch_name = Some(branch);
    task.worktree_path = Some(worktree);
    if set_status(shared, &mut task, TaskStatus::InProgress).is_err() {
        abort_to_pending(shared, &mut task);
        return;
    }

    shared.pacer.pace();

    let mut sink = match ResponseWriter::open(&shared.data_dir, &task.id) {
        Ok(sink) => sink,
        Err(err) => {
            warn!(task = %task.id, error = %err, "response sink open failed");
            abort_to_pending(shared, &mut task);
            return;
        }
    };
    record_response_file(shared, &mut task, &sink);

    let prompt = prompts::build_task_prompt(&task.name);
    let work_dir = task.worktree_path.clone();
    match shared
        .client
        .send_prompt_in_dir(&prompt, &mut sink, work_dir.as_deref())
    {
        Err(err) => {
            warn!(task = %task.id, error = %err, "agent invocation failed");
            record_event(
                shared,
                &task,
                JournalKind::AgentFailed {
                    message: err.to_string(),
                },
            );
            close_sink(&sink, &task);
            abort_to_pending(shared, &mut task);
        }
        Ok(output) => {
            close_sink(&sink, &task);
            if let Some(outcome) = parse_review(&output) {
                info!(task = %task.id, "agent requested review");
                record_event(
                    shared,
                    &task,
                    JournalKind::ReviewRequested {
                        question: outcome.review.question.clone(),
                    },
                );
                // The worktree stays alive so the resume picks up exactly
                // where the agent stopped.
                task.work_in_progress = Some(outcome.work_in_progress);
                task.review = Some(outcome.review);
                let _ = set_status(shared, &mut task, TaskStatus::NeedsReview);
            } else {
                complete(shared, &mut task);
            }
        }
    }
}

/// Resumed invocation: the human answered a review, so rebuild the
/// conversation and run the agent again inside the preserved worktree.
pub(crate) fn run_resume(shared: &Shared, mut task: Task) {
    let Some(review) = task.review.clone() else {
        warn!(task = %task.id, "resume admitted without a stored review");
        return;
    };
    let Some(response) = task.review_response.clone() else {
        warn!(task = %task.id, "resume admitted without a review response");
        return;
    };

    if set_status(shared, &mut task, TaskStatus::InProgress).is_err() {
        return;
    }

    let labels: Vec<String> = review
        .options
        .iter()
        .map(|option| option.label.clone())
        .collect();
    let prompt = prompts::build_resume_prompt(
        &task.name,
        task.work_in_progress.as_deref().unwrap_or(""),
        &review.question,
        &labels,
        &response.chosen_label,
        &response.user_notes,
    );

    shared.pacer.pace();

    let mut sink = match ResponseWriter::open(&shared.data_dir, &task.id) {
        Ok(sink) => sink,
        Err(err) => {
            warn!(task = %task.id, error = %err, "response sink open failed");
            let _ = set_status(shared, &mut task, TaskStatus::NeedsReview);
            return;
        }
    };
    record_response_file(shared, &mut task, &sink);

    let work_dir = task.worktree_path.clone();
    match shared
        .client
        .send_prompt_in_dir(&prompt, &mut sink, work_dir.as_deref())
    {
        Err(err) => {
            warn!(task = %task.id, error = %err, "resume invocation failed");
            record_event(
                shared,
                &task,
                JournalKind::AgentFailed {
                    message: err.to_string(),
                },
            );
            close_sink(&sink, &task);
            // The response stays attached, so the next poll re-admits; the
            // pacer and poll interval keep that from spinning.
            let _ = set_status(shared, &mut task, TaskStatus::NeedsReview);
        }
        Ok(output) => {
            close_sink(&sink, &task);
            if let Some(outcome) = parse_review(&output) {
                info!(task = %task.id, "agent asked a follow-up review");
                record_event(
                    shared,
                    &task,
                    JournalKind::ReviewRequested {
                        question: outcome.review.question.clone(),
                    },
                );
                // A fresh question invalidates the old answer; wait for a
                // new one.
                task.work_in_progress = Some(outcome.work_in_progress);
                task.review = Some(outcome.review);
                task.review_response = None;
                let _ = set_status(shared, &mut task, TaskStatus::NeedsReview);
            } else {
                complete(shared, &mut task);
            }
        }
    }
}

/// Commit whatever the agent left behind, tear the worktree down, and persist
/// the terminal state in one step so no observer sees a completed task that
/// still owns a worktree.
fn complete(shared: &Shared, task: &mut Task) {
    if let Some(path) = task.worktree_path.clone() {
        if let Err(err) = shared.worktrees.commit_any_changes(&shared.git, &path, &task.id) {
            warn!(task = %task.id, error = %err, "commit of leftover changes failed");
        }
        if let Err(err) = shared.worktrees.remove(&shared.repo, &shared.git, &path) {
            warn!(
                task = %task.id, error = %err,
                "worktree removal failed; stale directory left behind"
            );
        }
    }

    task.worktree_path = None;
    task.branch_name = None;
    if set_status(shared, task, TaskStatus::Completed).is_ok() {
        info!(task = %task.id, "task completed");
    }
}

/// Agent-fatal on a fresh task: release the worktree and put the task back in
/// the queue. The branch keeps the partial commits, if any; the next run
/// forks a new suffixed branch.
fn abort_to_pending(shared: &Shared, task: &mut Task) {
    if let Some(path) = task.worktree_path.clone() {
        if let Err(err) = shared.worktrees.remove(&shared.repo, &shared.git, &path) {
            warn!(
                task = %task.id, error = %err,
                "worktree removal failed; stale directory left behind"
            );
        }
        record_event(shared, task, JournalKind::WorktreeDiscarded { path });
    }

    task.worktree_path = None;
    task.branch_name = None;
    let _ = set_status(shared, task, TaskStatus::Pending);
}

fn set_status(shared: &Shared, task: &mut Task, to: TaskStatus) -> Result<(), ()> {
    let change = match transition(task, to, Utc::now()) {
        Ok(change) => change,
        Err(err) => {
            warn!(task = %task.id, error = %err, "refusing illegal status transition");
            return Err(());
        }
    };
    if let Err(err) = shared.store.update(task) {
        warn!(task = %task.id, error = %err, "status persist failed");
        return Err(());
    }
    if change.from != change.to {
        record_event(
            shared,
            task,
            JournalKind::StatusChanged {
                from: change.from,
                to: change.to,
            },
        );
    }
    Ok(())
}

/// Journal writes never fail a pipeline; they are history, not state.
fn record_event(shared: &Shared, task: &Task, kind: JournalKind) {
    let event = JournalEvent::now(&task.id, kind);
    if let Err(err) = shared.journal.record(&event) {
        warn!(task = %task.id, error = %err, "journal append failed");
    }
}

/// Best effort: the sink works even if recording its path fails, the UI just
/// cannot tail this run.
fn record_response_file(shared: &Shared, task: &mut Task, sink: &ResponseWriter) {
    task.response_file = Some(sink.relative_path().to_string());
    if let Err(err) = shared.store.update(task) {
        warn!(task = %task.id, error = %err, "response file path persist failed");
    }
}

fn close_sink(sink: &ResponseWriter, task: &Task) {
    if let Err(err) = sink.close() {
        warn!(task = %task.id, error = %err, "response sink close failed");
    }
}
