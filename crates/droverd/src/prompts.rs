//! Prompt templates for agent invocations.
//!
//! The system prompt carries the working agreement: work inside the assigned
//! checkout, commit as you go, and use the review block when human input is
//! required. The review block format here must stay in lockstep with the
//! parser in [`crate::review`].

pub const SYSTEM_PROMPT: &str = "\
You are an autonomous coding agent working inside a dedicated git checkout of \
this project. Complete the task described below end to end.

Ground rules:
- Read README.md first to learn the project's structure, build commands, and \
test conventions before changing anything.
- Make focused, incremental changes and keep to the existing code style.
- Run the project's build and test commands after your changes. Investigate \
failures before touching the tests themselves; fix the source first.
- Commit completed chunks of work with git (git add, then git commit with a \
short descriptive message). Never commit code that does not build.
- When you report progress, list what is actually done, including files \
created, tests run, and commits made.

If you cannot proceed without a decision from the human, first describe the \
work you have completed so far, then append exactly this block:

---NEEDS_REVIEW---
Question: [the specific decision you need]
Context: [why you need it]
- id: option1 | label: [first option]
- id: option2 | label: [second option]
---END_REVIEW---

Use two or more options with your own ids and labels. Ask only when the \
requirements are genuinely ambiguous or multiple designs are equally valid. \
After the human answers you will be restarted with their choice.";

/// Prompt for the first invocation of a task.
pub fn build_task_prompt(task_name: &str) -> String {
    format!("{SYSTEM_PROMPT}\n\nTask: {task_name}")
}

/// Prompt for a resumed task: the original request, the preserved progress,
/// the question the agent asked, and the human's answer.
pub fn build_resume_prompt(
    task_name: &str,
    work_in_progress: &str,
    question: &str,
    option_labels: &[String],
    chosen_label: &str,
    user_notes: &str,
) -> String {
    let mut options = String::new();
    for label in option_labels {
        options.push_str("  - ");
        options.push_str(label);
        options.push('\n');
    }

    let progress = if work_in_progress.is_empty() {
        String::new()
    } else {
        format!("\n\nWork completed before the question:\n{work_in_progress}")
    };

    let notes = if user_notes.is_empty() {
        String::new()
    } else {
        format!("\n\nUser notes: {user_notes}")
    };

    format!(
        "{SYSTEM_PROMPT}\n\n\
         Original task: {task_name}{progress}\n\n\
         You previously asked for clarification:\n\
         Q: {question}\n\n\
         Available options were:\n{options}\
         User chose: {chosen_label}{notes}\n\n\
         Continue and complete the task using the user's choice."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_prompt_embeds_the_task_name_after_the_system_prompt() {
        let prompt = build_task_prompt("write a hello file");
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.ends_with("Task: write a hello file"));
    }

    #[test]
    fn task_prompt_is_deterministic() {
        let a = build_task_prompt("Implement authentication");
        let b = build_task_prompt("Implement authentication");
        assert_eq!(a, b);
    }

    #[test]
    fn system_prompt_teaches_the_exact_review_sentinels() {
        assert!(SYSTEM_PROMPT.contains(crate::review::REVIEW_OPEN));
        assert!(SYSTEM_PROMPT.contains(crate::review::REVIEW_CLOSE));
        assert!(SYSTEM_PROMPT.contains("- id: option1 | label:"));
    }

    #[test]
    fn resume_prompt_carries_question_choice_notes_and_progress() {
        let prompt = build_resume_prompt(
            "write a hello file",
            "done step 1",
            "A or B?",
            &["Option A".to_string(), "Option B".to_string()],
            "Option A",
            "prefer A",
        );

        assert!(prompt.contains("Original task: write a hello file"));
        assert!(prompt.contains("done step 1"));
        assert!(prompt.contains("Q: A or B?"));
        assert!(prompt.contains("  - Option A"));
        assert!(prompt.contains("  - Option B"));
        assert!(prompt.contains("User chose: Option A"));
        assert!(prompt.contains("User notes: prefer A"));
    }

    #[test]
    fn resume_prompt_omits_empty_progress_and_notes() {
        let prompt = build_resume_prompt(
            "task",
            "",
            "which one?",
            &["Only".to_string()],
            "Only",
            "",
        );

        assert!(!prompt.contains("Work completed before the question"));
        assert!(!prompt.contains("User notes:"));
        assert!(prompt.contains("User chose: Only"));
    }
}
