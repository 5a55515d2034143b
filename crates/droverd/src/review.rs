//! The review-request protocol: a sentinel-delimited block the agent embeds
//! in its output when it needs the human to choose among options.
//!
//! Parsing is line-oriented and tolerant of surrounding whitespace. It is not
//! a grammar; anything that does not match a recognized line is ignored. Only
//! the first block in a response is honored.

use chrono::Utc;
use drover_core::types::{ReviewOption, ReviewRequest};

pub const REVIEW_OPEN: &str = "---NEEDS_REVIEW---";
pub const REVIEW_CLOSE: &str = "---END_REVIEW---";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    /// Trimmed prose the agent produced before asking for review.
    pub work_in_progress: String,
    pub review: ReviewRequest,
}

/// Scan agent output for a well-formed review block.
///
/// Returns `None` when either sentinel is missing or no `Question:` line is
/// present between them.
pub fn parse_review(output: &str) -> Option<ReviewOutcome> {
    let open = output.find(REVIEW_OPEN)?;
    let after_open = &output[open + REVIEW_OPEN.len()..];
    let close = after_open.find(REVIEW_CLOSE)?;
    let body = &after_open[..close];

    let mut question = None;
    let mut context = None;
    let mut options = Vec::new();

    for line in body.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Question:") {
            if question.is_none() {
                question = Some(rest.trim().to_string());
            }
        } else if let Some(rest) = line.strip_prefix("Context:") {
            if context.is_none() {
                context = Some(rest.trim().to_string());
            }
        } else if let Some(option) = parse_option_line(line) {
            options.push(option);
        }
    }

    let question = question?;
    Some(ReviewOutcome {
        work_in_progress: output[..open].trim().to_string(),
        review: ReviewRequest {
            question,
            context,
            options,
            created_at: Utc::now(),
        },
    })
}

/// `- id: <id> | label: <label>`, both fields trimmed.
fn parse_option_line(line: &str) -> Option<ReviewOption> {
    let rest = line.strip_prefix('-')?.trim_start();
    let rest = rest.strip_prefix("id:")?;
    let (id, label_part) = rest.split_once('|')?;
    let label = label_part.trim_start().strip_prefix("label:")?;

    Some(ReviewOption {
        id: id.trim().to_string(),
        label: label.trim().to_string(),
    })
}
