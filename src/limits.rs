//! Output size limits
//!
//! Comments have a hard length ceiling on the hosting platform, and the run
//! summary channel a separate, larger one.

use std::borrow::Cow;

/// Maximum length of a PR or commit comment body
pub const MAX_COMMENT_LENGTH: usize = 65536;
/// Maximum length of the run summary
pub const MAX_SUMMARY_LENGTH: usize = 1_048_576;

pub const TRUNCATION_NOTICE: &str = "\n\n<i>Output truncated: maximum size reached.</i>\n";

/// Ways to shrink a comment that is over the limit
pub const COMMENT_ADVICE: [&str; 3] = [
    "Add \"--cov-report=term-missing:skip-covered\" to the coverage run",
    "Set \"hide-report: true\" to post the badge without the table",
    "Switch to \"multiple-files\" mode",
];

/// Event that triggered the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    PullRequest,
    Push,
    Other,
}

impl Trigger {
    pub fn from_event_name(name: &str) -> Self {
        match name {
            "pull_request" | "pull_request_target" => Trigger::PullRequest,
            "push" => Trigger::Push,
            _ => Trigger::Other,
        }
    }

    /// Only PRs and pushes end up as comments
    pub fn supports_comments(&self) -> bool {
        matches!(self, Trigger::PullRequest | Trigger::Push)
    }
}

/// Length as the platform counts it
pub fn comment_length(body: &str) -> usize {
    body.chars().count()
}

pub fn exceeds_comment_limit(body: &str, trigger: Trigger) -> bool {
    trigger.supports_comments() && comment_length(body) > MAX_COMMENT_LENGTH
}

pub fn truncate_summary(content: &str) -> Cow<'_, str> {
    truncate_to(content, MAX_SUMMARY_LENGTH)
}

/// Cut `content` to at most `limit` bytes including the notice.
///
/// Prefers a line end past 80% of the budget, then the end of a closing tag
/// past that point, so no HTML tag is left open. Falls back to a hard cut on
/// a char boundary.
pub fn truncate_to(content: &str, limit: usize) -> Cow<'_, str> {
    if content.len() <= limit {
        return Cow::Borrowed(content);
    }

    let budget = limit.saturating_sub(TRUNCATION_NOTICE.len());
    let head = &content[..floor_char_boundary(content, budget)];
    let threshold = budget * 4 / 5;

    let line_break = head
        .rfind('\n')
        .filter(|&i| i >= threshold && !inside_tag(&head[..i]));
    let closing_tag = head
        .rmatch_indices("</")
        .find_map(|(start, _)| head[start..].find('>').map(|end| start + end + 1))
        .filter(|&i| i >= threshold);

    let cut = line_break.or(closing_tag).unwrap_or(head.len());

    let mut truncated = String::with_capacity(cut + TRUNCATION_NOTICE.len());
    truncated.push_str(&content[..cut]);
    truncated.push_str(TRUNCATION_NOTICE);
    Cow::Owned(truncated)
}

/// True when the text ends inside an unterminated `<...`
fn inside_tag(text: &str) -> bool {
    match (text.rfind('<'), text.rfind('>')) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        _ => false,
    }
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    (0..=index).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
