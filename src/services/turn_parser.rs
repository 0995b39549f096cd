//! Parsing of raw backend text into a [`TurnResult`].
//!
//! Parsing never fails. Output that does not fit the wire shape becomes
//! [`ParseOutcome::Degraded`] carrying the raw text and default metadata.

use tracing::{debug, warn};

use crate::domain::models::{ParseOutcome, TurnResult};

/// Parse raw backend output.
pub fn parse_turn(raw: &str) -> ParseOutcome {
    let cleaned = strip_markdown_code_blocks(raw);
    if let Some(turn) = try_parse(cleaned) {
        return ParseOutcome::Parsed(turn);
    }
    if let Some(turn) = extract_object(cleaned).and_then(try_parse) {
        debug!("Recovered turn JSON embedded in surrounding text");
        return ParseOutcome::Parsed(turn);
    }

    warn!(
        raw_length = raw.len(),
        raw_preview = preview(raw),
        "Backend output did not match the turn shape, using degraded result"
    );
    ParseOutcome::Degraded(TurnResult::degraded(raw))
}

fn try_parse(text: &str) -> Option<TurnResult> {
    serde_json::from_str::<TurnResult>(text).ok()
}

/// Strip a surrounding markdown code fence (```` ```json ... ``` ````).
fn strip_markdown_code_blocks(output: &str) -> &str {
    let trimmed = output.trim();
    if trimmed.len() < 6 || !trimmed.starts_with("```") || !trimmed.ends_with("```") {
        return trimmed;
    }
    let start = trimmed.find('\n').map_or(3, |pos| pos + 1);
    let end = trimmed.rfind("\n```").unwrap_or(trimmed.len() - 3);
    if start >= end {
        return trimmed;
    }
    trimmed[start..end].trim()
}

/// The span from the first `{` to the last `}`.
fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn preview(text: &str) -> &str {
    let mut end = text.len().min(200);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
