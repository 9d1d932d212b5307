//! Cleans supervised process output for display and logging.
//!
//! The server's stdout/stderr carry colour codes, cursor movement and
//! carriage-return progress bars. None of that is useful on the loading view.

use std::sync::LazyLock;

use regex::Regex;

/// Longest summary shown on the loading view.
pub const SUMMARY_MAX_CHARS: usize = 160;

/// OSC sequences (window titles, hyperlinks), CSI sequences and two-byte escapes.
static ANSI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b\[[0-?]*[ -/]*[@-~]|\x1b[@-Z\\-_]")
        .expect("ANSI pattern is a valid regex")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is a valid regex"));

/// Remove terminal escape sequences.
pub fn strip_ansi(text: &str) -> String {
    ANSI_PATTERN.replace_all(text, "").into_owned()
}

/// Strip escapes and control characters, resolve `\r` overwrites, drop blank lines.
pub fn sanitize(text: &str) -> String {
    let stripped = strip_ansi(text);

    stripped
        .split('\n')
        .map(last_carriage_segment)
        .map(|line| {
            line.chars()
                .filter(|c| *c == '\t' || !c.is_control())
                .collect::<String>()
        })
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse a chunk of output into one short line for the loading view.
///
/// Uses the most recent meaningful line, squeezes whitespace and truncates.
/// Returns `None` when nothing printable is left.
pub fn summarize(text: &str) -> Option<String> {
    let cleaned = sanitize(text);
    let last = cleaned.lines().last()?;
    let squeezed = WHITESPACE_RUN.replace_all(last, " ");
    Some(truncate(&squeezed, SUMMARY_MAX_CHARS))
}

/// What a terminal would show after `\r` rewrites of a line.
fn last_carriage_segment(line: &str) -> &str {
    line.split('\r')
        .filter(|segment| !segment.trim().is_empty())
        .last()
        .unwrap_or("")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
