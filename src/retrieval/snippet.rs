//! Compact one-line renderings of results for terminal output
//!
//! JSON output (`ask --json`) carries full texts; the human view uses these.

use super::assemble::{PairEntry, WindowEntry};

/// Default snippet length for observation texts
const SNIPPET_MAX_CHARS: usize = 120;

/// `[0:05.0-0:07.5] text`
pub fn window_line(entry: &WindowEntry) -> String {
    format!(
        "[{}] {}",
        time_range(entry.start, entry.end),
        truncate_utf8(&entry.text, SNIPPET_MAX_CHARS)
    )
}

/// `[0:00.0-0:03.0] visual text | audio text`
pub fn pair_line(entry: &PairEntry) -> String {
    let texts: Vec<String> = entry
        .texts
        .iter()
        .map(|text| truncate_utf8(text, SNIPPET_MAX_CHARS / 2))
        .collect();
    format!("[{}] {}", time_range(entry.start, entry.end), texts.join(" | "))
}

/// `m:ss.s`, or a single instant when start == end
pub fn time_range(start: f64, end: f64) -> String {
    if (end - start).abs() < f64::EPSILON {
        clock(start)
    } else {
        format!("{}-{}", clock(start), clock(end))
    }
}

fn clock(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let minutes = (seconds / 60.0).floor();
    format!("{}:{:04.1}", minutes as u64, seconds - minutes * 60.0)
}

/// Truncate a string to max_chars on a char boundary (UTF-8 safe).
pub fn truncate_utf8(s: &str, max_chars: usize) -> String {
    let collapsed = s.replace('\n', " ");
    let trimmed = collapsed.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let truncated: String = trimmed.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
