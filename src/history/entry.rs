use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub const DISPLAY_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// One successful submission. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Serialized as RFC 3339 with the local offset
    pub timestamp: DateTime<Local>,
    pub input: String,
    pub output: String,
}

impl LogEntry {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        LogEntry {
            timestamp: Local::now(),
            input: input.into(),
            output: output.into(),
        }
    }

    pub fn display_timestamp(&self) -> String {
        self.timestamp.format(DISPLAY_FORMAT).to_string()
    }
}

/// First `max_chars` characters followed by an ellipsis, or the whole text if it fits.
pub fn preview(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (format!("{}…", &text[..cut]), true),
        None => (text.to_string(), false),
    }
}
