//! Per-run state: counters and the history log

/// Marker appended when a repeated completion claim is suppressed
pub const LOOP_MARKER: &str = "LOOP DETECTED: completion claimed repeatedly, continuing task";

/// Prefix of the entry recorded when a destructive action is declined
pub const CANCELED_PREFIX: &str = "CANCELED";

/// Append-only record of iteration summaries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    /// The newest `n` entries, oldest first
    pub fn recent(&self, n: usize) -> &[String] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// How many of the newest `window` entries record a completion claim
    pub fn completion_markers(&self, window: usize) -> usize {
        self.recent(window)
            .iter()
            .filter(|entry| is_completion_marker(entry))
            .count()
    }
}

/// An entry mentioning completion in either supported language
pub fn is_completion_marker(entry: &str) -> bool {
    let lower = entry.to_lowercase();
    lower.contains("complete") || lower.contains("выполнен")
}

/// State of one task execution, owned by the loop that runs it
#[derive(Debug, Clone, Default)]
pub struct AgentRunState {
    pub iteration: u32,
    pub consecutive_errors: u32,
    pub history: History,
}

impl AgentRunState {
    pub fn new() -> Self {
        Self::default()
    }
}
