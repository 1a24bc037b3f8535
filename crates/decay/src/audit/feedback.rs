//! Leveled, indented progress feedback.
//!
//! Components take a `&dyn Feedback` instead of printing, so tests can capture
//! exactly what a run reported. [`TracingFeedback`] is what the binary uses.

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FeedbackLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Sink for progress messages. `depth` is the nesting level of the message
/// (0 for a phase heading, 1 for per-document details, ...).
pub trait Feedback: Send + Sync {
    fn report(&self, level: FeedbackLevel, depth: usize, message: &str);

    fn info(&self, depth: usize, message: &str) {
        self.report(FeedbackLevel::Info, depth, message);
    }

    fn success(&self, depth: usize, message: &str) {
        self.report(FeedbackLevel::Success, depth, message);
    }

    fn warning(&self, depth: usize, message: &str) {
        self.report(FeedbackLevel::Warning, depth, message);
    }

    fn error(&self, depth: usize, message: &str) {
        self.report(FeedbackLevel::Error, depth, message);
    }
}

/// Forwards feedback to `tracing`, indenting two spaces per level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFeedback;

impl Feedback for TracingFeedback {
    fn report(&self, level: FeedbackLevel, depth: usize, message: &str) {
        let indent = " ".repeat(depth * 2);
        match level {
            FeedbackLevel::Info if depth == 0 => tracing::info!(depth, "{}", message),
            FeedbackLevel::Info => tracing::info!(depth, "{}-> {}", indent, message),
            FeedbackLevel::Success => tracing::info!(depth, "{}ok: {}", indent, message),
            FeedbackLevel::Warning => tracing::warn!(depth, "{}{}", indent, message),
            FeedbackLevel::Error => tracing::error!(depth, "{}{}", indent, message),
        }
    }
}

/// One captured feedback line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackEntry {
    pub level: FeedbackLevel,
    pub depth: usize,
    pub message: String,
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingFeedback {
    entries: Mutex<Vec<FeedbackEntry>>,
}

impl RecordingFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<FeedbackEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn at_level(&self, level: FeedbackLevel) -> Vec<FeedbackEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.level == level)
            .collect()
    }

    /// Whether any message at `level` contains `needle`.
    pub fn contains(&self, level: FeedbackLevel, needle: &str) -> bool {
        self.at_level(level)
            .iter()
            .any(|entry| entry.message.contains(needle))
    }
}

impl Feedback for RecordingFeedback {
    fn report(&self, level: FeedbackLevel, depth: usize, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(FeedbackEntry {
                level,
                depth,
                message: message.to_string(),
            });
        }
    }
}
