//! Finished-session results and the collaborators that receive them.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Local};

use crate::error::Result;

/// Outcome of one finished session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionResult {
    pub wpm: u32,
    /// Rounded percentage, 0..=100
    pub accuracy: u32,
    /// Whole seconds, at least 1
    pub elapsed_secs: u32,
    pub errors: usize,
    pub keystrokes: usize,
    /// Share of the passage typed, in percent
    pub completion: f64,
    pub raw_wpm: u32,
    pub net_wpm: u32,
    pub characters: usize,
    pub words: usize,
}

/// A stored result with the moment it was recorded
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    pub result: SessionResult,
    pub created_at: DateTime<Local>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
pub enum HistoryFilter {
    #[default]
    #[strum(serialize = "All Time")]
    All,
    #[strum(serialize = "Last 30 Days")]
    LastMonth,
    #[strum(serialize = "Last 7 Days")]
    LastWeek,
}

impl HistoryFilter {
    /// Oldest timestamp the filter admits.
    pub fn since(&self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        match self {
            HistoryFilter::All => None,
            HistoryFilter::LastMonth => Some(now - Duration::days(30)),
            HistoryFilter::LastWeek => Some(now - Duration::days(7)),
        }
    }

    pub fn next(&self) -> Self {
        match self {
            HistoryFilter::All => HistoryFilter::LastMonth,
            HistoryFilter::LastMonth => HistoryFilter::LastWeek,
            HistoryFilter::LastWeek => HistoryFilter::All,
        }
    }
}

/// Persists finished results
pub trait ResultSink {
    fn submit(&mut self, result: &SessionResult) -> Result<()>;
}

/// Best-effort broadcast of finished results. Failures never reach the
/// session.
pub trait ResultNotifier {
    fn notify(&self, result: &SessionResult) -> Result<()>;

    /// Give outstanding notifications up to `deadline` to complete.
    fn flush(&self, _deadline: StdDuration) {}
}

/// Read side of the result store, newest first
pub trait HistorySource {
    fn load_history(&self, filter: HistoryFilter) -> Result<Vec<HistoryEntry>>;
}

/// Outcome of handing a result to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
pub enum SaveStatus {
    #[default]
    #[strum(serialize = "not saved")]
    Idle,
    #[strum(serialize = "results saved")]
    Saved,
    #[strum(serialize = "failed to save results")]
    Failed,
}
