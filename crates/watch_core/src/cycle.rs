use std::fmt;

use crate::EventKind;

/// How a cycle treats previously persisted snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleMode {
    /// Diff against the stored snapshots and report only new records.
    #[default]
    Incremental,
    /// Ignore stored snapshots, report everything and store it as the baseline.
    Bootstrap,
}

impl fmt::Display for CycleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleMode::Incremental => write!(f, "incremental"),
            CycleMode::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

/// Stages a check cycle passes through, in order.
///
/// A failure in any stage abandons the cycle and returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleStage {
    #[default]
    Idle,
    Authenticating,
    Fetching,
    Extracting,
    Diffing,
    Notifying,
    Persisting,
}

impl CycleStage {
    /// The stage that follows this one in a successful cycle.
    pub fn next(self) -> Self {
        match self {
            CycleStage::Idle => CycleStage::Authenticating,
            CycleStage::Authenticating => CycleStage::Fetching,
            CycleStage::Fetching => CycleStage::Extracting,
            CycleStage::Extracting => CycleStage::Diffing,
            CycleStage::Diffing => CycleStage::Notifying,
            CycleStage::Notifying => CycleStage::Persisting,
            CycleStage::Persisting => CycleStage::Idle,
        }
    }
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStage::Idle => "idle",
            CycleStage::Authenticating => "authenticating",
            CycleStage::Fetching => "fetching",
            CycleStage::Extracting => "extracting",
            CycleStage::Diffing => "diffing",
            CycleStage::Notifying => "notifying",
            CycleStage::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// Decides which reports a cycle sends.
///
/// Bootstrap always sends a single initial report. Otherwise each non-empty
/// category gets its own report, and a quiet cycle sends the all-clear
/// heartbeat so a silent monitor can be told apart from a dead one.
pub fn plan_notifications(
    mode: CycleMode,
    new_jobs: usize,
    new_notifications: usize,
) -> Vec<EventKind> {
    if mode == CycleMode::Bootstrap {
        return vec![EventKind::InitialScrape];
    }
    let mut events = Vec::with_capacity(2);
    if new_jobs > 0 {
        events.push(EventKind::NewJobs);
    }
    if new_notifications > 0 {
        events.push(EventKind::NewNotifications);
    }
    if events.is_empty() {
        events.push(EventKind::NoUpdates);
    }
    events
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CycleOutcome {
    pub mode: CycleMode,
    pub total_jobs: usize,
    pub total_notifications: usize,
    pub new_jobs: usize,
    pub new_notifications: usize,
    pub dispatched: Vec<EventKind>,
    pub delivery_failures: usize,
}

impl CycleOutcome {
    pub fn found_new(&self) -> bool {
        self.new_jobs > 0 || self.new_notifications > 0
    }
}
