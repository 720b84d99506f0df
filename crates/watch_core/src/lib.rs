//! Portal watch core: record model, change detection and report rendering.
//!
//! Everything in here is pure; IO lives in `watch_engine`.
mod cycle;
mod diff;
mod record;
mod report;

pub use cycle::{plan_notifications, CycleMode, CycleOutcome, CycleStage};
pub use diff::{diff_new, diff_new_by};
pub use record::{JobRecord, NotificationRecord, Record, RecordKind};
pub use report::{format_report, EventKind, Report, ReportEntries};
