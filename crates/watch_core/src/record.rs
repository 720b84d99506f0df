use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Separates fields inside an identity key so `"ab" + "c"` and `"a" + "bc"`
/// never collide.
const KEY_SEPARATOR: char = '\u{1f}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Job,
    Notification,
}

impl RecordKind {
    /// Name of the persisted snapshot holding records of this kind.
    pub fn snapshot_name(self) -> &'static str {
        match self {
            RecordKind::Job => "previous_jobs",
            RecordKind::Notification => "previous_notifications",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Job => write!(f, "job"),
            RecordKind::Notification => write!(f, "notification"),
        }
    }
}

/// A row scraped from the portal that can be compared across cycles.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: RecordKind;

    /// Stable key deciding whether two records are the same real-world entry.
    fn identity_key(&self) -> String;
}

/// A job posting. `deadline` and `posted_date` are kept as display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub company: String,
    pub deadline: String,
    pub posted_date: String,
    #[serde(default)]
    pub link: Option<String>,
}

impl Record for JobRecord {
    const KIND: RecordKind = RecordKind::Job;

    // The link is left out: portal links get rewritten without the posting changing.
    fn identity_key(&self) -> String {
        join_key(&[&self.company, &self.posted_date, &self.deadline])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    #[serde(default)]
    pub link: Option<String>,
}

impl Record for NotificationRecord {
    const KIND: RecordKind = RecordKind::Notification;

    fn identity_key(&self) -> String {
        join_key(&[&self.title, &self.date])
    }
}

fn join_key(parts: &[&str]) -> String {
    let mut key = String::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for (idx, part) in parts.iter().enumerate() {
        if idx > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(part);
    }
    key
}
