//! Recent themes history (most recent first, bounded)

use crate::constants::HISTORY_LIMIT;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub theme: String,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl HistoryEntry {
    pub fn now(theme: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Returns a new list with `entry` first, followed by at most
/// `HISTORY_LIMIT - 1` of the previous entries.
pub fn push_entry(history: &[HistoryEntry], entry: HistoryEntry) -> Vec<HistoryEntry> {
    std::iter::once(entry)
        .chain(history.iter().take(HISTORY_LIMIT - 1).cloned())
        .collect()
}
