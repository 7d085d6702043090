//! Data spine for the taskmirror pipeline.
//!
//! `TaskRecord` is the wire shape of a Google Tasks item (only the fields the
//! mirror cares about; the API sends more and serde ignores the rest).
//! `SyncState` is the persisted ledger linking source task ids to the Notion
//! pages mirroring them. Everything else is derived from these two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Completion status as Google Tasks reports it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "needsAction")]
    NeedsAction,
    #[serde(rename = "completed")]
    Completed,
}

impl TaskStatus {
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// A single task as fetched from the source list.
///
/// `updated` is an opaque version marker. The reconciler compares it
/// byte-for-byte against the stored marker; it is never parsed as a
/// timestamp, so clock skew between services cannot cause spurious updates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub updated: String,
}

/// Stored linkage between one source task and its mirrored Notion page.
///
/// Serialized field names are part of the `synced_tasks.json` on-disk
/// format; renaming them would orphan every previously synced page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEntry {
    #[serde(rename = "notion_page_id")]
    pub page_id: String,
    pub last_updated: String,
}

/// The full ledger: source task id -> sync entry.
///
/// Every key was present in some prior fetch. Absence of a key from the
/// current fetch means the task was deleted at the source and its page should
/// be archived. BTreeMap keeps serialization stable across save/load cycles.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncState(BTreeMap<String, SyncEntry>);

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task_id: &str) -> Option<&SyncEntry> {
        self.0.get(task_id)
    }

    pub fn insert(&mut self, task_id: String, entry: SyncEntry) {
        self.0.insert(task_id, entry);
    }

    pub fn remove(&mut self, task_id: &str) -> Option<SyncEntry> {
        self.0.remove(task_id)
    }

    /// Advance the stored version marker after a successful update.
    pub fn set_marker(&mut self, task_id: &str, marker: &str) {
        if let Some(entry) = self.0.get_mut(task_id) {
            entry.last_updated = marker.to_string();
        }
    }

    /// Snapshot of the tracked ids, for iteration while mutating the state.
    pub fn ids(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
