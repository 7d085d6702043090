//! Reconciliation engine for taskmirror.
//!
//! One pass: fetch the full source list, diff it against the persisted
//! ledger, drive the destination sink, persist the ledger. Creations and
//! updates run before archives. Delivery is at-least-once per action: a
//! refused create leaves no ledger entry (the task is "new" again next
//! pass), a refused update leaves the stored marker stale, a refused
//! archive leaves the entry in place. The ledger is written once, at the
//! end, so a crash mid-pass loses only that pass's progress.

use anyhow::Result;
use std::collections::BTreeMap;
use taskmirror_ports::{RecordSink, TaskSource};
use taskmirror_schema::{SyncEntry, TaskRecord};
use taskmirror_store::SyncStore;

/// Counts for one completed pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    /// Tasks in the source list after indexing.
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub archived: usize,
    /// Actions the destination refused; retried next pass.
    pub failed: usize,
}

impl PassReport {
    /// True when the pass made no destination calls at all.
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.archived == 0 && self.failed == 0
    }
}

pub struct Reconciler<'a> {
    source: &'a dyn TaskSource,
    sink: &'a dyn RecordSink,
    store: &'a SyncStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(source: &'a dyn TaskSource, sink: &'a dyn RecordSink, store: &'a SyncStore) -> Self {
        Self {
            source,
            sink,
            store,
        }
    }

    /// Run one fetch-diff-apply-persist cycle.
    pub fn run_pass(&self) -> Result<PassReport> {
        let fetched = self.source.fetch_all()?;
        let current = index_tasks(fetched);
        let mut state = self.store.load()?;
        let mut report = PassReport {
            fetched: current.len(),
            ..PassReport::default()
        };

        // New and changed tasks first.
        for (id, task) in &current {
            match state.get(id).cloned() {
                None => match self.sink.create(task)? {
                    Some(page_id) => {
                        state.insert(
                            id.clone(),
                            SyncEntry {
                                page_id,
                                last_updated: task.updated.clone(),
                            },
                        );
                        report.created += 1;
                    }
                    // Not synced yet; shows up as new again next pass.
                    None => report.failed += 1,
                },
                Some(entry) if entry.last_updated != task.updated => {
                    if self.sink.update(&entry.page_id, task)? {
                        state.set_marker(id, &task.updated);
                        report.updated += 1;
                    } else {
                        // Marker stays stale so the update is retried.
                        report.failed += 1;
                    }
                }
                Some(_) => {}
            }
        }

        // Then tasks that vanished from the source.
        for id in state.ids() {
            if current.contains_key(&id) {
                continue;
            }
            if let Some(entry) = state.get(&id) {
                let page_id = entry.page_id.clone();
                if self.sink.archive(&page_id)? {
                    state.remove(&id);
                    report.archived += 1;
                } else {
                    // Entry stays so the archive is retried.
                    report.failed += 1;
                }
            }
        }

        self.store.save(&state)?;
        Ok(report)
    }
}

/// Index the fetched list by task id.
///
/// Duplicate ids within one fetch are undefined upstream; the last
/// occurrence wins.
fn index_tasks(tasks: Vec<TaskRecord>) -> BTreeMap<String, TaskRecord> {
    let mut current = BTreeMap::new();
    for task in tasks {
        current.insert(task.id.clone(), task);
    }
    current
}
