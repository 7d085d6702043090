use anyhow::Result;
use taskmirror_schema::TaskRecord;

/// Read side of the mirror.
///
/// Adapters live in `taskmirror-source-*` crates. One call per sync pass;
/// the returned list is the authoritative truth for that pass.
pub trait TaskSource {
    /// Fetch the full current task list.
    ///
    /// Errors carry an Auth category when credentials cannot be obtained or
    /// refreshed, Remote on a non-success HTTP status. No pagination: a
    /// single-page result is assumed.
    fn fetch_all(&self) -> Result<Vec<TaskRecord>>;
}

/// Write side of the mirror.
///
/// Every call is a live network write; there is no dry-run mode. The
/// `Ok`-but-unsuccessful returns (`None` / `false`) mean the remote refused
/// the operation; the reconciler leaves its state so the same action is
/// retried on the next pass. `Err` means the pass itself cannot continue.
pub trait RecordSink {
    /// Create a destination record mirroring `task`.
    ///
    /// Returns the new record id, or `None` when the remote returned a
    /// non-2xx status ("not synced yet", not fatal).
    fn create(&self, task: &TaskRecord) -> Result<Option<String>>;

    /// Re-map `task`'s fields onto an existing record.
    fn update(&self, record_id: &str, task: &TaskRecord) -> Result<bool>;

    /// Soft-delete: set the archived flag, never a hard delete.
    fn archive(&self, record_id: &str) -> Result<bool>;
}
