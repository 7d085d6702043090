//! The taskmirror daemon.
//!
//! No CLI flags. Configuration comes from the file named by
//! `TASKMIRROR_CONFIG` (default `taskmirror.yaml`), with the Notion secrets
//! overridable from the environment. Runs forever: one sync pass, a fixed
//! sleep, repeat. Remote refusals keep the loop alive (the next pass
//! retries); everything else exits non-zero.

use anyhow::{Context, Result};
use std::thread::sleep;
use std::time::Duration;
use taskmirror_config::{Config, load_config};
use taskmirror_dest_notion::NotionSink;
use taskmirror_engine::Reconciler;
use taskmirror_error::{ErrorCategory, categorize};
use taskmirror_source_gtasks::GoogleTasksSource;
use taskmirror_store::SyncStore;

fn main() -> Result<()> {
    let config_path =
        std::env::var("TASKMIRROR_CONFIG").unwrap_or_else(|_| "taskmirror.yaml".to_string());
    let mut config = if std::path::Path::new(&config_path).exists() {
        load_config(&config_path).with_context(|| format!("load config {config_path}"))?
    } else {
        // No file is fine as long as the environment supplies the secrets.
        Config::default()
    };
    config.apply_env_overrides();
    config.validate()?;

    let source = GoogleTasksSource::new(
        &config.google.credentials_path,
        &config.google.token_cache_path,
    )
    .with_tasklist(config.google.tasklist.clone())?;
    let sink = NotionSink::new(config.notion.token.clone(), config.notion.database_id.clone());
    let store = SyncStore::new(&config.sync.state_path);
    let reconciler = Reconciler::new(&source, &sink, &store);

    let delay = Duration::from_secs(config.sync.poll_interval_secs);
    println!(
        "taskmirror: mirroring list {} into Notion database {} every {}s",
        config.google.tasklist,
        config.notion.database_id,
        config.sync.poll_interval_secs
    );

    loop {
        println!("syncing tasks from Google Tasks to Notion...");
        match reconciler.run_pass() {
            Ok(report) => {
                if report.is_noop() {
                    println!("sync complete: {} tasks, nothing to do", report.fetched);
                } else {
                    println!(
                        "sync complete: {} tasks, {} created, {} updated, {} archived, {} failed (will retry)",
                        report.fetched,
                        report.created,
                        report.updated,
                        report.archived,
                        report.failed
                    );
                }
            }
            Err(err) => match categorize(&err) {
                ErrorCategory::Remote => {
                    eprintln!("WARN: pass failed, retrying next pass: {err:#}");
                }
                category => {
                    return Err(err.context(format!("fatal {category} error")));
                }
            },
        }
        sleep(delay);
    }
}
