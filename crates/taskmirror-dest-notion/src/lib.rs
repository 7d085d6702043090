//! Notion destination client.
//!
//! Mirrors task records into a Notion database: title, a `GoogleTaskID`
//! rich-text cross-reference, a completion checkbox, and optional due date
//! and notes. Deletion is always a soft archive of the page.
//!
//! Failure contract: a non-2xx response is logged with its body and reported
//! as `None`/`false`, which leaves the reconciler's state stale so the same
//! action is retried on the next pass. Transport or decode failures are
//! `Err` and abort the pass.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use taskmirror_ports::RecordSink;
use taskmirror_schema::TaskRecord;

/// Pinned API version; page property shapes change between versions.
pub const NOTION_VERSION: &str = "2022-06-28";

#[derive(Debug, Clone)]
pub struct NotionSink {
    pub token: String,
    pub database_id: String,
    /// Overridable for tests.
    pub api_base: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPage {
    id: String,
}

impl NotionSink {
    pub fn new(token: String, database_id: String) -> Self {
        Self {
            token,
            database_id,
            api_base: "https://api.notion.com".to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base;
        self
    }

    fn client(&self) -> Result<Client> {
        Client::builder()
            .user_agent(concat!("taskmirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build reqwest client")
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), path)
    }

    fn send_json(
        &self,
        req: reqwest::blocking::RequestBuilder,
        body: &Value,
        what: &str,
    ) -> Result<Option<Value>> {
        let resp = req
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .with_context(|| format!("{what}: send request"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            eprintln!("ERROR {what}: Notion API {status}: {text}");
            return Ok(None);
        }
        let value = resp
            .json::<Value>()
            .with_context(|| format!("{what}: parse response"))?;
        Ok(Some(value))
    }
}

impl RecordSink for NotionSink {
    fn create(&self, task: &TaskRecord) -> Result<Option<String>> {
        let client = self.client()?;
        let body = json!({
            "parent": {"database_id": self.database_id},
            "properties": page_properties(task, true),
        });

        let url = self.api_url("/v1/pages");
        let what = format!("create page for task {}", task.id);
        match self.send_json(client.post(url), &body, &what)? {
            Some(value) => {
                let page: CreatedPage =
                    serde_json::from_value(value).context("parse created page id")?;
                println!("created Notion page for task: {}", task.title);
                Ok(Some(page.id))
            }
            None => Ok(None),
        }
    }

    fn update(&self, record_id: &str, task: &TaskRecord) -> Result<bool> {
        let client = self.client()?;
        // The cross-reference property is immutable after creation.
        let body = json!({"properties": page_properties(task, false)});

        let url = self.api_url(&format!("/v1/pages/{record_id}"));
        let what = format!("update page for task {}", task.id);
        match self.send_json(client.patch(url), &body, &what)? {
            Some(_) => {
                println!("updated Notion page for task: {}", task.title);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn archive(&self, record_id: &str) -> Result<bool> {
        let client = self.client()?;
        let body = json!({"archived": true});

        let url = self.api_url(&format!("/v1/pages/{record_id}"));
        let what = format!("archive page {record_id}");
        match self.send_json(client.patch(url), &body, &what)? {
            Some(_) => {
                println!("archived Notion page: {record_id}");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Build the page property object for a task.
///
/// `with_source_ref` controls whether the `GoogleTaskID` cross-reference is
/// included: set on create, omitted on update. Absent due dates map to an
/// explicit `null` and absent notes to an empty rich-text array, so an update
/// clears a field the task no longer has.
fn page_properties(task: &TaskRecord, with_source_ref: bool) -> Value {
    let due = match task.due {
        Some(d) => json!({"start": d.to_rfc3339()}),
        None => Value::Null,
    };
    let notes = match &task.notes {
        Some(notes) => json!([{"text": {"content": notes}}]),
        None => json!([]),
    };
    let mut properties = json!({
        "Name": {
            "title": [{"text": {"content": task.title}}]
        },
        "Completed": {
            "checkbox": task.status.is_completed()
        },
        "Due": {
            "date": due
        },
        "Notes": {
            "rich_text": notes
        },
    });
    if with_source_ref {
        properties["GoogleTaskID"] = json!({
            "rich_text": [{"text": {"content": task.id}}]
        });
    }
    properties
}
