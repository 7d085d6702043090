//! Google Tasks source client.
//!
//! Reads long-lived OAuth client credentials from disk, keeps a short-lived
//! access token cached in a JSON file beside them, and fetches the full task
//! list in one call. Credential trouble is an auth-category error (fatal for
//! the pass, it happens before any work); a non-success status from the list
//! endpoint is a remote-category error.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use taskmirror_error::{auth_error, remote_error};
use taskmirror_ports::TaskSource;
use taskmirror_schema::TaskRecord;
use url::Url;

/// Read scope: the mirror never writes back to Google Tasks.
pub const TASKS_SCOPE: &str = "https://www.googleapis.com/auth/tasks.readonly";

/// Refresh when less than this much validity remains on the cached token.
const EXPIRY_SLACK_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct GoogleTasksSource {
    /// Task list to fetch. "@default" is the user's primary list.
    pub tasklist: String,
    pub credentials_path: PathBuf,
    pub token_cache_path: PathBuf,
    /// Tasks API base. Overridable for tests.
    pub api_base: String,
    /// OAuth token endpoint base. Overridable for tests.
    pub token_base: String,
}

/// Long-lived credentials, obtained once out of band.
#[derive(Debug, Deserialize)]
struct StoredCredentials {
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

/// Short-lived access token cached between passes.
#[derive(Debug, Serialize, Deserialize)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TasksListResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

impl GoogleTasksSource {
    pub fn new(credentials_path: impl Into<PathBuf>, token_cache_path: impl Into<PathBuf>) -> Self {
        Self {
            tasklist: "@default".to_string(),
            credentials_path: credentials_path.into(),
            token_cache_path: token_cache_path.into(),
            api_base: "https://tasks.googleapis.com".to_string(),
            token_base: "https://oauth2.googleapis.com".to_string(),
        }
    }

    /// Set the task list to mirror.
    pub fn with_tasklist(mut self, tasklist: String) -> Result<Self> {
        if tasklist.is_empty() {
            return Err(anyhow!("tasklist cannot be empty"));
        }
        self.tasklist = tasklist;
        Ok(self)
    }

    /// Point at a different Tasks API base (tests).
    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base;
        self
    }

    /// Point at a different token endpoint base (tests).
    pub fn with_token_base(mut self, token_base: String) -> Self {
        self.token_base = token_base;
        self
    }

    fn client(&self) -> Result<Client> {
        Client::builder()
            .user_agent(concat!("taskmirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build reqwest client")
    }

    fn list_url(&self) -> String {
        format!(
            "{}/tasks/v1/lists/{}/tasks",
            self.api_base.trim_end_matches('/'),
            self.tasklist
        )
    }

    fn token_url(&self) -> String {
        format!("{}/token", self.token_base.trim_end_matches('/'))
    }

    /// Return a usable access token, refreshing and re-caching when the
    /// cached one is missing or about to expire.
    fn access_token(&self, client: &Client) -> Result<String> {
        if let Some(cached) = self.read_cached_token() {
            if cached.expires_at - Utc::now() > Duration::seconds(EXPIRY_SLACK_SECS) {
                return Ok(cached.access_token);
            }
        }
        self.refresh_token(client)
    }

    fn read_cached_token(&self) -> Option<CachedToken> {
        let text = std::fs::read_to_string(&self.token_cache_path).ok()?;
        // An unreadable cache is not fatal; refresh replaces it.
        serde_json::from_str(&text).ok()
    }

    fn refresh_token(&self, client: &Client) -> Result<String> {
        let creds_text = std::fs::read_to_string(&self.credentials_path).map_err(|e| {
            auth_error(format!(
                "read credentials {}: {e}",
                self.credentials_path.display()
            ))
        })?;
        let creds: StoredCredentials = serde_json::from_str(&creds_text).map_err(|e| {
            auth_error(format!(
                "parse credentials {}: {e}",
                self.credentials_path.display()
            ))
        })?;

        let url = self.token_url();
        let params = [
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("refresh_token", creds.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
            // Narrow the token to read access even if the grant allows more.
            ("scope", TASKS_SCOPE),
        ];
        let resp = client
            .post(&url)
            .form(&params)
            .send()
            .map_err(|e| auth_error(format!("POST {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(auth_error(format!("token refresh failed {status}: {body}")).into());
        }

        let token: TokenResponse = resp
            .json()
            .map_err(|e| auth_error(format!("parse token response: {e}")))?;

        let cached = CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        };
        // The token is good even if the cache can't be written; just warn.
        match serde_json::to_string_pretty(&cached) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.token_cache_path, json) {
                    eprintln!(
                        "WARN: could not write token cache {}: {e}",
                        self.token_cache_path.display()
                    );
                }
            }
            Err(e) => eprintln!("WARN: could not serialize token cache: {e}"),
        }

        Ok(token.access_token)
    }
}

impl TaskSource for GoogleTasksSource {
    fn fetch_all(&self) -> Result<Vec<TaskRecord>> {
        let client = self.client()?;
        let token = self.access_token(&client).context("obtain access token")?;

        let url = build_url_with_params(
            &self.list_url(),
            &[
                ("showCompleted", "true".to_string()),
                ("showHidden", "true".to_string()),
            ],
        )?;
        let url_for_err = url.as_str().to_string();

        let resp = client
            .get(url)
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .send()
            .with_context(|| format!("GET {url_for_err}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(remote_error(format!("Tasks API error {status}: {body}")).into());
        }

        let list: TasksListResponse = resp
            .json()
            .with_context(|| format!("parse json from {url_for_err}"))?;
        parse_items(list.items)
    }
}

/// Decode raw list items into task records, skipping items without an id
/// (the API can surface placeholder rows).
fn parse_items(items: Vec<serde_json::Value>) -> Result<Vec<TaskRecord>> {
    let mut tasks = Vec::with_capacity(items.len());
    for item in items {
        if item.get("id").and_then(|v| v.as_str()).is_none() {
            continue;
        }
        let task: TaskRecord = serde_json::from_value(item)
            .map_err(|e| remote_error(format!("unexpected task shape: {e}")))?;
        tasks.push(task);
    }
    Ok(tasks)
}

fn build_url_with_params(base: &str, params: &[(&str, String)]) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("parse url {base}"))?;
    if !params.is_empty() {
        let mut query = url.query_pairs_mut();
        for (k, v) in params {
            query.append_pair(k, v);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskmirror_error::{ErrorCategory, categorize};
    use taskmirror_schema::TaskStatus;

    fn source_in(dir: &std::path::Path) -> GoogleTasksSource {
        GoogleTasksSource::new(dir.join("credentials.json"), dir.join("token.json"))
    }

    #[test]
    fn with_tasklist_validates_non_empty() {
        let dir = tempfile::tempdir().unwrap();
        let result = source_in(dir.path()).with_tasklist("".to_string());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cannot be empty"));
    }

    #[test]
    fn list_url_includes_tasklist() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_in(dir.path())
            .with_tasklist("MTIz".to_string())
            .unwrap();
        assert_eq!(
            src.list_url(),
            "https://tasks.googleapis.com/tasks/v1/lists/MTIz/tasks"
        );
    }

    #[test]
    fn token_url_trims_trailing_slash() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_in(dir.path()).with_token_base("http://127.0.0.1:1/".to_string());
        assert_eq!(src.token_url(), "http://127.0.0.1:1/token");
    }

    #[test]
    fn cached_token_is_reused_while_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_in(dir.path());
        let cached = CachedToken {
            access_token: "ya29.fresh".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        std::fs::write(
            &src.token_cache_path,
            serde_json::to_string(&cached).unwrap(),
        )
        .unwrap();

        let client = src.client().unwrap();
        let token = src.access_token(&client).unwrap();
        assert_eq!(token, "ya29.fresh");
    }

    #[test]
    fn expired_cache_without_credentials_is_an_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_in(dir.path());
        let cached = CachedToken {
            access_token: "ya29.stale".to_string(),
            expires_at: Utc::now() - Duration::hours(1),
        };
        std::fs::write(
            &src.token_cache_path,
            serde_json::to_string(&cached).unwrap(),
        )
        .unwrap();

        let client = src.client().unwrap();
        let err = src.access_token(&client).unwrap_err();
        assert_eq!(categorize(&err), ErrorCategory::Auth);
    }

    #[test]
    fn garbled_token_cache_falls_through_to_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_in(dir.path());
        std::fs::write(&src.token_cache_path, "not json").unwrap();
        // No credentials file either, so the refresh path reports auth.
        let client = src.client().unwrap();
        let err = src.access_token(&client).unwrap_err();
        assert_eq!(categorize(&err), ErrorCategory::Auth);
    }

    #[test]
    fn unparseable_credentials_are_an_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_in(dir.path());
        std::fs::write(&src.credentials_path, "{\"client_id\": 42}").unwrap();

        let client = src.client().unwrap();
        let err = src.refresh_token(&client).unwrap_err();
        assert_eq!(categorize(&err), ErrorCategory::Auth);
    }

    #[test]
    fn parse_items_skips_rows_without_id() {
        let items = vec![
            serde_json::json!({
                "id": "t1",
                "title": "Buy milk",
                "status": "needsAction",
                "updated": "v1"
            }),
            serde_json::json!({"kind": "tasks#task"}),
            serde_json::json!({
                "id": "t2",
                "title": "Walk dog",
                "status": "completed",
                "updated": "v2",
                "notes": "around the block",
                "due": "2025-03-01T00:00:00.000Z"
            }),
        ];

        let tasks = parse_items(items).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, "t1");
        assert_eq!(tasks[1].status, TaskStatus::Completed);
        assert!(tasks[1].due.is_some());
    }

    #[test]
    fn parse_items_reports_unexpected_shapes_as_remote() {
        let items = vec![serde_json::json!({
            "id": "t1",
            "title": "Buy milk",
            "status": "hidden",
            "updated": "v1"
        })];
        let err = parse_items(items).unwrap_err();
        assert_eq!(categorize(&err), ErrorCategory::Remote);
    }

    #[test]
    fn build_url_with_params_encodes_query_values() {
        let url = build_url_with_params(
            "https://tasks.googleapis.com/tasks/v1/lists/@default/tasks",
            &[("showCompleted", "true".to_string())],
        )
        .unwrap();
        assert_eq!(url.query(), Some("showCompleted=true"));
    }
}
