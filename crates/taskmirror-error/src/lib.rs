//! Categorized errors for taskmirror.
//!
//! The sync loop needs to tell "the remote said no" (log it, keep looping)
//! apart from "credentials are broken" or "the state file is corrupt" (stop
//! the process). Clients raise a `SyncError` at the root of their `anyhow`
//! chains; the app calls [`categorize`] on whatever bubbles out of a pass.

use std::fmt;

/// Failure category for a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Credential acquisition or refresh failed. Fatal: happens before any
    /// work, so nothing is gained by looping on it.
    Auth,
    /// Non-success HTTP status from either service. Retried on the next pass.
    Remote,
    /// The persisted state file exists but does not parse. Fatal: resetting
    /// it silently would re-create every page.
    Format,
    /// Filesystem trouble reading or writing local files.
    Io,
    /// Bad or incomplete configuration.
    Config,
    /// Anything that never passed through a `SyncError`.
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Auth => write!(f, "auth"),
            ErrorCategory::Remote => write!(f, "remote"),
            ErrorCategory::Format => write!(f, "format"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

/// Error carrying a category and a human-readable message.
///
/// Sits at the root of an `anyhow` chain; callers add context on top with
/// `Context` as usual.
#[derive(Debug)]
pub struct SyncError {
    message: String,
    category: ErrorCategory,
}

impl SyncError {
    pub fn new(message: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            message: message.into(),
            category,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

impl std::error::Error for SyncError {}

/// Convenience constructors mirroring the categories.
pub fn auth_error(message: impl Into<String>) -> SyncError {
    SyncError::new(message, ErrorCategory::Auth)
}

pub fn remote_error(message: impl Into<String>) -> SyncError {
    SyncError::new(message, ErrorCategory::Remote)
}

pub fn format_error(message: impl Into<String>) -> SyncError {
    SyncError::new(message, ErrorCategory::Format)
}

pub fn io_error(message: impl Into<String>) -> SyncError {
    SyncError::new(message, ErrorCategory::Io)
}

pub fn config_error(message: impl Into<String>) -> SyncError {
    SyncError::new(message, ErrorCategory::Config)
}

/// Walk an `anyhow` chain and return the category of the first `SyncError`
/// found, or `Unknown` when the chain never touched one.
pub fn categorize(err: &anyhow::Error) -> ErrorCategory {
    for cause in err.chain() {
        if let Some(sync) = cause.downcast_ref::<SyncError>() {
            return sync.category();
        }
    }
    ErrorCategory::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn category_display() {
        assert_eq!(format!("{}", ErrorCategory::Auth), "auth");
        assert_eq!(format!("{}", ErrorCategory::Remote), "remote");
        assert_eq!(format!("{}", ErrorCategory::Format), "format");
    }

    #[test]
    fn display_includes_category_and_message() {
        let err = remote_error("Notion API error 500");
        assert_eq!(err.to_string(), "[remote] Notion API error 500");
    }

    #[test]
    fn categorize_finds_root_through_context_layers() {
        let err = anyhow::Error::new(auth_error("refresh token rejected"))
            .context("obtain access token")
            .context("fetch task list");
        assert_eq!(categorize(&err), ErrorCategory::Auth);
    }

    #[test]
    fn categorize_defaults_to_unknown() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(categorize(&err), ErrorCategory::Unknown);
    }
}
