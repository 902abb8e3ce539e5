// dbdump/src/errors.rs
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Failure while enumerating databases or tables through a live connection.
///
/// Fatal to the current wizard run: nothing gets dumped once one of these surfaces.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    #[error("Catalog query failed on {target}: {reason}")]
    Query { target: String, reason: String },

    #[error("No catalog reader for driver '{0}'")]
    UnsupportedDriver(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// First violated condition of a selection scope, checked in declaration order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No connection selected")]
    NoConnection,

    #[error("No database selected")]
    NoDatabases,

    #[error("No tables selected for database '{0}'")]
    EmptyTableSelection(String),

    #[error("No destination path given")]
    NoDestination,
}

/// Per-database failure during orchestration. Recorded in that database's outcome.
#[derive(Error, Debug)]
pub enum DumpError {
    #[error("Unsupported driver '{0}'")]
    UnsupportedDriver(String),

    #[error("Refusing to pass '{0}' to a dump tool")]
    InvalidName(String),

    #[error("{tool} executable not found in PATH. Please ensure the client tools are installed")]
    ToolNotFound { tool: &'static str },

    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(String),
}

/// Errors that end a `dump` run before or instead of orchestration.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Terminal I/O error: {0}")]
    Terminal(#[from] std::io::Error),

    #[error("No stored connections found in configuration")]
    NoConnections,
}

/// Replaces every occurrence of `secret` in `text` with `****`.
///
/// Used on anything an external tool or driver prints back before it ends up in a diagnostic.
/// The percent-encoded form that connection URLs carry is scrubbed as well.
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    let mut redacted = text.replace(secret, "****");
    if let Some(encoded) = url_encoded_password(secret).filter(|e| e != secret) {
        redacted = redacted.replace(&encoded, "****");
    }
    redacted
}

/// The secret as it appears in the userinfo part of a URL.
fn url_encoded_password(secret: &str) -> Option<String> {
    let mut url = Url::parse("scheme://user@localhost").ok()?;
    url.set_password(Some(secret)).ok()?;
    url.password().map(str::to_string)
}
