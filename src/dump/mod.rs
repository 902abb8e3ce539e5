// dbdump/src/dump/mod.rs
pub(crate) mod mysql; // mysqldump, shell-invoked
pub(crate) mod orchestrator;
pub(crate) mod postgres; // pg_dump, shell-invoked
pub(crate) mod sqlite; // library-mediated through sqlx

pub use mysql::MysqlDumpTool;
pub use orchestrator::{dump_filename, DumpOrchestrator, DumpOutcome, DumpReport};
pub use postgres::PgDumpTool;
pub use sqlite::SqliteLibraryDump;

use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;
use which::which;

use crate::config::ConnectionProfile;
use crate::driver::Driver;
use crate::errors::{redact, DumpError};
use crate::wizard::TableSelection;

/// Everything one strategy needs to dump one database.
#[derive(Debug, Clone, Copy)]
pub struct DumpRequest<'a> {
    pub connection: &'a ConnectionProfile,
    pub database: &'a str,
    pub tables: &'a TableSelection,
    pub destination: &'a Path,
    pub filename: &'a str,
}

/// Produces one backup artifact for one database and returns where it was written.
///
/// Implementations own quoting of identifiers and must keep the password out of any error.
#[async_trait]
pub trait DumpStrategy: Send + Sync {
    async fn dump(&self, request: &DumpRequest<'_>) -> Result<PathBuf, DumpError>;
}

/// Strategy lookup keyed by driver.
#[derive(Default)]
pub struct StrategyTable {
    strategies: HashMap<Driver, Box<dyn DumpStrategy>>,
}

impl StrategyTable {
    /// The strategies shipped with the binary.
    pub fn with_defaults() -> Self {
        let mut table = StrategyTable::default();
        table.register(Driver::Mysql, MysqlDumpTool);
        table.register(Driver::Postgres, PgDumpTool);
        table.register(Driver::Sqlite, SqliteLibraryDump);
        table
    }

    pub fn register(&mut self, driver: Driver, strategy: impl DumpStrategy + 'static) {
        self.strategies.insert(driver, Box::new(strategy));
    }

    /// Resolves a configured driver identifier. Unknown or unregistered drivers are `UnsupportedDriver`.
    pub fn resolve(&self, driver_id: &str) -> Result<&dyn DumpStrategy, DumpError> {
        let driver = driver_id
            .parse::<Driver>()
            .map_err(DumpError::UnsupportedDriver)?;
        self.strategies
            .get(&driver)
            .map(|s| s.as_ref())
            .ok_or_else(|| DumpError::UnsupportedDriver(driver_id.to_string()))
    }
}

/// Creates the destination directory and returns the full output path.
///
/// The file name must be a single plain path component so the output stays inside the destination.
pub(crate) fn prepare_output(request: &DumpRequest<'_>) -> Result<PathBuf, DumpError> {
    check_file_name(request.filename)?;
    fs::create_dir_all(request.destination).map_err(|source| DumpError::Io {
        path: request.destination.to_path_buf(),
        source,
    })?;
    Ok(request.destination.join(request.filename))
}

/// Locates a client tool in PATH.
pub(crate) fn find_executable(tool: &'static str) -> Result<PathBuf, DumpError> {
    which(tool).map_err(|_| DumpError::ToolNotFound { tool })
}

/// Runs a dump tool to completion. The password travels only through `password_env`,
/// and is scrubbed from stderr before it becomes part of an error.
pub(crate) async fn run_tool(
    tool: &'static str,
    args: Vec<OsString>,
    password_env: &str,
    password: &str,
) -> Result<(), DumpError> {
    let executable = find_executable(tool)?;
    debug!(tool, executable = %executable.display(), ?args, "Running dump tool");

    let mut command = Command::new(&executable);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if !password.is_empty() {
        command.env(password_env, password);
    }

    let output = command
        .output()
        .await
        .map_err(|source| DumpError::Spawn { tool, source })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DumpError::ToolFailed {
            tool,
            status: output.status.to_string(),
            stderr: redact(stderr.trim(), password),
        });
    }
    Ok(())
}

/// Names handed to dump tools as positional arguments must not look like options.
pub(crate) fn check_name(name: &str) -> Result<(), DumpError> {
    if name.is_empty() || name.starts_with('-') || name.contains('\0') {
        return Err(DumpError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Rejects anything that is not exactly one normal path component.
pub(crate) fn check_file_name(name: &str) -> Result<(), DumpError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name && !name.contains('\\') => Ok(()),
        _ => Err(DumpError::InvalidName(name.to_string())),
    }
}

/// Double-quoted SQL identifier with embedded quotes doubled.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
