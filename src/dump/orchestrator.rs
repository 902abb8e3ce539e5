// dbdump/src/dump/orchestrator.rs
use chrono::Local;
use std::fmt;
use std::path::PathBuf;
use tracing::{error, info};

use super::{DumpRequest, StrategyTable};
use crate::wizard::ValidatedScope;

const RUN_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H_%M_%S";

/// Result of dumping one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpOutcome {
    pub database: String,
    pub success: bool,
    pub message: Option<String>,
    pub output: Option<PathBuf>,
}

impl DumpOutcome {
    fn succeeded(database: &str, output: PathBuf) -> Self {
        DumpOutcome {
            database: database.to_string(),
            success: true,
            message: None,
            output: Some(output),
        }
    }

    fn failed(database: &str, message: String) -> Self {
        DumpOutcome {
            database: database.to_string(),
            success: false,
            message: Some(message),
            output: None,
        }
    }
}

impl fmt::Display for DumpOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.output, &self.message) {
            (Some(path), _) if self.success => {
                write!(f, "✅ {}: dumped to {}", self.database, path.display())
            }
            (_, Some(message)) => write!(f, "❌ {}: {}", self.database, message),
            _ => write!(f, "❌ {}: dump failed", self.database),
        }
    }
}

/// All outcomes of one orchestration run, in database selection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpReport {
    pub outcomes: Vec<DumpOutcome>,
    pub success: bool,
}

impl DumpReport {
    fn from_outcomes(outcomes: Vec<DumpOutcome>) -> Self {
        let success = outcomes.iter().all(|o| o.success);
        DumpReport { outcomes, success }
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }

    /// One line per database, then the overall line.
    pub fn status_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.outcomes.iter().map(ToString::to_string).collect();
        if self.success {
            lines.push(format!(
                "✅ Dump completed successfully ({} database(s))",
                self.outcomes.len()
            ));
        } else {
            lines.push(format!(
                "❌ Dump finished with errors: {} of {} database(s) failed",
                self.failed_count(),
                self.outcomes.len()
            ));
        }
        lines
    }
}

/// File name for one database within one run.
///
/// Path separators in the database name become `_`, so the result is always a single file name.
pub fn dump_filename(database: &str, run_timestamp: &str) -> String {
    let safe: String = database
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    format!("{}-{}.sql", safe, run_timestamp)
}

/// Runs the driver strategy for every selected database, one after another.
pub struct DumpOrchestrator {
    strategies: StrategyTable,
    run_timestamp: String,
}

impl DumpOrchestrator {
    pub fn new(strategies: StrategyTable) -> Self {
        Self::with_timestamp(strategies, Local::now().format(RUN_TIMESTAMP_FORMAT).to_string())
    }

    pub fn with_timestamp(strategies: StrategyTable, run_timestamp: impl Into<String>) -> Self {
        DumpOrchestrator {
            strategies,
            run_timestamp: run_timestamp.into(),
        }
    }

    pub fn run_timestamp(&self) -> &str {
        &self.run_timestamp
    }

    /// Dumps each database of `scope`. A failure is recorded and the next database is still attempted.
    pub async fn run(&self, scope: &ValidatedScope) -> DumpReport {
        let connection = scope.connection();
        let mut outcomes = Vec::with_capacity(scope.targets().len());

        for target in scope.targets() {
            let database = target.database.as_str();
            let strategy = match self.strategies.resolve(&connection.driver) {
                Ok(strategy) => strategy,
                Err(e) => {
                    error!(database, driver = %connection.driver, "No dump strategy for driver");
                    outcomes.push(DumpOutcome::failed(database, e.to_string()));
                    continue;
                }
            };

            let filename = dump_filename(database, &self.run_timestamp);
            let request = DumpRequest {
                connection,
                database,
                tables: &target.tables,
                destination: scope.destination(),
                filename: &filename,
            };

            info!(database, tables = ?target.tables, "Dumping database");
            match strategy.dump(&request).await {
                Ok(path) => {
                    info!(database, path = %path.display(), "Dump written");
                    outcomes.push(DumpOutcome::succeeded(database, path));
                }
                Err(e) => {
                    error!(database, error = %e, "Dump failed");
                    outcomes.push(DumpOutcome::failed(database, e.to_string()));
                }
            }
        }

        DumpReport::from_outcomes(outcomes)
    }
}
