// dbdump/src/wizard/scope.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::ConnectionProfile;
use crate::errors::ValidationError;

/// Tables chosen for one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSelection {
    /// Every table in the database; the dump applies no table filter.
    All,
    /// Exactly these tables, in pick order.
    Only(Vec<String>),
}

impl TableSelection {
    pub fn is_empty(&self) -> bool {
        matches!(self, TableSelection::Only(tables) if tables.is_empty())
    }
}

/// Everything the operator has picked so far in one wizard run.
#[derive(Debug, Clone, Default)]
pub struct SelectionScope {
    connection: Option<ConnectionProfile>,
    databases: Vec<String>,
    tables: HashMap<String, TableSelection>,
    destination: String,
}

impl SelectionScope {
    pub fn connection(&self) -> Option<&ConnectionProfile> {
        self.connection.as_ref()
    }

    pub fn set_connection(&mut self, connection: ConnectionProfile) {
        self.connection = Some(connection);
    }

    /// Drops the connection together with everything chosen under it.
    pub fn clear_connection(&mut self) {
        self.connection = None;
        self.clear_databases();
    }

    pub fn databases(&self) -> &[String] {
        &self.databases
    }

    /// Returns `false` if the database was already selected.
    pub fn add_database(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.databases.contains(&name) {
            return false;
        }
        self.databases.push(name);
        true
    }

    pub fn clear_databases(&mut self) {
        self.databases.clear();
        self.tables.clear();
    }

    pub fn tables_for(&self, database: &str) -> Option<&TableSelection> {
        self.tables.get(database)
    }

    /// Replaces any individual picks for `database` with the all-tables marker.
    pub fn select_all_tables(&mut self, database: &str) -> bool {
        if !self.databases.iter().any(|d| d == database) {
            return false;
        }
        self.tables.insert(database.to_string(), TableSelection::All);
        true
    }

    /// Records one table. Rejected while the all-tables marker is set for `database`,
    /// for databases not in the scope, and for repeats.
    pub fn add_table(&mut self, database: &str, table: impl Into<String>) -> bool {
        if !self.databases.iter().any(|d| d == database) {
            return false;
        }
        let table = table.into();
        match self
            .tables
            .entry(database.to_string())
            .or_insert_with(|| TableSelection::Only(Vec::new()))
        {
            TableSelection::All => false,
            TableSelection::Only(tables) => {
                if tables.contains(&table) {
                    false
                } else {
                    tables.push(table);
                    true
                }
            }
        }
    }

    pub fn clear_tables(&mut self) {
        self.tables.clear();
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn set_destination(&mut self, destination: impl Into<String>) {
        self.destination = destination.into();
    }
}

/// One database to dump together with its table filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpTarget {
    pub database: String,
    pub tables: TableSelection,
}

/// A scope that passed [`validate`]. Only constructible through it.
#[derive(Debug, Clone)]
pub struct ValidatedScope {
    connection: ConnectionProfile,
    targets: Vec<DumpTarget>,
    destination: PathBuf,
}

impl ValidatedScope {
    pub fn connection(&self) -> &ConnectionProfile {
        &self.connection
    }

    /// Targets in database selection order.
    pub fn targets(&self) -> &[DumpTarget] {
        &self.targets
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Checks connection, databases, per-database tables, destination; in that order.
pub fn validate(scope: &SelectionScope) -> Result<ValidatedScope, ValidationError> {
    let connection = scope
        .connection
        .clone()
        .ok_or(ValidationError::NoConnection)?;

    if scope.databases.is_empty() {
        return Err(ValidationError::NoDatabases);
    }

    let mut targets = Vec::with_capacity(scope.databases.len());
    for database in &scope.databases {
        match scope.tables.get(database) {
            Some(tables) if !tables.is_empty() => targets.push(DumpTarget {
                database: database.clone(),
                tables: tables.clone(),
            }),
            _ => return Err(ValidationError::EmptyTableSelection(database.clone())),
        }
    }

    let destination = scope.destination.trim();
    if destination.is_empty() {
        return Err(ValidationError::NoDestination);
    }

    Ok(ValidatedScope {
        connection,
        targets,
        destination: PathBuf::from(destination),
    })
}
