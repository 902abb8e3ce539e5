// dbdump/src/wizard/selection.rs
//! Toggleable database and table lists shown by the wizard.
//!
//! Each selected database contributes a synthetic "All" entry to the table list. While that
//! entry is on, no individual table of the same database can be toggled on.

use std::collections::HashSet;

use super::scope::TableSelection;

/// Label of the synthetic entry meaning "every table in this database".
pub const ALL_TABLES: &str = "All";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    /// Owning database, set for table entries only.
    pub database: Option<String>,
    pub selected: bool,
    all_marker: bool,
}

impl CatalogEntry {
    pub fn database(name: impl Into<String>) -> Self {
        CatalogEntry {
            name: name.into(),
            database: None,
            selected: false,
            all_marker: false,
        }
    }

    pub fn table(database: impl Into<String>, name: impl Into<String>) -> Self {
        CatalogEntry {
            name: name.into(),
            database: Some(database.into()),
            selected: false,
            all_marker: false,
        }
    }

    fn all_tables(database: impl Into<String>) -> Self {
        CatalogEntry {
            name: ALL_TABLES.to_string(),
            database: Some(database.into()),
            selected: false,
            all_marker: true,
        }
    }

    /// True for the synthetic "All" entry, never for a real table that happens to be named "All".
    pub fn is_all_marker(&self) -> bool {
        self.all_marker
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseList {
    entries: Vec<CatalogEntry>,
}

impl DatabaseList {
    /// `preselect` starts toggled on when it appears among `names`.
    pub fn new(names: Vec<String>, preselect: Option<&str>) -> Self {
        let entries = names
            .into_iter()
            .map(|name| {
                let mut entry = CatalogEntry::database(name);
                entry.selected = preselect == Some(entry.name.as_str());
                entry
            })
            .collect();
        DatabaseList { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn toggle(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.selected = !entry.selected;
        }
    }

    pub fn any_selected(&self) -> bool {
        self.entries.iter().any(|e| e.selected)
    }

    /// Selected names in list order.
    pub fn selected_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.selected)
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn clear_selection(&mut self) {
        for entry in &mut self.entries {
            entry.selected = false;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableList {
    entries: Vec<CatalogEntry>,
    all_selected: HashSet<String>,
}

impl TableList {
    /// Appends one database's tables, led by its "All" entry.
    pub fn push_database(&mut self, database: &str, tables: Vec<String>) {
        self.entries.push(CatalogEntry::all_tables(database));
        self.entries
            .extend(tables.into_iter().map(|t| CatalogEntry::table(database, t)));
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn is_all_selected(&self, database: &str) -> bool {
        self.all_selected.contains(database)
    }

    /// Flips the entry at `index`. Returns whether anything changed.
    pub fn toggle(&mut self, index: usize) -> bool {
        let Some(entry) = self.entries.get(index) else {
            return false;
        };
        let Some(database) = entry.database.clone() else {
            return false;
        };

        if entry.is_all_marker() {
            if entry.selected {
                self.all_selected.remove(&database);
                self.entries[index].selected = false;
            } else {
                self.all_selected.insert(database.clone());
                for sibling in self
                    .entries
                    .iter_mut()
                    .filter(|e| e.database.as_deref() == Some(database.as_str()))
                {
                    sibling.selected = false;
                }
                self.entries[index].selected = true;
            }
            return true;
        }

        if self.all_selected.contains(&database) {
            return false;
        }
        let entry = &mut self.entries[index];
        entry.selected = !entry.selected;
        true
    }

    pub fn any_selected(&self) -> bool {
        self.entries.iter().any(|e| e.selected)
    }

    /// What was picked for `database`, or `None` when nothing was.
    pub fn selection_for(&self, database: &str) -> Option<TableSelection> {
        if self.all_selected.contains(database) {
            return Some(TableSelection::All);
        }
        let tables: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.selected && !e.is_all_marker() && e.database.as_deref() == Some(database))
            .map(|e| e.name.clone())
            .collect();
        if tables.is_empty() {
            None
        } else {
            Some(TableSelection::Only(tables))
        }
    }
}
