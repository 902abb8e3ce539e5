// dbdump/src/wizard/machine.rs
//! The selection wizard as a plain state machine.
//!
//! Input arrives as [`WizardAction`]s, one at a time. Catalog lookups happen inside
//! [`Wizard::handle`], so no further action is processed until they return.

use tracing::{debug, info};

use super::scope::{SelectionScope, TableSelection};
use super::selection::{CatalogEntry, DatabaseList, TableList};
use crate::catalog::CatalogReader;
use crate::config::{ConnectionProfile, ConnectionRegistry};
use crate::errors::{CatalogError, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardState {
    ChoosingConnection,
    ChoosingDatabases,
    ChoosingTables,
    TypingPath,
    Finished,
    Cancelled,
}

impl WizardState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WizardState::Finished | WizardState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardAction {
    Up,
    Down,
    Toggle,
    Confirm,
    Back,
    Input(char),
    DeleteChar,
    Abort,
}

/// What a list screen shows, one variant per screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListItem<'a> {
    Connection(&'a ConnectionProfile),
    Database(&'a CatalogEntry),
    Table(&'a CatalogEntry),
}

pub struct Wizard {
    connections: Vec<ConnectionProfile>,
    default_destination: String,
    state: WizardState,
    cursor: usize,
    databases: DatabaseList,
    tables: TableList,
    path_input: String,
    scope: SelectionScope,
    status: Option<String>,
}

impl Wizard {
    pub fn new(registry: &dyn ConnectionRegistry, default_destination: impl Into<String>) -> Self {
        Wizard {
            connections: registry.list_connections(),
            default_destination: default_destination.into(),
            state: WizardState::ChoosingConnection,
            cursor: 0,
            databases: DatabaseList::default(),
            tables: TableList::default(),
            path_input: String::new(),
            scope: SelectionScope::default(),
            status: None,
        }
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn path_input(&self) -> &str {
        &self.path_input
    }

    pub fn default_destination(&self) -> &str {
        &self.default_destination
    }

    /// Last message worth showing the operator (e.g. why a screen was reopened).
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn scope(&self) -> &SelectionScope {
        &self.scope
    }

    pub fn items(&self) -> Vec<ListItem<'_>> {
        match self.state {
            WizardState::ChoosingConnection => {
                self.connections.iter().map(ListItem::Connection).collect()
            }
            WizardState::ChoosingDatabases => {
                self.databases.entries().iter().map(ListItem::Database).collect()
            }
            WizardState::ChoosingTables => {
                self.tables.entries().iter().map(ListItem::Table).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Applies one action and returns the resulting state.
    ///
    /// Catalog failures are returned as-is and leave the wizard where it was; the caller ends the run.
    pub async fn handle(
        &mut self,
        action: WizardAction,
        catalog: &dyn CatalogReader,
    ) -> Result<WizardState, CatalogError> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }
        if action == WizardAction::Abort {
            debug!(from = ?self.state, "Wizard aborted");
            self.state = WizardState::Cancelled;
            return Ok(self.state);
        }

        match self.state {
            WizardState::ChoosingConnection => self.on_connection_screen(action, catalog).await?,
            WizardState::ChoosingDatabases => self.on_database_screen(action, catalog).await?,
            WizardState::ChoosingTables => self.on_table_screen(action),
            WizardState::TypingPath => self.on_path_screen(action),
            WizardState::Finished | WizardState::Cancelled => {}
        }
        Ok(self.state)
    }

    /// Sends the operator back to the screen responsible for `error`.
    pub fn reopen(&mut self, error: &ValidationError) {
        self.status = Some(error.to_string());
        match error {
            ValidationError::NoConnection => {
                self.databases = DatabaseList::default();
                self.tables = TableList::default();
                self.scope = SelectionScope::default();
                self.enter(WizardState::ChoosingConnection);
            }
            ValidationError::NoDatabases => {
                self.tables = TableList::default();
                self.scope.clear_databases();
                self.enter(WizardState::ChoosingDatabases);
            }
            ValidationError::EmptyTableSelection(_) => {
                self.scope.clear_tables();
                self.enter(WizardState::ChoosingTables);
            }
            ValidationError::NoDestination => {
                self.path_input.clear();
                self.enter(WizardState::TypingPath);
            }
        }
    }

    fn enter(&mut self, state: WizardState) {
        debug!(from = ?self.state, to = ?state, "Wizard transition");
        self.state = state;
        self.cursor = 0;
    }

    fn move_cursor(&mut self, action: WizardAction) {
        let len = self.items().len();
        match action {
            WizardAction::Up => self.cursor = self.cursor.saturating_sub(1),
            WizardAction::Down if self.cursor + 1 < len => self.cursor += 1,
            _ => {}
        }
    }

    async fn on_connection_screen(
        &mut self,
        action: WizardAction,
        catalog: &dyn CatalogReader,
    ) -> Result<(), CatalogError> {
        match action {
            WizardAction::Up | WizardAction::Down => self.move_cursor(action),
            WizardAction::Confirm => {
                let Some(profile) = self.connections.get(self.cursor).cloned() else {
                    return Ok(());
                };
                info!(tag = %profile.tag, "Fetching databases");
                let names = catalog.list_databases(&profile).await?;
                self.databases = DatabaseList::new(names, profile.default_database.as_deref());
                self.tables = TableList::default();
                self.scope = SelectionScope::default();
                self.scope.set_connection(profile);
                self.status = None;
                self.enter(WizardState::ChoosingDatabases);
            }
            _ => {}
        }
        Ok(())
    }

    async fn on_database_screen(
        &mut self,
        action: WizardAction,
        catalog: &dyn CatalogReader,
    ) -> Result<(), CatalogError> {
        match action {
            WizardAction::Up | WizardAction::Down => self.move_cursor(action),
            WizardAction::Toggle => {
                let on_entry = matches!(self.items().get(self.cursor), Some(ListItem::Database(_)));
                if on_entry {
                    self.databases.toggle(self.cursor);
                }
            }
            WizardAction::Confirm => {
                if !self.databases.any_selected() {
                    return Ok(());
                }
                let Some(profile) = self.scope.connection().cloned() else {
                    return Ok(());
                };
                let selected = self.databases.selected_names();
                let mut tables = TableList::default();
                for database in &selected {
                    info!(database = %database, "Fetching tables");
                    let names = catalog.list_tables(database, &profile).await?;
                    tables.push_database(database, names);
                }
                self.scope.clear_databases();
                for database in selected {
                    self.scope.add_database(database);
                }
                self.tables = tables;
                self.status = None;
                self.enter(WizardState::ChoosingTables);
            }
            WizardAction::Back => {
                self.databases = DatabaseList::default();
                self.tables = TableList::default();
                self.scope.clear_connection();
                self.enter(WizardState::ChoosingConnection);
            }
            _ => {}
        }
        Ok(())
    }

    fn on_table_screen(&mut self, action: WizardAction) {
        match action {
            WizardAction::Up | WizardAction::Down => self.move_cursor(action),
            WizardAction::Toggle => {
                let on_entry = matches!(self.items().get(self.cursor), Some(ListItem::Table(_)));
                if on_entry {
                    self.tables.toggle(self.cursor);
                }
            }
            WizardAction::Confirm => {
                if !self.tables.any_selected() {
                    return;
                }
                self.scope.clear_tables();
                let databases = self.scope.databases().to_vec();
                for database in &databases {
                    match self.tables.selection_for(database) {
                        Some(TableSelection::All) => {
                            self.scope.select_all_tables(database);
                        }
                        Some(TableSelection::Only(names)) => {
                            for name in names {
                                self.scope.add_table(database, name);
                            }
                        }
                        None => {}
                    }
                }
                self.path_input.clear();
                self.status = None;
                self.enter(WizardState::TypingPath);
            }
            WizardAction::Back => {
                self.tables = TableList::default();
                self.databases.clear_selection();
                self.scope.clear_databases();
                self.enter(WizardState::ChoosingDatabases);
            }
            _ => {}
        }
    }

    fn on_path_screen(&mut self, action: WizardAction) {
        match action {
            WizardAction::Input(c) => self.path_input.push(c),
            WizardAction::DeleteChar => {
                self.path_input.pop();
            }
            WizardAction::Confirm => {
                let typed = self.path_input.trim();
                let destination = if typed.is_empty() {
                    self.default_destination.clone()
                } else {
                    typed.to_string()
                };
                self.scope.set_destination(destination);
                self.status = None;
                self.enter(WizardState::Finished);
            }
            WizardAction::Back => {
                self.path_input.clear();
                self.scope.clear_tables();
                self.scope.set_destination("");
                self.enter(WizardState::ChoosingTables);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeCatalog {
        databases: Vec<String>,
        tables: HashMap<String, Vec<String>>,
        fail_databases: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeCatalog {
        fn new() -> Self {
            let mut tables = HashMap::new();
            tables.insert("shop".to_string(), vec!["orders".to_string(), "customers".to_string()]);
            tables.insert("logs".to_string(), vec!["events".to_string()]);
            FakeCatalog {
                databases: vec!["shop".into(), "logs".into(), "scratch".into()],
                tables,
                fail_databases: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl CatalogReader for FakeCatalog {
        async fn list_databases(&self, conn: &ConnectionProfile) -> Result<Vec<String>, CatalogError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(format!("databases:{}", conn.tag));
            }
            if self.fail_databases {
                return Err(CatalogError::Connect {
                    target: conn.endpoint(),
                    reason: "refused".into(),
                });
            }
            Ok(self.databases.clone())
        }

        async fn list_tables(
            &self,
            database: &str,
            _conn: &ConnectionProfile,
        ) -> Result<Vec<String>, CatalogError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(format!("tables:{}", database));
            }
            Ok(self.tables.get(database).cloned().unwrap_or_default())
        }
    }

    fn profiles() -> Vec<ConnectionProfile> {
        vec![
            ConnectionProfile {
                tag: "prod".into(),
                host: "db.local".into(),
                user: "root".into(),
                password: "secret".into(),
                port: Some(3306),
                driver: "mysql".into(),
                default_database: None,
            },
            ConnectionProfile {
                tag: "stage".into(),
                host: "stage.local".into(),
                user: "root".into(),
                password: "secret".into(),
                port: None,
                driver: "mysql".into(),
                default_database: Some("logs".into()),
            },
        ]
    }

    async fn run(
        wizard: &mut Wizard,
        catalog: &FakeCatalog,
        actions: &[WizardAction],
    ) -> Result<WizardState, CatalogError> {
        let mut state = wizard.state();
        for action in actions {
            state = wizard.handle(*action, catalog).await?;
        }
        Ok(state)
    }

    use WizardAction::*;

    #[tokio::test]
    async fn test_full_walk_to_finished() -> anyhow::Result<()> {
        let catalog = FakeCatalog::new();
        let mut wizard = Wizard::new(&profiles(), "/var/backups");

        // prod → shop + logs → shop.orders + logs.All → typed path
        let state = run(
            &mut wizard,
            &catalog,
            &[Confirm, Toggle, Down, Toggle, Confirm, Down, Toggle, Down, Down, Toggle, Confirm],
        )
        .await?;
        assert_eq!(state, WizardState::TypingPath);

        for c in "/tmp/out".chars() {
            wizard.handle(Input(c), &catalog).await?;
        }
        assert_eq!(wizard.handle(Confirm, &catalog).await?, WizardState::Finished);

        let scope = wizard.scope();
        assert_eq!(scope.connection().map(|c| c.tag.as_str()), Some("prod"));
        assert_eq!(scope.databases(), &["shop".to_string(), "logs".to_string()]);
        assert_eq!(
            scope.tables_for("shop"),
            Some(&TableSelection::Only(vec!["orders".into()]))
        );
        assert_eq!(scope.tables_for("logs"), Some(&TableSelection::All));
        assert_eq!(scope.destination(), "/tmp/out");
        assert_eq!(
            catalog.calls(),
            vec!["databases:prod", "tables:shop", "tables:logs"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_confirm_without_selection_is_noop() -> anyhow::Result<()> {
        let catalog = FakeCatalog::new();
        let mut wizard = Wizard::new(&profiles(), ".");
        assert_eq!(run(&mut wizard, &catalog, &[Confirm, Confirm]).await?, WizardState::ChoosingDatabases);

        run(&mut wizard, &catalog, &[Toggle, Confirm]).await?;
        assert_eq!(wizard.handle(Confirm, &catalog).await?, WizardState::ChoosingTables);
        assert_eq!(wizard.status(), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_default_database_is_preselected() -> anyhow::Result<()> {
        let catalog = FakeCatalog::new();
        let mut wizard = Wizard::new(&profiles(), ".");
        run(&mut wizard, &catalog, &[Down, Confirm]).await?;

        let selected: Vec<&str> = wizard
            .items()
            .into_iter()
            .filter_map(|item| match item {
                ListItem::Database(entry) if entry.selected => Some(entry.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(selected, vec!["logs"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_path_uses_default_destination() -> anyhow::Result<()> {
        let catalog = FakeCatalog::new();
        let mut wizard = Wizard::new(&profiles(), "/var/backups");
        let state = run(&mut wizard, &catalog, &[Confirm, Toggle, Confirm, Toggle, Confirm, Confirm]).await?;
        assert_eq!(state, WizardState::Finished);
        assert_eq!(wizard.scope().destination(), "/var/backups");
        Ok(())
    }

    #[tokio::test]
    async fn test_back_from_tables_discards_database_selection() -> anyhow::Result<()> {
        let catalog = FakeCatalog::new();
        let mut wizard = Wizard::new(&profiles(), ".");
        run(&mut wizard, &catalog, &[Confirm, Toggle, Down, Toggle, Confirm, Toggle]).await?;
        assert_eq!(wizard.state(), WizardState::ChoosingTables);

        assert_eq!(wizard.handle(Back, &catalog).await?, WizardState::ChoosingDatabases);
        assert!(wizard.scope().databases().is_empty());
        assert!(wizard.items().iter().all(|item| matches!(item, ListItem::Database(e) if !e.selected)));
        assert_eq!(wizard.cursor(), 0);

        // Nothing selected any more, so confirming stays put.
        assert_eq!(wizard.handle(Confirm, &catalog).await?, WizardState::ChoosingDatabases);
        Ok(())
    }

    #[tokio::test]
    async fn test_back_from_databases_returns_to_connections() -> anyhow::Result<()> {
        let catalog = FakeCatalog::new();
        let mut wizard = Wizard::new(&profiles(), ".");
        run(&mut wizard, &catalog, &[Confirm, Toggle, Back]).await?;
        assert_eq!(wizard.state(), WizardState::ChoosingConnection);
        assert!(wizard.scope().connection().is_none());
        assert_eq!(wizard.items().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_back_from_path_discards_typed_value() -> anyhow::Result<()> {
        let catalog = FakeCatalog::new();
        let mut wizard = Wizard::new(&profiles(), ".");
        run(&mut wizard, &catalog, &[Confirm, Toggle, Confirm, Toggle, Confirm, Input('x'), Back]).await?;
        assert_eq!(wizard.state(), WizardState::ChoosingTables);
        assert_eq!(wizard.path_input(), "");

        // Table toggles survive the round trip.
        assert_eq!(wizard.handle(Confirm, &catalog).await?, WizardState::TypingPath);
        assert_eq!(wizard.scope().tables_for("shop"), Some(&TableSelection::All));
        Ok(())
    }

    #[tokio::test]
    async fn test_abort_from_any_screen_cancels() -> anyhow::Result<()> {
        let catalog = FakeCatalog::new();
        let prefixes: [&[WizardAction]; 4] = [
            &[],
            &[Confirm],
            &[Confirm, Toggle, Confirm],
            &[Confirm, Toggle, Confirm, Toggle, Confirm],
        ];
        for prefix in prefixes {
            let mut wizard = Wizard::new(&profiles(), ".");
            run(&mut wizard, &catalog, prefix).await?;
            assert_eq!(wizard.handle(Abort, &catalog).await?, WizardState::Cancelled);
            // Terminal: nothing moves it any more.
            assert_eq!(wizard.handle(Confirm, &catalog).await?, WizardState::Cancelled);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_catalog_failure_surfaces_and_keeps_state() {
        let mut catalog = FakeCatalog::new();
        catalog.fail_databases = true;
        let mut wizard = Wizard::new(&profiles(), ".");
        let result = wizard.handle(Confirm, &catalog).await;
        assert!(matches!(result, Err(CatalogError::Connect { .. })));
        assert_eq!(wizard.state(), WizardState::ChoosingConnection);
    }

    #[tokio::test]
    async fn test_toggle_individual_table_under_all_is_ignored() -> anyhow::Result<()> {
        let catalog = FakeCatalog::new();
        let mut wizard = Wizard::new(&profiles(), ".");
        run(&mut wizard, &catalog, &[Confirm, Toggle, Confirm, Toggle, Down, Toggle]).await?;

        let flags: Vec<bool> = wizard
            .items()
            .into_iter()
            .map(|item| matches!(item, ListItem::Table(e) if e.selected))
            .collect();
        assert_eq!(flags, vec![true, false, false]);
        Ok(())
    }

    #[tokio::test]
    async fn test_reopen_routes_to_offending_screen() -> anyhow::Result<()> {
        let catalog = FakeCatalog::new();
        let mut wizard = Wizard::new(&profiles(), ".");
        run(&mut wizard, &catalog, &[Confirm, Toggle, Down, Toggle, Confirm, Toggle, Confirm, Confirm]).await?;
        assert_eq!(wizard.state(), WizardState::Finished);

        wizard.reopen(&ValidationError::EmptyTableSelection("logs".into()));
        assert_eq!(wizard.state(), WizardState::ChoosingTables);
        assert_eq!(wizard.status(), Some("No tables selected for database 'logs'"));
        assert!(wizard.scope().tables_for("shop").is_none());

        wizard.reopen(&ValidationError::NoDestination);
        assert_eq!(wizard.state(), WizardState::TypingPath);
        Ok(())
    }

    #[tokio::test]
    async fn test_cursor_is_clamped() -> anyhow::Result<()> {
        let catalog = FakeCatalog::new();
        let mut wizard = Wizard::new(&profiles(), ".");
        run(&mut wizard, &catalog, &[Up, Down, Down, Down]).await?;
        assert_eq!(wizard.cursor(), 1);
        run(&mut wizard, &catalog, &[Up, Up]).await?;
        assert_eq!(wizard.cursor(), 0);
        Ok(())
    }
}
