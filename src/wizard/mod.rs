// dbdump/src/wizard/mod.rs
pub mod machine;
pub mod scope;
pub mod selection;
pub mod terminal;

pub use machine::{ListItem, Wizard, WizardAction, WizardState};
pub use scope::{validate, DumpTarget, SelectionScope, TableSelection, ValidatedScope};
pub use selection::{CatalogEntry, ALL_TABLES};

use tracing::debug;

use crate::catalog::CatalogReader;
use crate::errors::AppError;

/// Where wizard input comes from: the terminal in the binary, a script in tests.
pub trait ActionSource {
    /// Shows the current screen (if the source has one) and blocks for the next action.
    fn next_action(&mut self, wizard: &Wizard) -> std::io::Result<WizardAction>;
}

/// Runs the wizard until the operator finishes with a valid scope or cancels.
///
/// Returns `Ok(None)` on cancellation. A finished scope that fails validation sends the
/// operator back to the offending screen instead of ending the run.
pub async fn run_wizard(
    wizard: &mut Wizard,
    catalog: &dyn CatalogReader,
    source: &mut dyn ActionSource,
) -> Result<Option<ValidatedScope>, AppError> {
    loop {
        match wizard.state() {
            WizardState::Cancelled => return Ok(None),
            WizardState::Finished => match validate(wizard.scope()) {
                Ok(validated) => return Ok(Some(validated)),
                Err(err) => {
                    debug!(error = %err, "Selection incomplete, reopening screen");
                    wizard.reopen(&err);
                }
            },
            _ => {
                let action = source.next_action(wizard)?;
                wizard.handle(action, catalog).await?;
            }
        }
    }
}
