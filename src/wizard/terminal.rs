// dbdump/src/wizard/terminal.rs
//! Minimal crossterm front end: one screen at a time in the alternate screen buffer.

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use std::io::{self, Stdout, Write};

use super::machine::{ListItem, Wizard, WizardAction, WizardState};
use super::ActionSource;

const LIST_HELP: &str = "[↑/↓] move • [space] toggle • [enter] confirm • [esc] back • [ctrl+c] quit";
const PATH_HELP: &str = "[enter] confirm • [alt+backspace/esc] back • [ctrl+c] quit";

/// Owns raw mode and the alternate screen; both are restored on drop.
pub struct TerminalSource {
    stdout: Stdout,
}

impl TerminalSource {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        Ok(TerminalSource { stdout })
    }

    fn render(&mut self, wizard: &Wizard) -> io::Result<()> {
        queue!(self.stdout, Clear(ClearType::All), MoveTo(0, 0))?;
        for line in screen_lines(wizard) {
            queue!(self.stdout, Print(line), Print("\r\n"))?;
        }
        self.stdout.flush()
    }
}

impl Drop for TerminalSource {
    fn drop(&mut self) {
        let _ = execute!(self.stdout, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

impl ActionSource for TerminalSource {
    fn next_action(&mut self, wizard: &Wizard) -> io::Result<WizardAction> {
        self.render(wizard)?;
        loop {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(action) = map_key(key, wizard.state()) {
                    return Ok(action);
                }
            }
        }
    }
}

/// Translates a key press into a wizard action for the given screen.
pub fn map_key(key: KeyEvent, state: WizardState) -> Option<WizardAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    match key.code {
        KeyCode::Char('c') if ctrl => return Some(WizardAction::Abort),
        KeyCode::Esc => return Some(WizardAction::Back),
        KeyCode::Backspace if alt => return Some(WizardAction::Back),
        KeyCode::Enter => return Some(WizardAction::Confirm),
        _ => {}
    }

    if state == WizardState::TypingPath {
        return match key.code {
            KeyCode::Backspace => Some(WizardAction::DeleteChar),
            KeyCode::Char(c) if !ctrl && !alt => Some(WizardAction::Input(c)),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(WizardAction::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(WizardAction::Down),
        KeyCode::Char(' ') => Some(WizardAction::Toggle),
        KeyCode::Char('q') => Some(WizardAction::Abort),
        _ => None,
    }
}

fn title(state: WizardState) -> &'static str {
    match state {
        WizardState::ChoosingConnection => "Select a stored connection:",
        WizardState::ChoosingDatabases => "Select one or more databases:",
        WizardState::ChoosingTables => "Select one or more tables:",
        WizardState::TypingPath => "Enter the path for the database dump:",
        WizardState::Finished | WizardState::Cancelled => "",
    }
}

fn item_label(item: &ListItem<'_>) -> String {
    match item {
        ListItem::Connection(profile) => format!(
            "{} ({}) [{}]",
            profile.tag,
            profile.endpoint(),
            profile.driver
        ),
        ListItem::Database(entry) => {
            format!("[{}] {}", check(entry.selected), entry.name)
        }
        ListItem::Table(entry) => format!(
            "[{}] {} | {}",
            check(entry.selected),
            entry.database.as_deref().unwrap_or_default(),
            entry.name
        ),
    }
}

fn check(selected: bool) -> char {
    if selected { '✔' } else { ' ' }
}

/// Text lines for the current screen, without terminal control sequences.
pub fn screen_lines(wizard: &Wizard) -> Vec<String> {
    let state = wizard.state();
    let mut lines = vec![title(state).to_string(), String::new()];

    if state == WizardState::TypingPath {
        lines.push(format!("❯ {}", wizard.path_input()));
        lines.push(format!("  (empty = {})", wizard.default_destination()));
        lines.push(String::new());
        lines.push(PATH_HELP.to_string());
    } else {
        let items = wizard.items();
        if items.is_empty() {
            lines.push("  (nothing to show)".to_string());
        }
        for (i, item) in items.iter().enumerate() {
            let marker = if i == wizard.cursor() { '➤' } else { ' ' };
            lines.push(format!("{} {}", marker, item_label(item)));
        }
        lines.push(String::new());
        lines.push(LIST_HELP.to_string());
    }

    if let Some(status) = wizard.status() {
        lines.push(String::new());
        lines.push(format!("⚠ {}", status));
    }
    lines
}
