//! SearchInput — wraps tui-input for the station search prompt.

use ratatui::crossterm::event::{KeyCode, KeyEvent};
use tui_input::{backend::crossterm::EventHandler, Input};

pub enum SearchAction {
    Edited,
    Submitted(String),
    Cancelled,
}

#[derive(Default)]
pub struct SearchInput {
    input: Input,
}

impl SearchInput {
    pub fn clear(&mut self) {
        self.input = Input::default();
    }

    pub fn text(&self) -> &str {
        self.input.value()
    }

    /// Handle a key event while the prompt is open.
    ///
    /// Enter submits the current text (even empty — the caller decides what
    /// an empty query means). Esc abandons the prompt and clears it.
    pub fn handle_key(&mut self, key: KeyEvent) -> SearchAction {
        match key.code {
            KeyCode::Enter => SearchAction::Submitted(self.input.value().to_string()),
            KeyCode::Esc => {
                self.clear();
                SearchAction::Cancelled
            }
            _ => {
                self.input
                    .handle_event(&ratatui::crossterm::event::Event::Key(key));
                SearchAction::Edited
            }
        }
    }
}
