//! Key bindings and the commands they dispatch.

use ratatui::crossterm::event::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Exit,
    Skip,
    VolumeUp,
    VolumeDown,
    Pause,
    Seek,
    Help,
    StationSearch,
    Upvote,
    Downvote,
}

pub struct Binding {
    pub key: KeyCode,
    pub command: Command,
    pub label: &'static str,
}

/// The full global binding table, in the order the help panel lists it.
pub const BINDINGS: &[Binding] = &[
    Binding { key: KeyCode::Esc, command: Command::Exit, label: "quit" },
    Binding { key: KeyCode::F(9), command: Command::Skip, label: "skip track" },
    Binding { key: KeyCode::Char('+'), command: Command::VolumeUp, label: "volume up" },
    Binding { key: KeyCode::Char('-'), command: Command::VolumeDown, label: "volume down" },
    Binding { key: KeyCode::F(8), command: Command::Pause, label: "pause / resume" },
    Binding { key: KeyCode::F(10), command: Command::Seek, label: "seek forward" },
    Binding { key: KeyCode::F(1), command: Command::Help, label: "help" },
    Binding { key: KeyCode::F(2), command: Command::StationSearch, label: "station search" },
    Binding { key: KeyCode::Char('>'), command: Command::Upvote, label: "vote up" },
    Binding { key: KeyCode::Char('<'), command: Command::Downvote, label: "vote down" },
];

pub fn command_for(key: KeyCode) -> Option<Command> {
    BINDINGS.iter().find(|b| b.key == key).map(|b| b.command)
}

pub fn key_label(key: KeyCode) -> String {
    match key {
        KeyCode::Esc => "esc".to_string(),
        KeyCode::F(n) => format!("f{n}"),
        KeyCode::Char(c) => c.to_string(),
        other => format!("{other:?}").to_lowercase(),
    }
}

/// `(key, label)` rows for the help panel.
pub fn help_rows() -> Vec<(String, &'static str)> {
    BINDINGS
        .iter()
        .map(|b| (key_label(b.key), b.label))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_keys_dispatch() {
        assert_eq!(command_for(KeyCode::Esc), Some(Command::Exit));
        assert_eq!(command_for(KeyCode::F(9)), Some(Command::Skip));
        assert_eq!(command_for(KeyCode::Char('+')), Some(Command::VolumeUp));
        assert_eq!(command_for(KeyCode::Char('-')), Some(Command::VolumeDown));
        assert_eq!(command_for(KeyCode::F(8)), Some(Command::Pause));
        assert_eq!(command_for(KeyCode::F(10)), Some(Command::Seek));
        assert_eq!(command_for(KeyCode::F(1)), Some(Command::Help));
        assert_eq!(command_for(KeyCode::F(2)), Some(Command::StationSearch));
        assert_eq!(command_for(KeyCode::Char('>')), Some(Command::Upvote));
        assert_eq!(command_for(KeyCode::Char('<')), Some(Command::Downvote));
    }

    #[test]
    fn test_unbound_keys_are_ignored() {
        assert_eq!(command_for(KeyCode::Char('q')), None);
        assert_eq!(command_for(KeyCode::Enter), None);
        assert_eq!(command_for(KeyCode::F(12)), None);
    }

    #[test]
    fn test_no_duplicate_bindings() {
        for (i, a) in BINDINGS.iter().enumerate() {
            for b in &BINDINGS[i + 1..] {
                assert_ne!(a.key, b.key, "key bound twice");
            }
        }
    }

    #[test]
    fn test_help_rows_cover_every_binding() {
        let rows = help_rows();
        assert_eq!(rows.len(), BINDINGS.len());
        assert_eq!(rows[0], ("esc".to_string(), "quit"));
        assert_eq!(rows[1], ("f9".to_string(), "skip track"));
    }
}
