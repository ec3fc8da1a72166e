//! Screen rendering: a view model built by the scheduler, pure text helpers,
//! and the terminal sink that draws it all.
//!
//! The scheduler never touches the terminal directly; it builds a
//! [`ViewModel`] and hands it to whatever [`DisplaySink`] it was given, which
//! keeps every layout decision testable without a tty.

use std::io::{self, Stdout};

use ratatui::crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::Alignment,
    text::{Line, Span},
    widgets::Paragraph,
    Frame, Terminal,
};

use crate::theme;

use tape_proto::track::StationSummary;

pub const LOGO: &str = " |[●▪▪●]| MixZaTape ";

/// Cells inside the progress bar, excluding the `|` end caps.
pub const PROGRESS_BAR_SIZE: usize = 50;

/// Where rendered frames go. The scheduler owns one of these; tests swap in
/// a recording sink.
pub trait DisplaySink {
    fn render(&mut self, view: &ViewModel) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackLine {
    pub title: String,
    pub artist: String,
}

/// Lower panel contents, chosen by the input mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Panel {
    Help,
    Search { query: String },
    Picker { stations: Vec<StationSummary>, selected: usize },
}

/// Everything one frame needs. Built fresh per render; holds no handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub current: Option<TrackLine>,
    pub previous: Option<TrackLine>,
    pub station_name: Option<String>,
    /// `(elapsed, duration)` in whole seconds.
    pub clock: Option<(u64, u64)>,
    pub panel: Panel,
}

/// Number of filled cells for `elapsed` out of `duration`, floored and
/// clamped to the bar width. Zero duration draws an empty bar.
pub fn progress_fill(elapsed: u64, duration: u64, size: usize) -> usize {
    if duration == 0 {
        return 0;
    }
    let fill = (elapsed as f64 / duration as f64 * size as f64) as usize;
    fill.min(size)
}

pub fn render_progress_bar(elapsed: u64, duration: u64) -> String {
    let fill = progress_fill(elapsed, duration, PROGRESS_BAR_SIZE);
    let mut bar = String::with_capacity(PROGRESS_BAR_SIZE + 2);
    bar.push('|');
    for _ in 0..fill {
        bar.push('█');
    }
    for _ in fill..PROGRESS_BAR_SIZE {
        bar.push('-');
    }
    bar.push('|');
    bar
}

pub fn fmt_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// The terminal-backed sink. Raw mode and the alternate screen are entered
/// on construction and restored on drop, so a panic anywhere in the loop
/// still leaves the user's shell usable.
pub struct TerminalDisplay {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalDisplay {
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }
}

impl DisplaySink for TerminalDisplay {
    fn render(&mut self, view: &ViewModel) -> anyhow::Result<()> {
        self.terminal.draw(|frame| draw(frame, view))?;
        Ok(())
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

fn draw(frame: &mut Frame, view: &ViewModel) {
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(LOGO, theme::style_logo())).alignment(Alignment::Center));
    lines.push(Line::default());

    lines.push(track_row("Playing", view.current.as_ref(), theme::style_bold()));
    lines.push(track_row(
        "Previous",
        view.previous.as_ref(),
        theme::style_secondary(),
    ));
    lines.push(Line::default());

    if let Some((elapsed, duration)) = view.clock {
        let remaining = duration.saturating_sub(elapsed);
        lines.push(
            Line::from(Span::styled(
                format!("-{} / {}", fmt_clock(remaining), fmt_clock(duration)),
                theme::style_secondary(),
            ))
            .alignment(Alignment::Center),
        );
        lines.push(
            Line::from(Span::styled(
                render_progress_bar(elapsed, duration),
                theme::style_accent(),
            ))
            .alignment(Alignment::Center),
        );
    } else {
        lines.push(Line::default());
        lines.push(
            Line::from(Span::styled(
                render_progress_bar(0, 0),
                theme::style_muted(),
            ))
            .alignment(Alignment::Center),
        );
    }

    lines.push(divider(frame.area().width));
    lines.push(Line::from(vec![
        Span::styled("Station: ", theme::style_secondary()),
        Span::styled(
            view.station_name.as_deref().unwrap_or("—").to_string(),
            theme::style_default(),
        ),
    ]));
    lines.push(divider(frame.area().width));

    match &view.panel {
        Panel::Help => {
            for (key, label) in crate::action::help_rows() {
                lines.push(Line::from(vec![
                    Span::styled(format!("  {key:<6}"), theme::style_accent()),
                    Span::styled(label, theme::style_secondary()),
                ]));
            }
        }
        Panel::Search { query } => {
            lines.push(Line::from(vec![
                Span::styled("Station Search: ", theme::style_bold()),
                Span::styled(query.clone(), theme::style_default()),
            ]));
        }
        Panel::Picker { stations, selected } => {
            if stations.is_empty() {
                lines.push(Line::from(Span::styled(
                    "  no stations matched",
                    theme::style_muted(),
                )));
            }
            for (i, station) in stations.iter().enumerate() {
                let style = if i == *selected {
                    theme::style_selected()
                } else {
                    theme::style_default()
                };
                lines.push(Line::from(Span::styled(
                    format!("  {}", station.name),
                    style,
                )));
            }
        }
    }

    frame.render_widget(Paragraph::new(lines), frame.area());
}

fn track_row<'a>(label: &'a str, track: Option<&TrackLine>, style: ratatui::style::Style) -> Line<'a> {
    let text = match track {
        Some(t) => format!("{} — {}", t.title, t.artist),
        None => "…".to_string(),
    };
    Line::from(vec![
        Span::styled(format!("{label:>9}: "), theme::style_secondary()),
        Span::styled(text, style),
    ])
}

fn divider(width: u16) -> Line<'static> {
    Line::from(Span::styled(
        "━".repeat(width as usize),
        theme::style_muted(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_is_floored_and_clamped() {
        assert_eq!(progress_fill(0, 100, 50), 0);
        assert_eq!(progress_fill(50, 100, 50), 25);
        assert_eq!(progress_fill(99, 100, 50), 49); // 49.5 floors, never rounds up
        assert_eq!(progress_fill(100, 100, 50), 50);
        assert_eq!(progress_fill(500, 100, 50), 50); // past the end stays full
    }

    #[test]
    fn test_zero_duration_draws_empty_bar() {
        assert_eq!(progress_fill(10, 0, 50), 0);
        let bar = render_progress_bar(10, 0);
        assert!(!bar.contains('█'));
    }

    #[test]
    fn test_bar_width_is_constant() {
        for (elapsed, duration) in [(0, 180), (90, 180), (180, 180), (400, 180)] {
            let bar = render_progress_bar(elapsed, duration);
            assert_eq!(bar.chars().count(), PROGRESS_BAR_SIZE + 2);
            assert!(bar.starts_with('|') && bar.ends_with('|'));
        }
    }

    #[test]
    fn test_half_way_bar() {
        let bar = render_progress_bar(90, 180);
        assert_eq!(bar.chars().filter(|&c| c == '█').count(), 25);
        assert_eq!(bar.chars().filter(|&c| c == '-').count(), 25);
    }

    #[test]
    fn test_fmt_clock() {
        assert_eq!(fmt_clock(0), "0:00");
        assert_eq!(fmt_clock(59), "0:59");
        assert_eq!(fmt_clock(60), "1:00");
        assert_eq!(fmt_clock(187), "3:07");
        assert_eq!(fmt_clock(3600), "60:00");
    }
}
