//! The scheduler: one task owning the player, the station client, the
//! session, and the screen.
//!
//! Everything runs on a single cooperative loop — two one-shot timers plus a
//! key channel multiplexed through `select!`. The stream timer (prefetch and
//! advance decisions) is polled before the UI timer so a track rollover is
//! never delayed by a screen refresh; keys come last since a human keystroke
//! tolerates half a tick of latency.

use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use tape_proto::config::{Config, TimingConfig};
use tape_proto::track::StationSummary;

use crate::action::{command_for, Command};
use crate::player::{PlayOutcome, Player};
use crate::session::Session;
use crate::station::{StationClient, VoteDirection};
use crate::ui::{DisplaySink, Panel, TrackLine, ViewModel};
use crate::widgets::search_input::{SearchAction, SearchInput};

/// Which component keystrokes are routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Search,
    Pick,
}

pub struct App<D: DisplaySink> {
    config: Config,
    player: Player,
    station: StationClient,
    session: Session,
    display: D,
    mode: Mode,
    search: SearchInput,
    results: Vec<StationSummary>,
    picked: usize,
    should_quit: bool,
    autoplay: bool,
}

impl<D: DisplaySink> App<D> {
    pub fn new(
        config: Config,
        player: Player,
        station: StationClient,
        session: Session,
        display: D,
        autoplay: bool,
    ) -> Self {
        Self {
            config,
            player,
            station,
            session,
            display,
            mode: Mode::Normal,
            search: SearchInput::default(),
            results: Vec::new(),
            picked: 0,
            should_quit: false,
            autoplay,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        // Terminal input is a blocking read; park it on the blocking pool
        // and bridge into the loop over a channel. The task ends when the
        // receiver is dropped.
        let (key_tx, mut key_rx) = mpsc::channel::<KeyEvent>(64);
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if key_tx.blocking_send(key).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("input reader stopped: {e}");
                    break;
                }
            }
        });

        if self.autoplay {
            self.skip().await;
        }
        self.render()?;

        let stream_tick = Duration::from_millis(self.config.timing.stream_tick_ms);
        let ui_tick = Duration::from_millis(self.config.timing.ui_tick_ms);
        let stream_timer = tokio::time::sleep(stream_tick);
        tokio::pin!(stream_timer);
        let ui_timer = tokio::time::sleep(ui_tick);
        tokio::pin!(ui_timer);

        while !self.should_quit {
            tokio::select! {
                biased;
                _ = &mut stream_timer => {
                    self.on_stream_tick().await;
                    stream_timer.as_mut().reset(tokio::time::Instant::now() + stream_tick);
                }
                _ = &mut ui_timer => {
                    self.on_ui_tick()?;
                    ui_timer.as_mut().reset(tokio::time::Instant::now() + ui_tick);
                }
                Some(key) = key_rx.recv() => {
                    self.handle_key(key).await;
                    self.render()?;
                }
            }
        }

        self.player.stop().await;
        Ok(())
    }

    /// Prefetch/advance decisions, driven by the player's own clock. A
    /// paused player holds everything where it is.
    async fn on_stream_tick(&mut self) {
        if self.player.is_paused() {
            return;
        }
        let remaining = self.player.time_remaining().await;
        let step = plan_stream_step(remaining, self.session.can_prefetch(), &self.config.timing);
        if step.prefetch {
            self.prefetch().await;
        }
        if step.advance && self.session.has_next() {
            // The queued file rolls over inside the player on its own; only
            // the session bookkeeping moves here.
            if let Some(path) = self.session.advance() {
                if let Err(e) = self.player.play(&path).await {
                    error!("queueing next track failed: {e}");
                }
            }
        }
    }

    fn on_ui_tick(&mut self) -> anyhow::Result<()> {
        if self.player.is_paused() {
            return Ok(());
        }
        self.render()
    }

    fn render(&mut self) -> anyhow::Result<()> {
        let panel = match self.mode {
            Mode::Normal => Panel::Help,
            Mode::Search => Panel::Search {
                query: self.search.text().to_string(),
            },
            Mode::Pick => Panel::Picker {
                stations: self.results.clone(),
                selected: self.picked,
            },
        };
        let view = build_view(&self.session, panel);
        self.display.render(&view)
    }

    /// Fetch and download the station's next track into the free buffer
    /// slot. Failures release the guard and are retried on a later tick.
    async fn prefetch(&mut self) {
        let Some(dest) = self.session.begin_prefetch() else {
            return;
        };
        let fetched = match self.station.fetch_next(self.session.station_id).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("next-track fetch failed, will retry next tick: {e}");
                self.session.fail_prefetch();
                return;
            }
        };
        if let Err(e) = self.station.download(&fetched.listen_url, &dest).await {
            warn!("media download failed, will retry next tick: {e}");
            self.session.fail_prefetch();
            return;
        }
        self.session.complete_prefetch(fetched.track);
    }

    /// Jump to the next track immediately: make sure one is buffered, hand
    /// its file to the player, and tell the player to move on.
    async fn skip(&mut self) {
        if self.session.can_prefetch() {
            self.prefetch().await;
        }
        if let Some(path) = self.session.advance() {
            match self.player.play(&path).await {
                // A fresh process starts on the right file already; `next`
                // would push it straight past its only queued item.
                Ok(PlayOutcome::Spawned) => {}
                Ok(PlayOutcome::Enqueued) => self.player.skip().await,
                Err(e) => error!("starting playback failed: {e}"),
            }
        } else {
            debug!("skip requested with nothing buffered");
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        match self.mode {
            Mode::Normal => {
                if let Some(command) = command_for(key.code) {
                    self.dispatch(command).await;
                }
            }
            // Function keys keep their global meaning inside the prompt and
            // the picker; everything else edits or navigates.
            Mode::Search => {
                if let (KeyCode::F(_), Some(command)) = (key.code, command_for(key.code)) {
                    self.dispatch(command).await;
                    return;
                }
                match self.search.handle_key(key) {
                    SearchAction::Submitted(query) => self.run_search(&query).await,
                    SearchAction::Cancelled => self.mode = Mode::Normal,
                    SearchAction::Edited => {}
                }
            }
            Mode::Pick => {
                if let (KeyCode::F(_), Some(command)) = (key.code, command_for(key.code)) {
                    self.dispatch(command).await;
                    return;
                }
                match key.code {
                    KeyCode::Up => self.picked = step_selection(self.results.len(), self.picked, -1),
                    KeyCode::Down => self.picked = step_selection(self.results.len(), self.picked, 1),
                    KeyCode::Enter => {
                        if let Some(station) = self.results.get(self.picked).cloned() {
                            self.change_station(station).await;
                        }
                        self.mode = Mode::Normal;
                    }
                    KeyCode::Esc => self.mode = Mode::Normal,
                    _ => {}
                }
            }
        }
    }

    async fn dispatch(&mut self, command: Command) {
        match command {
            Command::Exit => self.should_quit = true,
            Command::Skip => self.skip().await,
            Command::VolumeUp => self.player.volume_up().await,
            Command::VolumeDown => self.player.volume_down().await,
            Command::Pause => self.player.pause().await,
            Command::Seek => {
                let elapsed = self.player.elapsed_time().await;
                let target = elapsed + self.config.player.seek_step_secs as u64;
                self.player.seek(target).await;
            }
            Command::Help => self.mode = Mode::Normal,
            Command::StationSearch => {
                self.search.clear();
                self.mode = Mode::Search;
            }
            Command::Upvote => self.vote(VoteDirection::Up).await,
            Command::Downvote => {
                // A downvote also means "get this off my speakers".
                self.vote(VoteDirection::Down).await;
                self.skip().await;
            }
        }
    }

    async fn run_search(&mut self, query: &str) {
        match self.station.search(query).await {
            Ok(stations) => {
                // An empty result list still opens the picker, which shows
                // "no stations matched".
                self.results = stations;
                self.picked = 0;
                self.mode = Mode::Pick;
            }
            Err(e) => {
                warn!("station search failed: {e}");
                self.mode = Mode::Normal;
            }
        }
    }

    async fn change_station(&mut self, station: StationSummary) {
        self.session.change_station(station.id, station.name);
        // The old station's track keeps playing until the new one is
        // buffered; skip does the swap.
        self.skip().await;
    }

    async fn vote(&mut self, direction: VoteDirection) {
        let Some(track) = &self.session.current else {
            return;
        };
        self.station
            .vote(self.session.station_id, track.id, direction)
            .await;
    }
}

/// What one stream tick should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StreamStep {
    prefetch: bool,
    advance: bool,
}

const STEP_IDLE: StreamStep = StreamStep {
    prefetch: false,
    advance: false,
};

/// Decide the stream tick's actions from the player's reported remaining
/// time. Zero or negative remaining means the report is unknown or stale —
/// the player can sit on the ending track's last second for a tick after a
/// rollover, during which the session's free buffer slot is the very file it
/// still has open. Acting then would download over it and advance the
/// session a second time, so the whole step idles.
fn plan_stream_step(remaining: i64, can_prefetch: bool, timing: &TimingConfig) -> StreamStep {
    if remaining <= 0 {
        return STEP_IDLE;
    }
    StreamStep {
        prefetch: can_prefetch && remaining <= timing.prefetch_low_water_secs,
        advance: remaining <= timing.advance_low_water_secs,
    }
}

/// Move a picker selection by `delta`, clamped to the list.
fn step_selection(len: usize, selected: usize, delta: i64) -> usize {
    if len == 0 {
        return 0;
    }
    let moved = selected as i64 + delta;
    moved.clamp(0, len as i64 - 1) as usize
}

/// Assemble one frame's worth of state. Pure so layout decisions are
/// testable without a terminal.
fn build_view(session: &Session, panel: Panel) -> ViewModel {
    let line = |t: &tape_proto::track::Track| TrackLine {
        title: t.title.clone(),
        artist: t.artist.clone(),
    };
    let clock = session.current.as_ref().map(|t| {
        let duration = t.duration_secs as u64;
        let remaining = session.time_remaining().clamp(0, duration as i64) as u64;
        (duration - remaining, duration)
    });
    ViewModel {
        current: session.current.as_ref().map(line),
        previous: session.previous.as_ref().map(line),
        station_name: session.station_name.clone(),
        clock,
        panel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::test_support::{read_sent, scripted_player};
    use crate::session::DEFAULT_STATION_ID;
    use crate::station::StationClient;
    use std::path::Path;
    use tape_proto::track::Track;
    use tokio::io::DuplexStream;

    fn track(title: &str, artist: &str, duration_secs: u32) -> Track {
        Track {
            id: 1,
            title: title.to_string(),
            artist: artist.to_string(),
            duration_secs,
        }
    }

    struct NullDisplay;

    impl DisplaySink for NullDisplay {
        fn render(&mut self, _view: &ViewModel) -> anyhow::Result<()> {
            Ok(())
        }
    }

    /// App over a scripted player link; commands show up in the returned
    /// stream, replies are whatever was pre-written.
    async fn scripted_app(replies: &str) -> (App<NullDisplay>, DuplexStream, DuplexStream) {
        let (player, cmd_rx, reply_keep) = scripted_player(replies).await;
        let config = Config::default();
        let station = StationClient::new(&config.station);
        let session = Session::new(DEFAULT_STATION_ID, Path::new("/tmp/tape"));
        let app = App::new(config, player, station, session, NullDisplay, false);
        (app, cmd_rx, reply_keep)
    }

    #[test]
    fn test_build_view_empty_session() {
        let session = Session::new(DEFAULT_STATION_ID, Path::new("/tmp/tape"));
        let view = build_view(&session, Panel::Help);
        assert!(view.current.is_none());
        assert!(view.previous.is_none());
        assert!(view.clock.is_none());
        assert_eq!(view.panel, Panel::Help);
    }

    #[test]
    fn test_build_view_reflects_session_tracks() {
        let mut session = Session::new(DEFAULT_STATION_ID, Path::new("/tmp/tape"));
        session.station_name = Some("Power Workout".to_string());
        session.previous = Some(track("Before", "Them", 120));
        session.current = Some(track("Night Drive", "The Commuters", 180));

        let view = build_view(&session, Panel::Help);
        let current = view.current.unwrap();
        assert_eq!(current.title, "Night Drive");
        assert_eq!(current.artist, "The Commuters");
        assert_eq!(view.previous.unwrap().title, "Before");
        assert_eq!(view.station_name.as_deref(), Some("Power Workout"));
        let (elapsed, duration) = view.clock.unwrap();
        assert_eq!(duration, 180);
        assert!(elapsed <= duration);
    }

    #[test]
    fn test_build_view_clock_clamps_to_duration() {
        let mut session = Session::new(DEFAULT_STATION_ID, Path::new("/tmp/tape"));
        // Zero-length track: elapsed can never exceed duration.
        session.current = Some(track("Blip", "Nobody", 0));
        let (elapsed, duration) = build_view(&session, Panel::Help).clock.unwrap();
        assert_eq!((elapsed, duration), (0, 0));
    }

    #[test]
    fn test_stream_step_thresholds() {
        let timing = TimingConfig::default();
        assert_eq!(plan_stream_step(180, true, &timing), STEP_IDLE);
        assert_eq!(plan_stream_step(6, true, &timing), STEP_IDLE);
        assert_eq!(
            plan_stream_step(5, true, &timing),
            StreamStep { prefetch: true, advance: false }
        );
        assert_eq!(plan_stream_step(5, false, &timing), STEP_IDLE);
        assert_eq!(
            plan_stream_step(1, true, &timing),
            StreamStep { prefetch: true, advance: true }
        );
        assert_eq!(
            plan_stream_step(1, false, &timing),
            StreamStep { prefetch: false, advance: true }
        );
    }

    #[test]
    fn test_stream_step_idles_at_zero_or_unknown_remaining() {
        let timing = TimingConfig::default();
        // 0 shows up in the window right after a rollover while the player
        // still reports the ending track; claiming the free slot then would
        // overwrite the file it has open.
        assert_eq!(plan_stream_step(0, true, &timing), STEP_IDLE);
        assert_eq!(plan_stream_step(-1, true, &timing), STEP_IDLE);
        assert_eq!(plan_stream_step(-30, true, &timing), STEP_IDLE);
    }

    #[tokio::test]
    async fn test_stream_tick_holds_state_during_rollover() {
        // Player still reports the track that just ended: length 10,
        // elapsed 10.
        let (mut app, mut cmd, _keep) = scripted_app("10\n10\n").await;
        app.session.begin_prefetch().unwrap();
        app.session.complete_prefetch(track("queued", "someone", 200));

        app.on_stream_tick().await;

        // No second advance, no prefetch into the slot still playing.
        assert!(app.session.has_next());
        assert!(app.session.current.is_none());
        drop(app);
        assert_eq!(read_sent(&mut cmd).await, "get_length\nget_time\n");
    }

    #[tokio::test]
    async fn test_skip_on_running_player_enqueues_then_jumps() {
        let (mut app, mut cmd, _keep) = scripted_app("").await;
        app.session.begin_prefetch().unwrap();
        app.session.complete_prefetch(track("next up", "them", 120));

        app.skip().await;

        assert_eq!(app.session.current.as_ref().unwrap().title, "next up");
        let sent = read_sent(&mut cmd).await;
        assert_eq!(sent, "enqueue /tmp/tape/a-side.media\nnext\n");
    }

    #[test]
    fn test_step_selection_clamps() {
        assert_eq!(step_selection(3, 0, -1), 0);
        assert_eq!(step_selection(3, 0, 1), 1);
        assert_eq!(step_selection(3, 2, 1), 2);
        assert_eq!(step_selection(0, 0, 1), 0);
        assert_eq!(step_selection(0, 0, -1), 0);
    }
}
