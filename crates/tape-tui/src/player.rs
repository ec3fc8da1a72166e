//! Player protocol adapter — owns the external player subprocess and speaks
//! its line-oriented control protocol over stdin/stdout.
//!
//! The protocol has no request IDs: every command that expects a reply is a
//! strict send-then-read-one-line exchange, so ordering toward the process is
//! FIFO and response matching relies entirely on that ordering. The stdio
//! pair is held behind boxed `AsyncWrite`/`AsyncBufRead` objects so tests can
//! drive the adapter over an in-memory duplex transport instead of a child
//! process.
//!
//! Failure policy: a crashed or unresponsive process never raises to the
//! caller. Telemetry degrades to the cached elapsed value or the
//! [`TIME_UNKNOWN`] sentinel; only a missing player binary is fatal, and only
//! at construction time.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use tape_proto::config::PlayerConfig;
use tape_proto::platform;

/// Sentinel returned by [`Player::time_remaining`] when either protocol
/// reply could not be parsed. Callers must treat it as "unknown, do not act".
pub const TIME_UNKNOWN: i64 = -1;

/// How [`Player::play`] started the file: a fresh process already playing
/// it, or an `enqueue` into a running process's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Spawned,
    Enqueued,
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("player binary `{0}` not found beside the executable or on PATH")]
    BinaryNotFound(String),
    #[error("failed to spawn player process: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Replies arrive as a number possibly prefixed by prompt noise (`"> 42\r\n"`).
fn parse_numeric_reply(line: &str) -> Option<u64> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"^[> ]*(\d+)\s*$").expect("valid reply pattern"));
    re.captures(line)?.get(1)?.as_str().parse().ok()
}

/// The live control link: the child (absent in tests) and its stdio pair.
struct Link {
    child: Option<Child>,
    stdin: Box<dyn AsyncWrite + Unpin + Send>,
    stdout: Box<dyn AsyncBufRead + Unpin + Send>,
}

pub struct Player {
    binary: PathBuf,
    reply_timeout: Duration,
    link: Option<Link>,
    paused: bool,
    /// Cached elapsed seconds, served when a poll fails or is stale.
    /// Reset to 0 on skip.
    last_time: u64,
}

impl Player {
    /// Resolve the player binary. The only fatal error in this module:
    /// without an executable there is nothing to degrade to.
    pub fn new(cfg: &PlayerConfig) -> Result<Self, PlayerError> {
        let binary = platform::find_player_binary(&cfg.binary)
            .ok_or_else(|| PlayerError::BinaryNotFound(cfg.binary.clone()))?;
        info!(binary = %binary.display(), "player binary resolved");
        Ok(Self {
            binary,
            reply_timeout: Duration::from_millis(cfg.reply_timeout_ms),
            link: None,
            paused: false,
            last_time: 0,
        })
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    async fn send(&mut self, command: &str) {
        if let Some(link) = self.link.as_mut() {
            if let Err(e) = link.stdin.write_all(command.as_bytes()).await {
                warn!("player: write failed: {e}");
            }
        }
    }

    /// Send a command and block-read exactly one reply line. `None` on any
    /// failure (no process, write error, read error, timeout).
    async fn send_readline(&mut self, command: &str) -> Option<String> {
        let link = self.link.as_mut()?;
        if let Err(e) = link.stdin.write_all(command.as_bytes()).await {
            warn!("player: write failed: {e}");
            return None;
        }
        let mut line = String::new();
        match tokio::time::timeout(self.reply_timeout, link.stdout.read_line(&mut line)).await {
            Ok(Ok(0)) => {
                debug!("player: control stream closed");
                None
            }
            Ok(Ok(_)) => Some(line),
            Ok(Err(e)) => {
                warn!("player: read failed: {e}");
                None
            }
            Err(_) => {
                debug!("player: reply timed out for {:?}", command.trim());
                None
            }
        }
    }

    /// Start playing `path`. Spawns the process on first use; a running
    /// process is never killed to change tracks — the file is queued instead
    /// and the process advances through its own queue. The outcome tells the
    /// caller which of the two happened.
    pub async fn play(&mut self, path: &Path) -> Result<PlayOutcome, PlayerError> {
        if self.is_open() {
            self.send(&format!("enqueue {}\n", path.display())).await;
            return Ok(PlayOutcome::Enqueued);
        }

        let mut child = Command::new(&self.binary)
            .arg("-Irc")
            .arg("--quiet")
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        info!(pid = ?child.id(), file = %path.display(), "player: spawned");

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("player stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("player stdout not captured"))?;

        let mut link = Link {
            child: Some(child),
            stdin: Box::new(stdin),
            stdout: Box::new(BufReader::new(stdout)),
        };

        // The control interface prints two greeting lines before accepting
        // commands; discard them so they don't desync later replies.
        for _ in 0..2 {
            let mut greeting = String::new();
            let _ = tokio::time::timeout(self.reply_timeout, link.stdout.read_line(&mut greeting))
                .await;
        }

        self.link = Some(link);
        Ok(PlayOutcome::Spawned)
    }

    /// Toggle the paused flag and tell the player. Fire-and-forget.
    pub async fn pause(&mut self) {
        self.paused = !self.paused;
        self.send("pause\n").await;
    }

    /// Jump to the next queued track. The elapsed cache restarts from 0.
    pub async fn skip(&mut self) {
        self.send("next\n").await;
        self.last_time = 0;
    }

    /// Seek to an absolute position. The cache is left alone; the next
    /// elapsed-time poll refreshes it.
    pub async fn seek(&mut self, target_secs: u64) {
        self.send(&format!("seek {target_secs}\n")).await;
    }

    pub async fn volume_up(&mut self) {
        let _ = self.send_readline("volup\n").await;
    }

    pub async fn volume_down(&mut self) {
        let _ = self.send_readline("voldown\n").await;
    }

    /// Elapsed seconds of the current track. On any protocol hiccup the
    /// last cached value is returned instead.
    pub async fn elapsed_time(&mut self) -> u64 {
        if let Some(line) = self.send_readline("get_time\n").await {
            match parse_numeric_reply(&line) {
                Some(value) => self.last_time = value,
                None => debug!("player: unparseable get_time reply: {line:?}"),
            }
        }
        self.last_time
    }

    /// Seconds left on the current track, or [`TIME_UNKNOWN`] when either
    /// reply fails to parse (typical while the process is busy seeking).
    pub async fn time_remaining(&mut self) -> i64 {
        if !self.is_open() {
            return TIME_UNKNOWN;
        }
        let length = self.send_readline("get_length\n").await;
        let Some(length) = length.as_deref().and_then(parse_numeric_reply) else {
            debug!("player: unable to parse get_length reply");
            return TIME_UNKNOWN;
        };
        let elapsed = self.send_readline("get_time\n").await;
        let Some(elapsed) = elapsed.as_deref().and_then(parse_numeric_reply) else {
            debug!("player: unable to parse get_time reply");
            return TIME_UNKNOWN;
        };
        length as i64 - elapsed as i64
    }

    /// Send `shutdown` and drop the link, whether or not it is acknowledged.
    /// A still-alive child gets a short grace period and is then reaped so no
    /// subprocess outlives the application.
    pub async fn stop(&mut self) {
        self.send("shutdown\n").await;
        if let Some(mut link) = self.link.take() {
            if let Some(mut child) = link.child.take() {
                match tokio::time::timeout(Duration::from_millis(500), child.wait()).await {
                    Ok(status) => debug!("player: exited with {:?}", status),
                    Err(_) => {
                        warn!("player: did not honor shutdown, killing");
                        let _ = child.kill().await;
                    }
                }
            }
        }
        self.paused = false;
        self.last_time = 0;
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{read_sent, scripted_player};
    use super::*;

    #[test]
    fn test_parse_numeric_reply() {
        assert_eq!(parse_numeric_reply("> 42\r\n"), Some(42));
        assert_eq!(parse_numeric_reply("120\r\n"), Some(120));
        assert_eq!(parse_numeric_reply("0\n"), Some(0));
        assert_eq!(parse_numeric_reply(">  7\n"), Some(7));
        assert_eq!(parse_numeric_reply("status change: play\n"), None);
        assert_eq!(parse_numeric_reply("\r\n"), None);
        assert_eq!(parse_numeric_reply("12a\n"), None);
    }

    #[tokio::test]
    async fn test_time_remaining_parses_noisy_replies() {
        let (mut player, _cmd, _keep) = scripted_player("120\r\n> 42\r\n").await;
        assert_eq!(player.time_remaining().await, 78);
    }

    #[tokio::test]
    async fn test_time_remaining_sentinel_on_garbage() {
        let (mut player, _cmd, _keep) = scripted_player("not a number\n42\n").await;
        assert_eq!(player.time_remaining().await, TIME_UNKNOWN);
    }

    #[tokio::test]
    async fn test_elapsed_time_caches_last_good_value() {
        let (mut player, _cmd, _keep) = scripted_player("> 42\r\nstatus change\n").await;
        assert_eq!(player.elapsed_time().await, 42);
        // Malformed reply: cache served unchanged.
        assert_eq!(player.elapsed_time().await, 42);
    }

    #[tokio::test]
    async fn test_skip_resets_elapsed_cache() {
        let (mut player, mut cmd, _keep) = scripted_player("> 99\r\nbad\n").await;
        assert_eq!(player.elapsed_time().await, 99);
        player.skip().await;
        let sent = read_sent(&mut cmd).await;
        assert!(sent.contains("next\n"));
        // Next poll fails to parse; cache was reset by skip.
        assert_eq!(player.elapsed_time().await, 0);
    }

    #[tokio::test]
    async fn test_pause_toggles_and_sends() {
        let (mut player, mut cmd, _keep) = scripted_player("").await;
        assert!(!player.is_paused());
        player.pause().await;
        assert!(player.is_paused());
        player.pause().await;
        assert!(!player.is_paused());
        let sent = read_sent(&mut cmd).await;
        assert_eq!(sent, "pause\npause\n");
    }

    #[tokio::test]
    async fn test_play_on_open_link_enqueues() {
        let (mut player, mut cmd, _keep) = scripted_player("").await;
        let outcome = player.play(Path::new("/tmp/b-side.media")).await.unwrap();
        assert_eq!(outcome, PlayOutcome::Enqueued);
        let sent = read_sent(&mut cmd).await;
        assert_eq!(sent, "enqueue /tmp/b-side.media\n");
    }

    #[tokio::test]
    async fn test_seek_command_format() {
        let (mut player, mut cmd, _keep) = scripted_player("").await;
        player.seek(72).await;
        let sent = read_sent(&mut cmd).await;
        assert_eq!(sent, "seek 72\n");
    }

    #[tokio::test]
    async fn test_reply_timeout_degrades_to_cache() {
        // No replies scripted at all: reads time out instead of erroring.
        let (mut player, _cmd, _keep) = scripted_player("").await;
        assert_eq!(player.elapsed_time().await, 0);
        assert_eq!(player.time_remaining().await, TIME_UNKNOWN);
    }
}
