//! Session — the per-station track state machine and the two-slot media
//! buffer discipline.
//!
//! The session is owned by the scheduler and mutated only through the
//! transitions below; everything else reads. The loop is single-threaded, so
//! the at-most-one-in-flight-prefetch rule is a plain busy flag, not a lock.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::debug;

use tape_proto::track::Track;

/// Station used when none was given on the command line.
pub const DEFAULT_STATION_ID: u64 = 1393494;

/// Which side of the two-file media buffer a download lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }

    fn flipped(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

/// Two alternating buffer files. Downloads always target the side the
/// player is not holding open, so a fetch for track N+1 can never truncate
/// the file track N is still playing from.
#[derive(Debug)]
pub struct BufferSlots {
    paths: [PathBuf; 2],
    next: Slot,
}

impl BufferSlots {
    pub fn new(dir: &Path) -> Self {
        Self {
            paths: [dir.join("a-side.media"), dir.join("b-side.media")],
            next: Slot::A,
        }
    }

    /// File the next download must be written to.
    pub fn download_path(&self) -> &Path {
        &self.paths[self.next.index()]
    }

    /// Record a completed download: returns the slot it landed in and flips
    /// parity so the following download targets the other file. Parity flips
    /// exactly once per successful download, never on failure.
    pub fn mark_downloaded(&mut self) -> Slot {
        let slot = self.next;
        self.next = self.next.flipped();
        slot
    }
}

/// A fully-populated prefetched track: metadata plus the buffer file its
/// media was written to. Never partially filled.
#[derive(Debug, Clone)]
pub struct NextTrack {
    pub track: Track,
    pub path: PathBuf,
}

pub struct Session {
    pub station_id: u64,
    pub station_name: Option<String>,
    pub previous: Option<Track>,
    pub current: Option<Track>,
    next: Option<NextTrack>,
    track_start: Instant,
    buffers: BufferSlots,
    prefetch_busy: bool,
}

impl Session {
    pub fn new(station_id: u64, buffer_dir: &Path) -> Self {
        Self {
            station_id,
            station_name: None,
            previous: None,
            current: None,
            next: None,
            track_start: Instant::now(),
            buffers: BufferSlots::new(buffer_dir),
            prefetch_busy: false,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    pub fn can_prefetch(&self) -> bool {
        self.next.is_none() && !self.prefetch_busy
    }

    /// Claim the prefetch guard and the destination buffer file. `None` when
    /// a prefetch is already pending or complete.
    pub fn begin_prefetch(&mut self) -> Option<PathBuf> {
        if !self.can_prefetch() {
            return None;
        }
        self.prefetch_busy = true;
        Some(self.buffers.download_path().to_path_buf())
    }

    /// Store a finished download as the next track and flip the buffer side.
    pub fn complete_prefetch(&mut self, track: Track) {
        let path = self.buffers.download_path().to_path_buf();
        self.buffers.mark_downloaded();
        debug!(title = %track.title, path = %path.display(), "prefetched next track");
        self.next = Some(NextTrack { track, path });
        self.prefetch_busy = false;
    }

    /// Release the guard after a failed fetch or download; the next stream
    /// tick retries. Parity is untouched.
    pub fn fail_prefetch(&mut self) {
        self.prefetch_busy = false;
    }

    /// Shift previous←current, current←next, next←empty and restart the
    /// track clock. The only way `current` changes. No-op when nothing has
    /// been prefetched. Returns the buffer file the player should be fed.
    pub fn advance(&mut self) -> Option<PathBuf> {
        let next = self.next.take()?;
        self.previous = self.current.take();
        self.current = Some(next.track);
        self.track_start = Instant::now();
        Some(next.path)
    }

    /// Metadata-based countdown: `duration - (now - track_start)`. Negative
    /// means "unknown, skip this update" (typical right after an un-pause or
    /// seek), never "track over".
    pub fn time_remaining(&self) -> i64 {
        let Some(current) = &self.current else {
            return -1;
        };
        current.duration_secs as i64 - self.track_start.elapsed().as_secs() as i64
    }

    /// Re-point the session at another station. A prefetched track belongs
    /// to the old station, so it is dropped; current playback keeps going
    /// until the caller skips.
    pub fn change_station(&mut self, id: u64, name: String) {
        debug!(station = %name, id, "changing station");
        self.station_id = id;
        self.station_name = Some(name);
        self.next = None;
        self.prefetch_busy = false;
    }
}
