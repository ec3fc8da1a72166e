//! Track and station data model, plus the wire shapes of the station
//! service's JSON payloads.

use serde::Deserialize;

/// One playable song. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: u64,
    pub title: String,
    pub artist: String,
    pub duration_secs: u32,
}

/// One row of a station search result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StationSummary {
    pub name: String,
    pub id: u64,
}

/// Response body of `POST /station/{id}/next`.
#[derive(Debug, Deserialize)]
pub struct NextTrackPayload {
    pub listen_url: String,
    pub song: SongPayload,
}

#[derive(Debug, Deserialize)]
pub struct SongPayload {
    pub id: u64,
    pub title: String,
    pub artist: ArtistPayload,
    /// The service reports fractional seconds; we keep whole seconds.
    pub duration: f64,
}

#[derive(Debug, Deserialize)]
pub struct ArtistPayload {
    pub name: String,
}

impl From<SongPayload> for Track {
    fn from(song: SongPayload) -> Self {
        Self {
            id: song.id,
            title: song.title,
            artist: song.artist.name,
            duration_secs: song.duration.max(0.0) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_next_track_payload() {
        let json = r#"{
            "listen_url": "https://cdn.example.com/track-123.mp4",
            "song": {
                "id": 42,
                "title": "Night Drive",
                "artist": { "name": "The Commuters" },
                "duration": 180.48
            }
        }"#;
        let payload: NextTrackPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.listen_url, "https://cdn.example.com/track-123.mp4");

        let track = Track::from(payload.song);
        assert_eq!(track.id, 42);
        assert_eq!(track.title, "Night Drive");
        assert_eq!(track.artist, "The Commuters");
        assert_eq!(track.duration_secs, 180);
    }

    #[test]
    fn test_decode_rejects_missing_song() {
        let json = r#"{ "listen_url": "https://cdn.example.com/x" }"#;
        assert!(serde_json::from_str::<NextTrackPayload>(json).is_err());
    }

    #[test]
    fn test_decode_station_search_results() {
        let json = r#"[
            { "name": "Power Workout", "id": 1393494 },
            { "name": "Slow Jams", "id": 1720488 }
        ]"#;
        let stations: Vec<StationSummary> = serde_json::from_str(json).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].name, "Power Workout");
        assert_eq!(stations[1].id, 1720488);
    }

    #[test]
    fn test_decode_empty_search_results() {
        let stations: Vec<StationSummary> = serde_json::from_str("[]").unwrap();
        assert!(stations.is_empty());
    }

    #[test]
    fn test_negative_duration_clamps_to_zero() {
        let song = SongPayload {
            id: 1,
            title: "t".into(),
            artist: ArtistPayload { name: "a".into() },
            duration: -3.0,
        };
        assert_eq!(Track::from(song).duration_secs, 0);
    }
}
