//! HTTP client for the station metadata service: next-track fetch, media
//! download, station search, and votes.
//!
//! Every failure here is recoverable by design — callers log and retry on a
//! later tick rather than tearing playback down.

use std::path::Path;

use tracing::{debug, warn};

use tape_proto::config::StationConfig;
use tape_proto::track::{NextTrackPayload, StationSummary, Track};

// The service rejects requests that don't look like its own web client, so
// every call carries this header set verbatim.
const HDR_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";
const HDR_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";
const HDR_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_8_3) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/27.0.1453.93 Safari/537.36";

#[derive(Debug, thiserror::Error)]
pub enum StationError {
    #[error("station service unreachable: {0}")]
    RemoteUnavailable(#[source] reqwest::Error),
    #[error("station service returned a malformed response: {0}")]
    MalformedResponse(#[source] reqwest::Error),
    #[error("media download failed: {0}")]
    DownloadFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    fn as_str(self) -> &'static str {
        match self {
            VoteDirection::Up => "up",
            VoteDirection::Down => "down",
        }
    }
}

/// A prefetched track together with the URL its media streams from.
#[derive(Debug)]
pub struct FetchedTrack {
    pub track: Track,
    pub listen_url: String,
}

pub struct StationClient {
    client: reqwest::Client,
    base_url: String,
    cover_size: String,
    format: String,
}

impl StationClient {
    pub fn new(config: &StationConfig) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static(HDR_CONTENT_TYPE),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(HDR_ACCEPT),
        );

        let client = reqwest::Client::builder()
            .user_agent(HDR_USER_AGENT)
            .default_headers(headers)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            cover_size: config.cover_size.clone(),
            format: config.format.clone(),
        }
    }

    /// Ask the station for its next track. The body is the pre-encoded form
    /// the service expects; `buffer=0` tells it we do our own buffering.
    pub async fn fetch_next(&self, station_id: u64) -> Result<FetchedTrack, StationError> {
        let url = format!("{}/station/{}/next", self.base_url, station_id);
        let body = format!(
            "cover_size={}&format={}&buffer=0",
            self.cover_size, self.format
        );
        debug!(%url, "fetching next track");

        let response = self
            .client
            .post(&url)
            .body(body)
            .send()
            .await
            .map_err(StationError::RemoteUnavailable)?
            .error_for_status()
            .map_err(StationError::RemoteUnavailable)?;

        let payload: NextTrackPayload = response
            .json()
            .await
            .map_err(StationError::MalformedResponse)?;

        Ok(FetchedTrack {
            listen_url: payload.listen_url,
            track: payload.song.into(),
        })
    }

    /// Download a track's media into `dest`, replacing whatever the file
    /// held. The file is only worth playing once this returns Ok.
    pub async fn download(&self, listen_url: &str, dest: &Path) -> Result<(), StationError> {
        debug!(url = %listen_url, dest = %dest.display(), "downloading media");

        let response = self
            .client
            .get(listen_url)
            .send()
            .await
            .map_err(|e| StationError::DownloadFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| StationError::DownloadFailed(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StationError::DownloadFailed(e.to_string()))?;

        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| StationError::DownloadFailed(e.to_string()))?;

        debug!(len = bytes.len(), "media written");
        Ok(())
    }

    /// Free-text station search. An empty result list is a valid outcome,
    /// not an error.
    pub async fn search(&self, query: &str) -> Result<Vec<StationSummary>, StationError> {
        let url = format!("{}/search/station", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(StationError::RemoteUnavailable)?
            .error_for_status()
            .map_err(StationError::RemoteUnavailable)?;

        response
            .json()
            .await
            .map_err(StationError::MalformedResponse)
    }

    /// Record a vote on a track. Fire-and-forget from the caller's point of
    /// view: failures are logged here and never surface.
    pub async fn vote(&self, station_id: u64, track_id: u64, direction: VoteDirection) {
        let url = format!(
            "{}/station/{}/song/{}/vote/{}",
            self.base_url,
            station_id,
            track_id,
            direction.as_str()
        );
        match self.client.post(&url).send().await {
            Ok(response) => {
                if let Err(err) = response.error_for_status() {
                    warn!(%err, "vote rejected");
                }
            }
            Err(err) => warn!(%err, "vote not delivered"),
        }
    }
}
