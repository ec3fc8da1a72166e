use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Base URL of the station metadata service API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Cover size requested with each "next track" call.
    #[serde(default = "default_cover_size")]
    pub cover_size: String,
    /// Media format requested with each "next track" call.
    #[serde(default = "default_media_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Name of the external player binary (resolved beside-exe, then PATH).
    #[serde(default = "default_player_binary")]
    pub binary: String,
    /// Seconds jumped forward by the seek command.
    #[serde(default = "default_seek_step")]
    pub seek_step_secs: u32,
    /// How long to wait for one protocol reply line before giving up and
    /// falling back to the cached value.
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_ms: u64,
}

/// Track-advance tunables. The low-water marks have no deeper rationale
/// than "enough headroom for one fetch+download round-trip", so they are
/// configurable rather than baked in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Remaining seconds at which the next track is prefetched.
    #[serde(default = "default_prefetch_low_water")]
    pub prefetch_low_water_secs: i64,
    /// Remaining seconds at which playback advances to the prefetched track.
    #[serde(default = "default_advance_low_water")]
    pub advance_low_water_secs: i64,
    /// Stream timer interval (prefetch/advance decisions).
    #[serde(default = "default_stream_tick")]
    pub stream_tick_ms: u64,
    /// UI refresh timer interval.
    #[serde(default = "default_ui_tick")]
    pub ui_tick_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the two alternating media buffer files.
    #[serde(default = "default_buffer_dir")]
    pub buffer_dir: PathBuf,
    /// Debug log file, truncated at every startup.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            cover_size: default_cover_size(),
            format: default_media_format(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            binary: default_player_binary(),
            seek_step_secs: default_seek_step(),
            reply_timeout_ms: default_reply_timeout(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            prefetch_low_water_secs: default_prefetch_low_water(),
            advance_low_water_secs: default_advance_low_water(),
            stream_tick_ms: default_stream_tick(),
            ui_tick_ms: default_ui_tick(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            buffer_dir: default_buffer_dir(),
            log_file: default_log_file(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://songza.com/api/1".to_string()
}

fn default_cover_size() -> String {
    "m".to_string()
}

fn default_media_format() -> String {
    "aac".to_string()
}

fn default_player_binary() -> String {
    "vlc".to_string()
}

fn default_seek_step() -> u32 {
    30
}

fn default_reply_timeout() -> u64 {
    2000
}

fn default_prefetch_low_water() -> i64 {
    5
}

fn default_advance_low_water() -> i64 {
    1
}

fn default_stream_tick() -> u64 {
    1000
}

fn default_ui_tick() -> u64 {
    500
}

fn default_buffer_dir() -> PathBuf {
    platform::data_dir()
}

fn default_log_file() -> PathBuf {
    platform::data_dir().join("mixzatape.log")
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
