use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TelecastConfig {
    #[serde(default)]
    pub library: LibrarySection,
    #[serde(default)]
    pub stream: StreamSection,
    #[serde(default)]
    pub recovery: RecoverySection,
    #[serde(default)]
    pub network: NetworkSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySection {
    pub cache_dir: String,
    pub snapshot_refresh_seconds: u64,
    pub snapshot_poll_interval_ms: u64,
    pub snapshot_poll_attempts: u32,
    pub fetch_page_size: usize,
    pub snapshot_schema_version: u32,
}

impl Default for LibrarySection {
    fn default() -> Self {
        Self {
            cache_dir: "cache/snapshots".into(),
            snapshot_refresh_seconds: 3600,
            snapshot_poll_interval_ms: 150,
            snapshot_poll_attempts: 200,
            fetch_page_size: 200,
            snapshot_schema_version: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamSection {
    pub video_passthrough_codecs: Vec<String>,
    pub audio_passthrough_codecs: Vec<String>,
    pub unreliable_container: String,
    pub transcode_video_codec: String,
    pub transcode_audio_codec: String,
    pub default_bitrate_kbps: u32,
    pub transcode_path: String,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            video_passthrough_codecs: vec!["h264".into(), "hevc".into()],
            audio_passthrough_codecs: vec![
                "aac".into(),
                "ac3".into(),
                "eac3".into(),
                "mp3".into(),
            ],
            unreliable_container: "avi".into(),
            transcode_video_codec: "h264".into(),
            transcode_audio_codec: "aac".into(),
            default_bitrate_kbps: 8000,
            transcode_path: "/video/:/transcode/universal/start.m3u8".into(),
        }
    }
}

/// Adaptive recovery tuning. The reductions, windows, and cutoffs are
/// empirically tuned policy values, not derived constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecoverySection {
    pub cooldown_seconds: u64,
    pub late_stall_cutoff_seconds: u64,
    pub throughput_ratio: f64,
    pub throughput_window_seconds: u64,
    pub first_reduction_percent: u32,
    pub later_reduction_percent: u32,
    pub escalate_after_downshifts: u32,
    pub forced_transcode_start_kbps: u32,
    pub floor_kbps: u32,
    pub timeline_interval_seconds: u64,
}

impl Default for RecoverySection {
    fn default() -> Self {
        Self {
            cooldown_seconds: 5,
            late_stall_cutoff_seconds: 45,
            throughput_ratio: 0.6,
            throughput_window_seconds: 5,
            first_reduction_percent: 40,
            later_reduction_percent: 30,
            escalate_after_downshifts: 2,
            forced_transcode_start_kbps: 4000,
            floor_kbps: 800,
            timeline_interval_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub connect_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 5,
            request_timeout_seconds: 30,
            user_agent: "telecast/0.1".into(),
        }
    }
}

pub fn load_telecast_config<P: AsRef<Path>>(path: P) -> Result<TelecastConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
