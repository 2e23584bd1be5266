use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// How the media bytes reach the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Original bytes served unmodified.
    DirectPlay,
    /// Server-side packaged stream, remuxed or transcoded.
    AdaptiveStream,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeliveryMode::DirectPlay => "direct_play",
            DeliveryMode::AdaptiveStream => "adaptive_stream",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClass {
    Server,
    Account,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub class: TokenClass,
    pub secret: String,
}

impl AuthToken {
    pub fn server(secret: impl Into<String>) -> Self {
        Self {
            class: TokenClass::Server,
            secret: secret.into(),
        }
    }

    pub fn account(secret: impl Into<String>) -> Self {
        Self {
            class: TokenClass::Account,
            secret: secret.into(),
        }
    }
}

/// Ordered endpoint and token candidates for the active session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub endpoints: Vec<Url>,
    pub tokens: Vec<AuthToken>,
    pub device_id: String,
}

/// Caller intent for one plan resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOptions {
    pub prefer_passthrough: bool,
    pub force_remux: bool,
    pub force_transcode: bool,
    pub max_bitrate_kbps: Option<u32>,
    /// Suffix the session id so the server opens a brand-new transcoder
    /// session instead of resuming a wedged one.
    pub fresh_session: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            prefer_passthrough: true,
            force_remux: false,
            force_transcode: false,
            max_bitrate_kbps: None,
            fresh_session: false,
        }
    }
}

/// Codec/bitrate negotiation outcome carried alongside the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Negotiation {
    pub direct_play: bool,
    pub direct_stream: bool,
    pub bitrate_cap_kbps: Option<u32>,
}

/// The resolved, concrete instruction for playing one item.
#[derive(Debug, Clone)]
pub struct StreamPlan {
    pub mode: DeliveryMode,
    pub url: Url,
    pub start_offset_s: f64,
    pub reason: String,
    pub token_class: TokenClass,
    pub endpoint: Url,
    pub options: PlanOptions,
    pub negotiation: Negotiation,
    pub session_id: String,
}

impl StreamPlan {
    /// Stream copy: adaptive container, but no re-encode is happening, so
    /// there is no bitrate to reduce.
    pub fn is_stream_copy(&self) -> bool {
        self.mode == DeliveryMode::AdaptiveStream && self.negotiation.direct_stream
    }
}

/// Live technical metadata for one item, fetched per resolution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalMetadata {
    pub video_codec: String,
    #[serde(default)]
    pub audio_codecs: Vec<String>,
    pub container: String,
    pub part_path: Option<String>,
    pub bitrate_kbps: Option<u32>,
}
