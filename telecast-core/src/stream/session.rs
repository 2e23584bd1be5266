use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::config::NetworkSection;

use super::error::{StreamError, StreamResult};
use super::models::{AuthToken, SessionContext, TechnicalMetadata};

/// Supplies the ordered endpoint and token candidates for the active
/// session. Implemented by the auth/device-linking layer.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current(&self) -> StreamResult<SessionContext>;
}

/// Fetches live technical metadata for an item against one endpoint/token
/// pair. Implemented over HTTP in production; tests substitute fakes.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    async fn fetch_technical(
        &self,
        endpoint: &Url,
        token: &AuthToken,
        item_id: &str,
    ) -> StreamResult<TechnicalMetadata>;
}

pub struct HttpMetadataClient {
    client: reqwest::Client,
}

impl fmt::Debug for HttpMetadataClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpMetadataClient").finish()
    }
}

impl HttpMetadataClient {
    pub fn new(network: &NetworkSection) -> StreamResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(network.connect_timeout_seconds))
            .timeout(Duration::from_secs(network.request_timeout_seconds))
            .user_agent(network.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MetadataClient for HttpMetadataClient {
    async fn fetch_technical(
        &self,
        endpoint: &Url,
        token: &AuthToken,
        item_id: &str,
    ) -> StreamResult<TechnicalMetadata> {
        let url = endpoint.join(&format!("library/metadata/{item_id}"))?;
        let response = self
            .client
            .get(url)
            .query(&[("token", token.secret.as_str())])
            .send()
            .await?;
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(StreamError::Unauthorized {
                endpoint: endpoint.to_string(),
            });
        }
        if !status.is_success() {
            return Err(StreamError::BadResponse {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Buffering,
    Stopped,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Buffering => "buffering",
            PlaybackState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct TimelineUpdate {
    pub session_id: String,
    pub item_id: String,
    pub offset_s: f64,
    pub state: PlaybackState,
    pub duration_s: f64,
}

/// Best-effort playback telemetry sink. Implementations must never block
/// the playback path on delivery; failures are logged and swallowed.
#[async_trait]
pub trait TimelineReporter: Send + Sync {
    async fn report(&self, update: &TimelineUpdate);
}

pub struct HttpTimelineReporter {
    client: reqwest::Client,
    endpoint: Url,
    token: String,
}

impl fmt::Debug for HttpTimelineReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTimelineReporter")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl HttpTimelineReporter {
    pub fn new(network: &NetworkSection, endpoint: Url, token: String) -> StreamResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(network.connect_timeout_seconds))
            .timeout(Duration::from_secs(network.request_timeout_seconds))
            .user_agent(network.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            endpoint,
            token,
        })
    }
}

#[async_trait]
impl TimelineReporter for HttpTimelineReporter {
    async fn report(&self, update: &TimelineUpdate) {
        let url = match self.endpoint.join("timeline") {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(target: "stream.timeline", error = %err, "invalid timeline url");
                return;
            }
        };
        let offset_ms = (update.offset_s * 1000.0) as u64;
        let duration_ms = (update.duration_s * 1000.0) as u64;
        let outcome = self
            .client
            .get(url)
            .query(&[
                ("session", update.session_id.as_str()),
                ("key", update.item_id.as_str()),
                ("state", update.state.as_str()),
                ("time", &offset_ms.to_string()),
                ("duration", &duration_ms.to_string()),
                ("token", self.token.as_str()),
            ])
            .send()
            .await;
        if let Err(err) = outcome {
            tracing::debug!(
                target: "stream.timeline",
                session = %update.session_id,
                error = %err,
                "timeline report dropped"
            );
        }
    }
}
