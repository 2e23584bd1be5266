use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid stream url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("media part missing for item {0}")]
    MissingPart(String),
    #[error("failed to decode server payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unauthorized against {endpoint}")]
    Unauthorized { endpoint: String },
    #[error("bad server response ({status}) from {endpoint}")]
    BadResponse { endpoint: String, status: u16 },
    #[error("stream transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("no endpoint or token candidates available")]
    NoCandidates,
}

impl StreamError {
    /// Token rotation only applies to auth rejections; everything else
    /// moves to the next endpoint.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, StreamError::Unauthorized { .. })
    }
}

pub type StreamResult<T> = Result<T, StreamError>;
