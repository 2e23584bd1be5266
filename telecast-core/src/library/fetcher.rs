use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::{ArtworkSet, MediaItem, MediaKind, MediaMetadata};
use crate::filter::MediaAttributes;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request timed out")]
    Timeout,
    #[error("connection lost during catalog fetch")]
    ConnectionLost,
    #[error("network offline")]
    Offline,
    #[error("host unreachable: {0}")]
    Host(String),
    #[error("catalog request unauthorized")]
    Unauthorized,
    #[error("unexpected catalog response: {0}")]
    BadResponse(String),
    #[error("failed to decode catalog payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("catalog transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("snapshot persistence error: {0}")]
    Persist(#[from] std::io::Error),
}

impl CatalogError {
    /// Network-class failures are retried or rotated internally; structural
    /// failures surface immediately.
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            CatalogError::Timeout
                | CatalogError::ConnectionLost
                | CatalogError::Offline
                | CatalogError::Host(_)
                | CatalogError::Unauthorized
                | CatalogError::BadResponse(_)
                | CatalogError::Transport(_)
        )
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub offset: usize,
    pub limit: usize,
}

impl PageCursor {
    pub fn first(limit: usize) -> Self {
        Self { offset: 0, limit }
    }

    pub fn advance(&self, fetched: usize) -> Self {
        Self {
            offset: self.offset + fetched,
            limit: self.limit,
        }
    }
}

/// A raw catalog record as fetched from the source, before projection into
/// a schedulable `MediaItem`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: String,
    pub parent_id: Option<String>,
    pub kind: MediaKind,
    pub title: String,
    #[serde(rename = "durationSeconds")]
    pub duration_s: Option<f64>,
    pub part_path: Option<String>,
    pub metadata: Option<MediaMetadata>,
    #[serde(default)]
    pub artwork: ArtworkSet,
}

impl CatalogItem {
    pub fn new(id: impl Into<String>, kind: MediaKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            kind,
            title: title.into(),
            duration_s: None,
            part_path: None,
            metadata: None,
            artwork: ArtworkSet::default(),
        }
    }

    /// Project into a channel-ready item. Records without a positive
    /// duration cannot be scheduled and project to `None`.
    pub fn to_media_item(&self) -> Option<MediaItem> {
        let duration_s = self.duration_s.filter(|duration| *duration > 0.0)?;
        Some(MediaItem {
            id: self.id.clone(),
            title: self.title.clone(),
            duration_s,
            part_path: self.part_path.clone(),
            metadata: self.metadata.clone(),
            artwork: self.artwork.clone(),
        })
    }
}

impl MediaAttributes for CatalogItem {
    fn title(&self) -> &str {
        &self.title
    }

    fn metadata(&self) -> Option<&MediaMetadata> {
        self.metadata.as_ref()
    }
}

/// Paged catalog access, implemented by the remote-server collaborator.
/// Re-fetching a page is assumed idempotent.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch_page(
        &self,
        library: &str,
        kind: MediaKind,
        cursor: PageCursor,
    ) -> CatalogResult<Vec<CatalogItem>>;

    /// Children of one parent record (episodes of a series).
    async fn fetch_children_page(
        &self,
        library: &str,
        parent_id: &str,
        cursor: PageCursor,
    ) -> CatalogResult<Vec<CatalogItem>>;
}

/// Drive pagination until an empty or short page.
pub async fn fetch_all(
    fetcher: &dyn MediaFetcher,
    library: &str,
    kind: MediaKind,
    page_size: usize,
) -> CatalogResult<Vec<CatalogItem>> {
    let mut cursor = PageCursor::first(page_size);
    let mut items = Vec::new();
    loop {
        let page = fetcher.fetch_page(library, kind, cursor).await?;
        let fetched = page.len();
        items.extend(page);
        if fetched < cursor.limit {
            return Ok(items);
        }
        cursor = cursor.advance(fetched);
    }
}

pub async fn fetch_all_children(
    fetcher: &dyn MediaFetcher,
    library: &str,
    parent_id: &str,
    page_size: usize,
) -> CatalogResult<Vec<CatalogItem>> {
    let mut cursor = PageCursor::first(page_size);
    let mut items = Vec::new();
    loop {
        let page = fetcher
            .fetch_children_page(library, parent_id, cursor)
            .await?;
        let fetched = page.len();
        items.extend(page);
        if fetched < cursor.limit {
            return Ok(items);
        }
        cursor = cursor.advance(fetched);
    }
}
