use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::channel::MediaKind;
use crate::config::LibrarySection;

use super::fetcher::{CatalogError, CatalogItem, CatalogResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub library: String,
    pub kind: MediaKind,
}

impl SnapshotKey {
    pub fn new(library: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            library: library.into(),
            kind,
        }
    }

    pub fn token(&self) -> String {
        format!("{}/{}", self.library, self.kind)
    }

    fn file_name(&self) -> String {
        let digest = Sha256::digest(self.token().as_bytes());
        format!("{}.json.gz", &hex::encode(digest)[..16])
    }
}

/// Persisted snapshot envelope.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotFile {
    schema_version: u32,
    fetched_at: DateTime<Utc>,
    item_count: usize,
    key: String,
    items: Vec<CatalogItem>,
}

#[derive(Debug, Clone)]
struct CachedSnapshot {
    fetched_at: DateTime<Utc>,
    items: Vec<CatalogItem>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<SnapshotKey, CachedSnapshot>,
    in_flight: HashSet<SnapshotKey>,
    refresh_marks: HashMap<SnapshotKey, DateTime<Utc>>,
}

/// Per-(library, kind) snapshot cache: memory in front of gzipped JSON
/// files in front of the network. Reads and writes for one key are
/// serialized through the in-flight marker; distinct keys are independent.
pub struct SnapshotCache {
    dir: PathBuf,
    schema_version: u32,
    refresh_interval: Duration,
    poll_interval: StdDuration,
    poll_attempts: u32,
    state: Mutex<CacheState>,
}

impl SnapshotCache {
    pub fn new(config: &LibrarySection) -> Self {
        Self {
            dir: PathBuf::from(&config.cache_dir),
            schema_version: config.snapshot_schema_version,
            refresh_interval: Duration::seconds(config.snapshot_refresh_seconds as i64),
            poll_interval: StdDuration::from_millis(config.snapshot_poll_interval_ms),
            poll_attempts: config.snapshot_poll_attempts,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Serve `key` from memory, then disk, then the supplied fetch. A
    /// caller arriving while another fetch for the same key is in flight
    /// polls for that fetch's result instead of issuing its own; poll
    /// exhaustion reports a timeout rather than breaking the guarantee.
    pub async fn read_through<F, Fut>(
        &self,
        key: &SnapshotKey,
        fetch: F,
    ) -> CatalogResult<Vec<CatalogItem>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CatalogResult<Vec<CatalogItem>>>,
    {
        let mut polls = 0u32;
        loop {
            let mut state = self.state.lock().await;
            if let Some(entry) = state.entries.get(key) {
                return Ok(entry.items.clone());
            }
            if state.in_flight.contains(key) {
                drop(state);
                polls += 1;
                if polls > self.poll_attempts {
                    tracing::warn!(
                        target: "library.cache",
                        key = %key.token(),
                        "gave up waiting on in-flight snapshot fetch"
                    );
                    return Err(CatalogError::Timeout);
                }
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }
            state.in_flight.insert(key.clone());
            drop(state);
            return self.fill(key, fetch).await;
        }
    }

    async fn fill<F, Fut>(&self, key: &SnapshotKey, fetch: F) -> CatalogResult<Vec<CatalogItem>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CatalogResult<Vec<CatalogItem>>>,
    {
        if let Some(snapshot) = self.load_from_disk(key).await {
            let items = snapshot.items.clone();
            let mut state = self.state.lock().await;
            state.entries.insert(key.clone(), snapshot);
            state.in_flight.remove(key);
            return Ok(items);
        }

        let fetched = fetch().await;
        let mut state = self.state.lock().await;
        state.in_flight.remove(key);
        match fetched {
            Ok(items) => {
                let now = Utc::now();
                let snapshot = CachedSnapshot {
                    fetched_at: now,
                    items: items.clone(),
                };
                state.entries.insert(key.clone(), snapshot);
                drop(state);
                self.persist(key, now, &items).await;
                Ok(items)
            }
            Err(err) => {
                tracing::warn!(
                    target: "library.cache",
                    key = %key.token(),
                    error = %err,
                    "snapshot fetch failed"
                );
                Err(err)
            }
        }
    }

    /// Whether `key` is stale enough to refresh. Marks the key so repeated
    /// calls within the interval do not re-trigger a refresh.
    pub async fn needs_refresh(&self, key: &SnapshotKey, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().await;
        let Some(entry) = state.entries.get(key) else {
            return false;
        };
        if now - entry.fetched_at < self.refresh_interval {
            return false;
        }
        if let Some(mark) = state.refresh_marks.get(key) {
            if now - *mark < self.refresh_interval {
                return false;
            }
        }
        state.refresh_marks.insert(key.clone(), now);
        true
    }

    /// Re-fetch `key` and merge into the cached snapshot: items still
    /// present keep their cached instances (and enrichment), new items are
    /// appended, absent ones are dropped.
    pub async fn refresh_with<F, Fut>(
        &self,
        key: &SnapshotKey,
        fetch: F,
    ) -> CatalogResult<Vec<CatalogItem>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CatalogResult<Vec<CatalogItem>>>,
    {
        let fetched = fetch().await?;
        let now = Utc::now();
        let merged = {
            let mut state = self.state.lock().await;
            let existing = state
                .entries
                .get(key)
                .map(|entry| entry.items.clone())
                .unwrap_or_default();
            let merged = merge_items(&existing, fetched);
            state.entries.insert(
                key.clone(),
                CachedSnapshot {
                    fetched_at: now,
                    items: merged.clone(),
                },
            );
            merged
        };
        self.persist(key, now, &merged).await;
        tracing::debug!(
            target: "library.cache",
            key = %key.token(),
            items = merged.len(),
            "snapshot refreshed"
        );
        Ok(merged)
    }

    /// Drop every cached entry, in memory and on disk.
    pub async fn purge(&self) -> std::io::Result<()> {
        {
            let mut state = self.state.lock().await;
            state.entries.clear();
            state.refresh_marks.clear();
        }
        match tokio::fs::read_dir(&self.dir).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await? {
                    let path = entry.path();
                    if path.extension().map(|ext| ext == "gz").unwrap_or(false) {
                        tokio::fs::remove_file(&path).await?;
                    }
                }
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn load_from_disk(&self, key: &SnapshotKey) -> Option<CachedSnapshot> {
        let path = self.dir.join(key.file_name());
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(
                    target: "library.cache",
                    path = %path.display(),
                    error = %err,
                    "failed to read persisted snapshot"
                );
                return None;
            }
        };
        let snapshot = match decode_snapshot(&bytes) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(
                    target: "library.cache",
                    path = %path.display(),
                    error = %err,
                    "discarding unreadable snapshot"
                );
                return None;
            }
        };
        if snapshot.schema_version != self.schema_version {
            tracing::debug!(
                target: "library.cache",
                key = %key.token(),
                found = snapshot.schema_version,
                expected = self.schema_version,
                "discarding snapshot with old schema"
            );
            return None;
        }
        Some(CachedSnapshot {
            fetched_at: snapshot.fetched_at,
            items: snapshot.items,
        })
    }

    /// Write-then-rename so a crash mid-write can never clobber a good
    /// snapshot. Persistence failures are logged, not surfaced; the memory
    /// layer stays authoritative.
    async fn persist(&self, key: &SnapshotKey, fetched_at: DateTime<Utc>, items: &[CatalogItem]) {
        let file = SnapshotFile {
            schema_version: self.schema_version,
            fetched_at,
            item_count: items.len(),
            key: key.token(),
            items: items.to_vec(),
        };
        let path = self.dir.join(key.file_name());
        if let Err(err) = self.write_atomic(&path, &file).await {
            tracing::warn!(
                target: "library.cache",
                path = %path.display(),
                error = %err,
                "failed to persist snapshot"
            );
        }
    }

    async fn write_atomic(&self, path: &Path, file: &SnapshotFile) -> CatalogResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = encode_snapshot(file)?;
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &bytes).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }
}

fn encode_snapshot(file: &SnapshotFile) -> CatalogResult<Vec<u8>> {
    let json = serde_json::to_vec(file)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

fn decode_snapshot(bytes: &[u8]) -> CatalogResult<SnapshotFile> {
    let mut decoder = GzDecoder::new(bytes);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Incremental merge: cached instances survive when the new fetch still
/// contains their id, new ids are appended in fetch order, and ids absent
/// from the new fetch are dropped.
pub fn merge_items(existing: &[CatalogItem], fetched: Vec<CatalogItem>) -> Vec<CatalogItem> {
    let fetched_ids: HashSet<&str> = fetched.iter().map(|item| item.id.as_str()).collect();
    let mut merged: Vec<CatalogItem> = existing
        .iter()
        .filter(|item| fetched_ids.contains(item.id.as_str()))
        .cloned()
        .collect();
    let kept: HashSet<String> = merged.iter().map(|item| item.id.clone()).collect();
    merged.extend(
        fetched
            .into_iter()
            .filter(|item| !kept.contains(&item.id)),
    );
    merged
}
