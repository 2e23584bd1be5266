use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use crate::channel::{MediaItem, MediaKind};
use crate::config::LibrarySection;
use crate::filter::FilterGroup;

use super::cache::{SnapshotCache, SnapshotKey};
use super::fetcher::{fetch_all, fetch_all_children, CatalogItem, CatalogResult, MediaFetcher};
use super::sort::{apply_sort, SortDescriptor};

const CHILD_FETCH_CONCURRENCY: usize = 4;

/// Serves filtered, sorted, channel-ready views over per-library snapshots
/// without re-fetching on every query.
pub struct LibraryOrchestrator {
    fetcher: Arc<dyn MediaFetcher>,
    cache: Arc<SnapshotCache>,
    page_size: usize,
}

impl LibraryOrchestrator {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        cache: Arc<SnapshotCache>,
        config: &LibrarySection,
    ) -> Self {
        Self {
            fetcher,
            cache,
            page_size: config.fetch_page_size,
        }
    }

    /// The cached item set for one (library, kind), fetching on a cold
    /// cache and scheduling a throttled background refresh on a stale one.
    pub async fn snapshot(
        &self,
        library: &str,
        kind: MediaKind,
    ) -> CatalogResult<Vec<CatalogItem>> {
        let key = SnapshotKey::new(library, kind);
        let fetcher = self.fetcher.clone();
        let page_size = self.page_size;
        let library_owned = library.to_string();
        let items = self
            .cache
            .read_through(&key, move || async move {
                fetch_all(fetcher.as_ref(), &library_owned, kind, page_size).await
            })
            .await?;

        if self.cache.needs_refresh(&key, Utc::now()).await {
            self.spawn_refresh(key);
        }
        Ok(items)
    }

    fn spawn_refresh(&self, key: SnapshotKey) {
        let cache = self.cache.clone();
        let fetcher = self.fetcher.clone();
        let page_size = self.page_size;
        tokio::spawn(async move {
            let library = key.library.clone();
            let kind = key.kind;
            let outcome = cache
                .refresh_with(&key, move || async move {
                    fetch_all(fetcher.as_ref(), &library, kind, page_size).await
                })
                .await;
            if let Err(err) = outcome {
                warn!(
                    target: "library",
                    key = %key.token(),
                    error = %err,
                    "background snapshot refresh failed"
                );
            }
        });
    }

    /// Evaluate `filter` over the library and project the survivors into
    /// channel-ready media, sorted and truncated to `limit`.
    ///
    /// Hierarchical libraries run the two-phase path: the parent-scoped
    /// subtree prunes series first, children of the survivors are unioned,
    /// and the child-scoped subtree is applied to that union.
    pub async fn build_channel_media(
        &self,
        library: &str,
        kind: MediaKind,
        filter: &FilterGroup,
        sort: &SortDescriptor,
        limit: Option<usize>,
    ) -> CatalogResult<Vec<MediaItem>> {
        let now = Utc::now();
        let mut matched = if kind.hierarchical() {
            let (parent_filter, child_filter) = filter.partition_by_scope();
            let parents = self.snapshot(library, kind).await?;
            let survivors: Vec<&CatalogItem> = parents
                .iter()
                .filter(|parent| parent_filter.matches(*parent, now))
                .collect();
            debug!(
                target: "library",
                library,
                parents = parents.len(),
                survivors = survivors.len(),
                "parent phase complete"
            );
            // Bounded fan-out over surviving parents; `buffered` keeps the
            // union in parent order so equal sort keys stay stable.
            let batches: Vec<Vec<CatalogItem>> = stream::iter(survivors)
                .map(|parent| {
                    fetch_all_children(self.fetcher.as_ref(), library, &parent.id, self.page_size)
                })
                .buffered(CHILD_FETCH_CONCURRENCY)
                .try_collect()
                .await?;
            batches
                .into_iter()
                .flatten()
                .filter(|child| child_filter.matches(child, now))
                .collect()
        } else {
            self.snapshot(library, kind)
                .await?
                .into_iter()
                .filter(|item| filter.matches(item, now))
                .collect::<Vec<_>>()
        };

        apply_sort(&mut matched, sort, &mut rand::thread_rng());
        if let Some(limit) = limit {
            matched.truncate(limit);
        }

        let total = matched.len();
        let media: Vec<MediaItem> = matched
            .iter()
            .filter_map(CatalogItem::to_media_item)
            .collect();
        if media.len() < total {
            debug!(
                target: "library",
                library,
                dropped = total - media.len(),
                "dropped items without a schedulable duration"
            );
        }
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::tempdir;

    use crate::channel::MediaMetadata;
    use crate::filter::{
        FilterField, FilterOperator, FilterRule, FilterValue, MatchMode,
    };
    use crate::library::fetcher::PageCursor;
    use crate::library::sort::{SortKey, SortOrder};

    use super::*;

    struct FakeCatalog {
        series: Vec<CatalogItem>,
        episodes: HashMap<String, Vec<CatalogItem>>,
        movies: Vec<CatalogItem>,
        fetches: AtomicUsize,
        child_fetches: AtomicUsize,
    }

    #[async_trait]
    impl MediaFetcher for FakeCatalog {
        async fn fetch_page(
            &self,
            _library: &str,
            kind: MediaKind,
            cursor: PageCursor,
        ) -> CatalogResult<Vec<CatalogItem>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let source = match kind {
                MediaKind::Series => &self.series,
                _ => &self.movies,
            };
            Ok(source
                .iter()
                .skip(cursor.offset)
                .take(cursor.limit)
                .cloned()
                .collect())
        }

        async fn fetch_children_page(
            &self,
            _library: &str,
            parent_id: &str,
            cursor: PageCursor,
        ) -> CatalogResult<Vec<CatalogItem>> {
            self.child_fetches.fetch_add(1, Ordering::SeqCst);
            let children = self.episodes.get(parent_id).cloned().unwrap_or_default();
            Ok(children
                .into_iter()
                .skip(cursor.offset)
                .take(cursor.limit)
                .collect())
        }
    }

    fn series(id: &str, studio: &str) -> CatalogItem {
        let mut item = CatalogItem::new(id, MediaKind::Series, format!("series {id}"));
        item.metadata = Some(MediaMetadata {
            studio: Some(studio.into()),
            ..MediaMetadata::default()
        });
        item
    }

    fn episode(id: &str, parent: &str, year: i32, duration: Option<f64>) -> CatalogItem {
        let mut item = CatalogItem::new(id, MediaKind::Episode, format!("episode {id}"));
        item.parent_id = Some(parent.into());
        item.duration_s = duration;
        item.metadata = Some(MediaMetadata {
            year: Some(year),
            ..MediaMetadata::default()
        });
        item
    }

    fn movie(id: &str, year: i32) -> CatalogItem {
        let mut item = CatalogItem::new(id, MediaKind::Movie, format!("movie {id}"));
        item.duration_s = Some(3600.0);
        item.metadata = Some(MediaMetadata {
            year: Some(year),
            ..MediaMetadata::default()
        });
        item
    }

    fn orchestrator_with(
        catalog: Arc<FakeCatalog>,
        dir: &std::path::Path,
    ) -> LibraryOrchestrator {
        let config = LibrarySection {
            cache_dir: dir.to_string_lossy().into_owned(),
            ..LibrarySection::default()
        };
        LibraryOrchestrator::new(catalog, Arc::new(SnapshotCache::new(&config)), &config)
    }

    #[tokio::test]
    async fn flat_library_filters_sorts_and_limits() {
        let dir = tempdir().unwrap();
        let catalog = FakeCatalog {
            series: vec![],
            episodes: HashMap::new(),
            movies: vec![movie("a", 1995), movie("b", 2015), movie("c", 2005)],
            fetches: AtomicUsize::new(0),
            child_fetches: AtomicUsize::new(0),
        };
        let orchestrator = orchestrator_with(Arc::new(catalog), dir.path());
        let filter = FilterGroup {
            mode: MatchMode::All,
            rules: vec![FilterRule::new(
                FilterField::Year,
                FilterOperator::GreaterOrEqual,
                FilterValue::Number(2000.0),
            )],
            groups: vec![],
        };
        let media = orchestrator
            .build_channel_media(
                "lib-1",
                MediaKind::Movie,
                &filter,
                &SortDescriptor::new(SortKey::Year, SortOrder::Descending),
                Some(5),
            )
            .await
            .unwrap();
        let ids: Vec<&str> = media.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
    }

    #[tokio::test]
    async fn snapshot_serves_second_query_from_memory() {
        let dir = tempdir().unwrap();
        let catalog = Arc::new(FakeCatalog {
            series: vec![],
            episodes: HashMap::new(),
            movies: vec![movie("a", 2001)],
            fetches: AtomicUsize::new(0),
            child_fetches: AtomicUsize::new(0),
        });
        let orchestrator = orchestrator_with(catalog.clone(), dir.path());
        orchestrator.snapshot("lib-1", MediaKind::Movie).await.unwrap();
        orchestrator.snapshot("lib-1", MediaKind::Movie).await.unwrap();
        // One page fetch for the single short page; the second query hit
        // memory.
        assert_eq!(catalog.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hierarchical_path_only_fetches_children_of_surviving_parents() {
        let dir = tempdir().unwrap();
        let mut episodes = HashMap::new();
        episodes.insert(
            "s1".to_string(),
            vec![
                episode("e1", "s1", 2020, Some(1200.0)),
                episode("e2", "s1", 1990, Some(1200.0)),
            ],
        );
        episodes.insert(
            "s2".to_string(),
            vec![episode("e3", "s2", 2021, Some(1200.0))],
        );
        let catalog = FakeCatalog {
            series: vec![series("s1", "HBO"), series("s2", "Other")],
            episodes,
            movies: vec![],
            fetches: AtomicUsize::new(0),
            child_fetches: AtomicUsize::new(0),
        };
        let orchestrator = orchestrator_with(Arc::new(catalog), dir.path());
        let filter = FilterGroup {
            mode: MatchMode::All,
            rules: vec![
                FilterRule::new(
                    FilterField::Studio,
                    FilterOperator::Equals,
                    FilterValue::Text("hbo".into()),
                ),
                FilterRule::new(
                    FilterField::Year,
                    FilterOperator::GreaterOrEqual,
                    FilterValue::Number(2000.0),
                ),
            ],
            groups: vec![],
        };
        let media = orchestrator
            .build_channel_media(
                "lib-1",
                MediaKind::Series,
                &filter,
                &SortDescriptor::default(),
                None,
            )
            .await
            .unwrap();
        let ids: Vec<&str> = media.iter().map(|item| item.id.as_str()).collect();
        // s2 never survives the parent phase, so e3 is never considered;
        // e2 fails the child-scoped year rule.
        assert_eq!(ids, ["e1"]);
    }

    #[tokio::test]
    async fn projection_drops_items_without_duration() {
        let dir = tempdir().unwrap();
        let mut items = vec![movie("a", 2001)];
        items.push({
            let mut broken = movie("b", 2002);
            broken.duration_s = None;
            broken
        });
        items.push({
            let mut broken = movie("c", 2003);
            broken.duration_s = Some(0.0);
            broken
        });
        let catalog = FakeCatalog {
            series: vec![],
            episodes: HashMap::new(),
            movies: items,
            fetches: AtomicUsize::new(0),
            child_fetches: AtomicUsize::new(0),
        };
        let orchestrator = orchestrator_with(Arc::new(catalog), dir.path());
        let media = orchestrator
            .build_channel_media(
                "lib-1",
                MediaKind::Movie,
                &FilterGroup::default(),
                &SortDescriptor::default(),
                None,
            )
            .await
            .unwrap();
        let ids: Vec<&str> = media.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, ["a"]);
    }
}
