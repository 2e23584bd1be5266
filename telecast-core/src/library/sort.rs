use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::fetcher::CatalogItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Title,
    Year,
    Rating,
    AddedAt,
    ViewCount,
    LastViewedAt,
    SeriesTitle,
    Episode,
    Duration,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDescriptor {
    pub key: SortKey,
    pub order: SortOrder,
}

impl Default for SortDescriptor {
    fn default() -> Self {
        Self {
            key: SortKey::Title,
            order: SortOrder::Ascending,
        }
    }
}

impl SortDescriptor {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }
}

/// Sort in place. Missing attributes fall back to deterministic values
/// (empty string, zero, or an epoch-distant date) instead of failing.
/// Random shuffles with the supplied generator and ignores the order.
pub fn apply_sort<R: Rng>(items: &mut [CatalogItem], descriptor: &SortDescriptor, rng: &mut R) {
    if descriptor.key == SortKey::Random {
        items.shuffle(rng);
        return;
    }
    items.sort_by(|left, right| {
        let ordering = compare(left, right, descriptor.key);
        match descriptor.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
}

fn compare(left: &CatalogItem, right: &CatalogItem, key: SortKey) -> Ordering {
    match key {
        SortKey::Title => title_key(left).cmp(&title_key(right)),
        SortKey::SeriesTitle => series_key(left).cmp(&series_key(right)),
        SortKey::Year | SortKey::Rating | SortKey::ViewCount | SortKey::Duration => {
            number(left, key)
                .partial_cmp(&number(right, key))
                .unwrap_or(Ordering::Equal)
        }
        SortKey::AddedAt | SortKey::LastViewedAt => date(left, key).cmp(&date(right, key)),
        SortKey::Episode => episode_key(left).cmp(&episode_key(right)),
        SortKey::Random => Ordering::Equal,
    }
}

fn title_key(item: &CatalogItem) -> String {
    item.title.to_lowercase()
}

fn series_key(item: &CatalogItem) -> String {
    item.metadata
        .as_ref()
        .and_then(|meta| meta.series_title.as_deref())
        .unwrap_or("")
        .to_lowercase()
}

fn number(item: &CatalogItem, key: SortKey) -> f64 {
    let meta = item.metadata.as_ref();
    match key {
        SortKey::Year => meta.and_then(|meta| meta.year).map(f64::from).unwrap_or(0.0),
        SortKey::Rating => meta.and_then(|meta| meta.rating).unwrap_or(0.0),
        SortKey::ViewCount => meta
            .and_then(|meta| meta.view_count)
            .map(|count| count as f64)
            .unwrap_or(0.0),
        SortKey::Duration => item.duration_s.unwrap_or(0.0),
        _ => 0.0,
    }
}

fn date(item: &CatalogItem, key: SortKey) -> DateTime<Utc> {
    let meta = item.metadata.as_ref();
    let value = match key {
        SortKey::AddedAt => meta.and_then(|meta| meta.added_at),
        SortKey::LastViewedAt => meta.and_then(|meta| meta.last_viewed_at),
        _ => None,
    };
    value.unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn episode_key(item: &CatalogItem) -> (i64, i64) {
    let meta = item.metadata.as_ref();
    (
        meta.and_then(|meta| meta.season).unwrap_or(0),
        meta.and_then(|meta| meta.episode).unwrap_or(0),
    )
}
