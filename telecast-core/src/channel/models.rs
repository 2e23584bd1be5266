use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog item classification. Series act as parents of episodes for the
/// two-phase filter path; every other kind is flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Series,
    Episode,
    Clip,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "series",
            MediaKind::Episode => "episode",
            MediaKind::Clip => "clip",
        }
    }

    pub fn hierarchical(&self) -> bool {
        matches!(self, MediaKind::Series)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaKind::Movie),
            "series" => Ok(MediaKind::Series),
            "episode" => Ok(MediaKind::Episode),
            "clip" => Ok(MediaKind::Clip),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// Artwork candidate paths ordered by preference. Each surface falls back
/// independently of the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtworkSet {
    #[serde(default)]
    pub background: Vec<String>,
    #[serde(default)]
    pub poster: Vec<String>,
    #[serde(default)]
    pub logo: Vec<String>,
}

impl ArtworkSet {
    pub fn background(&self) -> Option<&str> {
        self.background.first().map(String::as_str)
    }

    pub fn poster(&self) -> Option<&str> {
        self.poster.first().map(String::as_str)
    }

    pub fn logo(&self) -> Option<&str> {
        self.logo.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    pub year: Option<i32>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub air_date: Option<DateTime<Utc>>,
    pub added_at: Option<DateTime<Utc>>,
    pub rating: Option<f64>,
    pub content_rating: Option<String>,
    pub studio: Option<String>,
    pub view_count: Option<i64>,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub series_title: Option<String>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
}

/// A single schedulable entry in a channel's loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    #[serde(rename = "durationSeconds")]
    pub duration_s: f64,
    pub part_path: Option<String>,
    pub metadata: Option<MediaMetadata>,
    #[serde(default)]
    pub artwork: ArtworkSet,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, duration_s: f64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration_s,
            part_path: None,
            metadata: None,
            artwork: ArtworkSet::default(),
        }
    }

    pub fn schedulable(&self) -> bool {
        self.duration_s > 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOptions {
    #[serde(default)]
    pub shuffle: bool,
}

/// A looping virtual broadcast: an ordered playlist plus the anchor instant
/// the loop is considered to have started from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub library_key: String,
    pub library_type: MediaKind,
    pub created_at: DateTime<Utc>,
    pub schedule_anchor: DateTime<Utc>,
    pub items: Vec<MediaItem>,
    #[serde(default)]
    pub source_libraries: Vec<String>,
    #[serde(default)]
    pub options: ChannelOptions,
    pub provenance: Option<String>,
}

impl Channel {
    /// Build a channel from projected media. When the shuffle option is set
    /// the item order is permuted with a generator seeded from the channel
    /// id, so every process derives the same loop.
    pub fn new(
        name: impl Into<String>,
        library_key: impl Into<String>,
        library_type: MediaKind,
        anchor: DateTime<Utc>,
        mut items: Vec<MediaItem>,
        options: ChannelOptions,
    ) -> Self {
        let id = Uuid::new_v4();
        if options.shuffle {
            let mut rng = ChaCha20Rng::from_seed(shuffle_seed(&id));
            items.shuffle(&mut rng);
        }
        Self {
            id,
            name: name.into(),
            library_key: library_key.into(),
            library_type,
            created_at: anchor,
            schedule_anchor: anchor,
            items,
            source_libraries: Vec::new(),
            options,
            provenance: None,
        }
    }

    /// The seed the shuffle option derives from this channel's id.
    pub fn shuffle_seed(&self) -> [u8; 32] {
        shuffle_seed(&self.id)
    }

    /// Sum of item durations; the length of one loop in seconds.
    pub fn total_duration_s(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.duration_s.max(0.0))
            .sum()
    }
}

fn shuffle_seed(id: &Uuid) -> [u8; 32] {
    let mut seed = [0u8; 32];
    seed[..16].copy_from_slice(id.as_bytes());
    seed[16..].copy_from_slice(id.as_bytes());
    seed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, duration: f64) -> MediaItem {
        MediaItem::new(id, format!("title-{id}"), duration)
    }

    #[test]
    fn serialized_channel_shape_uses_camel_case_keys() {
        let channel = Channel::new(
            "Late Night",
            "lib-1",
            MediaKind::Movie,
            Utc::now(),
            vec![item("a", 100.0)],
            ChannelOptions::default(),
        );
        let value = serde_json::to_value(&channel).unwrap();
        let object = value.as_object().unwrap();
        for key in [
            "id",
            "name",
            "libraryKey",
            "libraryType",
            "createdAt",
            "scheduleAnchor",
            "items",
            "sourceLibraries",
            "options",
            "provenance",
        ] {
            assert!(object.contains_key(key), "missing key {key}");
        }
    }

    #[test]
    fn shuffle_is_deterministic_per_channel_id() {
        let items: Vec<MediaItem> = (0..32).map(|idx| item(&idx.to_string(), 60.0)).collect();
        let channel = Channel::new(
            "Shuffled",
            "lib-1",
            MediaKind::Movie,
            Utc::now(),
            items.clone(),
            ChannelOptions { shuffle: true },
        );
        let mut rng = ChaCha20Rng::from_seed(channel.shuffle_seed());
        let mut expected = items;
        expected.shuffle(&mut rng);
        assert_eq!(channel.items, expected);
    }

    #[test]
    fn total_duration_ignores_negative_durations() {
        let mut channel = Channel::new(
            "Broken",
            "lib-1",
            MediaKind::Movie,
            Utc::now(),
            vec![item("a", 120.0), item("b", -5.0)],
            ChannelOptions::default(),
        );
        assert!((channel.total_duration_s() - 120.0).abs() < f64::EPSILON);
        channel.items.clear();
        assert_eq!(channel.total_duration_s(), 0.0);
    }
}
