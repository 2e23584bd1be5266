use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Value kind a field declares; operators are only applicable to matching
/// kinds and anything else fails closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Number,
    Bool,
    Date,
    Enum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Title,
    SeriesTitle,
    Studio,
    ContentRating,
    Genre,
    Year,
    Rating,
    ViewCount,
    Season,
    Episode,
    Watched,
    AddedAt,
    AirDate,
    LastViewedAt,
}

/// Fields evaluated against the parent (series) in hierarchical libraries.
/// Hand-maintained: if the catalog schema grows a field, it must be
/// classified here or it will be treated as child-scoped.
pub const PARENT_FIELDS: &[FilterField] = &[
    FilterField::SeriesTitle,
    FilterField::Studio,
    FilterField::ContentRating,
];

impl FilterField {
    pub fn all() -> &'static [FilterField] {
        use FilterField::*;
        &[
            Title,
            SeriesTitle,
            Studio,
            ContentRating,
            Genre,
            Year,
            Rating,
            ViewCount,
            Season,
            Episode,
            Watched,
            AddedAt,
            AirDate,
            LastViewedAt,
        ]
    }

    pub fn value_kind(&self) -> ValueKind {
        match self {
            FilterField::Title | FilterField::SeriesTitle | FilterField::Studio => ValueKind::Text,
            FilterField::ContentRating | FilterField::Genre => ValueKind::Enum,
            FilterField::Year
            | FilterField::Rating
            | FilterField::ViewCount
            | FilterField::Season
            | FilterField::Episode => ValueKind::Number,
            FilterField::Watched => ValueKind::Bool,
            FilterField::AddedAt | FilterField::AirDate | FilterField::LastViewedAt => {
                ValueKind::Date
            }
        }
    }

    pub fn parent_scoped(&self) -> bool {
        PARENT_FIELDS.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterField::Title => "title",
            FilterField::SeriesTitle => "series_title",
            FilterField::Studio => "studio",
            FilterField::ContentRating => "content_rating",
            FilterField::Genre => "genre",
            FilterField::Year => "year",
            FilterField::Rating => "rating",
            FilterField::ViewCount => "view_count",
            FilterField::Season => "season",
            FilterField::Episode => "episode",
            FilterField::Watched => "watched",
            FilterField::AddedAt => "added_at",
            FilterField::AirDate => "air_date",
            FilterField::LastViewedAt => "last_viewed_at",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterField::all()
            .iter()
            .find(|field| field.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown filter field: {s}"))
    }
}
