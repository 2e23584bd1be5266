//! Boolean rule-tree evaluation over media attributes.
//!
//! Evaluation is pure and fail-closed: an operator that does not apply to a
//! field's value kind, or a value whose kind disagrees with the field,
//! yields `false` instead of an error.

mod field;
mod value;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::{MediaItem, MediaMetadata};

pub use field::{FilterField, ValueKind, PARENT_FIELDS};
pub use value::{
    DateRange, FilterOperator, FilterValue, RelativeDatePreset, SpanUnit, NUMBER_EPSILON,
};

/// Attribute access the engine evaluates against. Catalog and channel item
/// types both expose this view.
pub trait MediaAttributes {
    fn title(&self) -> &str;
    fn metadata(&self) -> Option<&MediaMetadata>;
}

impl MediaAttributes for MediaItem {
    fn title(&self) -> &str {
        &self.title
    }

    fn metadata(&self) -> Option<&MediaMetadata> {
        self.metadata.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    All,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    pub field: FilterField,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl FilterRule {
    pub fn new(field: FilterField, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            field,
            operator,
            value,
        }
    }
}

/// A tree node combining rules and nested groups under ALL or ANY
/// semantics. The empty tree matches everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub mode: MatchMode,
    #[serde(default)]
    pub rules: Vec<FilterRule>,
    #[serde(default)]
    pub groups: Vec<FilterGroup>,
}

impl Default for FilterGroup {
    fn default() -> Self {
        Self::empty(MatchMode::All)
    }
}

impl FilterGroup {
    pub fn empty(mode: MatchMode) -> Self {
        Self {
            mode,
            rules: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.groups.is_empty()
    }

    pub fn matches<A: MediaAttributes>(&self, item: &A, now: DateTime<Utc>) -> bool {
        if self.is_empty() {
            return true;
        }
        let rule_results = self.rules.iter().map(|rule| matches_rule(item, rule, now));
        let group_results = self.groups.iter().map(|group| group.matches(item, now));
        let mut results = rule_results.chain(group_results);
        match self.mode {
            MatchMode::All => results.all(|matched| matched),
            MatchMode::Any => results.any(|matched| matched),
        }
    }

    /// Split the tree into a parent-scoped subtree and a child-scoped
    /// subtree, both preserving the combination mode of each node. Either
    /// side may come back empty (and an empty group matches everything).
    pub fn partition_by_scope(&self) -> (FilterGroup, FilterGroup) {
        let mut parent = FilterGroup::empty(self.mode);
        let mut child = FilterGroup::empty(self.mode);
        for rule in &self.rules {
            if rule.field.parent_scoped() {
                parent.rules.push(rule.clone());
            } else {
                child.rules.push(rule.clone());
            }
        }
        for group in &self.groups {
            let (sub_parent, sub_child) = group.partition_by_scope();
            if !sub_parent.is_empty() {
                parent.groups.push(sub_parent);
            }
            if !sub_child.is_empty() {
                child.groups.push(sub_child);
            }
        }
        (parent, child)
    }
}

/// Evaluate one rule against one item.
pub fn matches_rule<A: MediaAttributes>(item: &A, rule: &FilterRule, now: DateTime<Utc>) -> bool {
    let kind = rule.field.value_kind();
    if !rule.operator.supported_for(kind) || rule.value.kind() != kind {
        return false;
    }
    match kind {
        ValueKind::Text => eval_text(text_candidate(item, rule.field), rule),
        ValueKind::Enum => eval_enum(tag_candidates(item, rule.field), rule),
        ValueKind::Number => eval_number(number_candidate(item, rule.field), rule),
        ValueKind::Bool => eval_bool(bool_candidate(item, rule.field), rule),
        ValueKind::Date => eval_date(date_candidate(item, rule.field), rule, now),
    }
}

fn text_candidate<A: MediaAttributes>(item: &A, field: FilterField) -> Option<String> {
    match field {
        FilterField::Title => Some(item.title().to_string()),
        FilterField::SeriesTitle => item.metadata().and_then(|meta| meta.series_title.clone()),
        FilterField::Studio => item.metadata().and_then(|meta| meta.studio.clone()),
        _ => None,
    }
}

fn tag_candidates<A: MediaAttributes>(item: &A, field: FilterField) -> Vec<String> {
    match field {
        FilterField::Genre => item
            .metadata()
            .map(|meta| meta.genres.clone())
            .unwrap_or_default(),
        FilterField::ContentRating => item
            .metadata()
            .and_then(|meta| meta.content_rating.clone())
            .map(|rating| vec![rating])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn number_candidate<A: MediaAttributes>(item: &A, field: FilterField) -> Option<f64> {
    let meta = item.metadata()?;
    match field {
        FilterField::Year => meta.year.map(f64::from),
        FilterField::Rating => meta.rating,
        FilterField::ViewCount => meta.view_count.map(|count| count as f64),
        FilterField::Season => meta.season.map(|season| season as f64),
        FilterField::Episode => meta.episode.map(|episode| episode as f64),
        _ => None,
    }
}

fn bool_candidate<A: MediaAttributes>(item: &A, field: FilterField) -> Option<bool> {
    match field {
        FilterField::Watched => item
            .metadata()
            .and_then(|meta| meta.view_count)
            .map(|count| count > 0),
        _ => None,
    }
}

fn date_candidate<A: MediaAttributes>(item: &A, field: FilterField) -> Option<DateTime<Utc>> {
    let meta = item.metadata()?;
    match field {
        FilterField::AddedAt => meta.added_at,
        FilterField::AirDate => meta.air_date,
        FilterField::LastViewedAt => meta.last_viewed_at,
        _ => None,
    }
}

fn eval_text(candidate: Option<String>, rule: &FilterRule) -> bool {
    let FilterValue::Text(target) = &rule.value else {
        return false;
    };
    // An absent candidate only satisfies not-equals; every other text
    // operator fails closed against absence.
    let Some(candidate) = candidate else {
        return rule.operator == FilterOperator::NotEquals;
    };
    let candidate = candidate.to_lowercase();
    let target = target.to_lowercase();
    match rule.operator {
        FilterOperator::Contains => candidate.contains(&target),
        FilterOperator::NotContains => !candidate.contains(&target),
        FilterOperator::Equals => candidate == target,
        FilterOperator::NotEquals => candidate != target,
        FilterOperator::BeginsWith => candidate.starts_with(&target),
        FilterOperator::EndsWith => candidate.ends_with(&target),
        _ => false,
    }
}

fn eval_enum(candidates: Vec<String>, rule: &FilterRule) -> bool {
    let targets: Vec<String> = match &rule.value {
        FilterValue::Enum(tag) => vec![tag.to_lowercase()],
        FilterValue::EnumSet(tags) => tags.iter().map(|tag| tag.to_lowercase()).collect(),
        _ => return false,
    };
    let candidates: Vec<String> = candidates
        .into_iter()
        .map(|tag| tag.to_lowercase())
        .collect();
    let intersects = candidates.iter().any(|tag| targets.contains(tag));
    match rule.operator {
        FilterOperator::Equals => intersects,
        FilterOperator::NotEquals => !intersects,
        _ => false,
    }
}

fn eval_number(candidate: Option<f64>, rule: &FilterRule) -> bool {
    let FilterValue::Number(target) = &rule.value else {
        return false;
    };
    let target = *target;
    let Some(candidate) = candidate else {
        return false;
    };
    match rule.operator {
        FilterOperator::Equals => (candidate - target).abs() < NUMBER_EPSILON,
        FilterOperator::NotEquals => (candidate - target).abs() >= NUMBER_EPSILON,
        FilterOperator::GreaterThan => candidate > target,
        FilterOperator::GreaterOrEqual => candidate >= target,
        FilterOperator::LessThan => candidate < target,
        FilterOperator::LessOrEqual => candidate <= target,
        _ => false,
    }
}

fn eval_bool(candidate: Option<bool>, rule: &FilterRule) -> bool {
    let FilterValue::Bool(target) = &rule.value else {
        return false;
    };
    let target = *target;
    let Some(candidate) = candidate else {
        return false;
    };
    match rule.operator {
        FilterOperator::Equals => candidate == target,
        FilterOperator::NotEquals => candidate != target,
        _ => false,
    }
}

fn eval_date(candidate: Option<DateTime<Utc>>, rule: &FilterRule, now: DateTime<Utc>) -> bool {
    let Some(range) = rule.value.resolve_date_range(now) else {
        return false;
    };
    let Some(candidate) = candidate else {
        return false;
    };
    match rule.operator {
        FilterOperator::Before => candidate < range.start,
        FilterOperator::After => candidate > range.end,
        FilterOperator::On => range.contains(candidate),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use crate::channel::MediaItem;

    use super::*;

    fn item(year: Option<i32>, genres: &[&str]) -> MediaItem {
        let mut media = MediaItem::new("m1", "The Long Afternoon", 1800.0);
        media.metadata = Some(MediaMetadata {
            year,
            genres: genres.iter().map(|genre| genre.to_string()).collect(),
            rating: Some(7.5),
            ..MediaMetadata::default()
        });
        media
    }

    fn year_rule(minimum: f64) -> FilterRule {
        FilterRule::new(
            FilterField::Year,
            FilterOperator::GreaterOrEqual,
            FilterValue::Number(minimum),
        )
    }

    fn genre_rule(genre: &str) -> FilterRule {
        FilterRule::new(
            FilterField::Genre,
            FilterOperator::Equals,
            FilterValue::Enum(genre.into()),
        )
    }

    #[test]
    fn all_mode_rejects_on_any_failed_rule() {
        let group = FilterGroup {
            mode: MatchMode::All,
            rules: vec![year_rule(2000.0), genre_rule("Drama")],
            groups: vec![],
        };
        let media = item(Some(1999), &["Drama"]);
        assert!(!group.matches(&media, Utc::now()));
    }

    #[test]
    fn any_mode_accepts_on_one_passing_rule() {
        let group = FilterGroup {
            mode: MatchMode::Any,
            rules: vec![year_rule(2000.0), genre_rule("Drama")],
            groups: vec![],
        };
        let media = item(Some(1999), &["Drama"]);
        assert!(group.matches(&media, Utc::now()));
    }

    #[test]
    fn empty_group_matches_everything() {
        let group = FilterGroup::empty(MatchMode::All);
        assert!(group.matches(&item(None, &[]), Utc::now()));
        let any = FilterGroup::empty(MatchMode::Any);
        assert!(any.matches(&item(None, &[]), Utc::now()));
    }

    #[test]
    fn absent_text_candidate_only_satisfies_not_equals() {
        let media = item(Some(2010), &[]);
        let now = Utc::now();
        let operators = [
            FilterOperator::Contains,
            FilterOperator::NotContains,
            FilterOperator::Equals,
            FilterOperator::BeginsWith,
            FilterOperator::EndsWith,
        ];
        for operator in operators {
            let rule = FilterRule::new(
                FilterField::SeriesTitle,
                operator,
                FilterValue::Text("anything".into()),
            );
            assert!(!matches_rule(&media, &rule, now), "{operator:?}");
        }
        let not_equals = FilterRule::new(
            FilterField::SeriesTitle,
            FilterOperator::NotEquals,
            FilterValue::Text("anything".into()),
        );
        assert!(matches_rule(&media, &not_equals, now));
    }

    #[test]
    fn text_operators_are_case_insensitive() {
        let media = item(None, &[]);
        let now = Utc::now();
        let contains = FilterRule::new(
            FilterField::Title,
            FilterOperator::Contains,
            FilterValue::Text("LONG".into()),
        );
        assert!(matches_rule(&media, &contains, now));
        let begins = FilterRule::new(
            FilterField::Title,
            FilterOperator::BeginsWith,
            FilterValue::Text("the long".into()),
        );
        assert!(matches_rule(&media, &begins, now));
    }

    #[test]
    fn number_equality_uses_epsilon_boundary() {
        let mut media = item(None, &[]);
        let now = Utc::now();
        let rule = FilterRule::new(
            FilterField::Rating,
            FilterOperator::Equals,
            FilterValue::Number(5.0),
        );
        // diff 0.00009 < epsilon: equal.
        media.metadata.as_mut().unwrap().rating = Some(5.00009);
        assert!(matches_rule(&media, &rule, now));
        // diff 0.00011 >= epsilon: not equal.
        media.metadata.as_mut().unwrap().rating = Some(5.00011);
        assert!(!matches_rule(&media, &rule, now));
        // 4.99995 against 5.0 sits inside the tolerance.
        media.metadata.as_mut().unwrap().rating = Some(4.99995);
        assert!(matches_rule(&media, &rule, now));
    }

    #[test]
    fn unsupported_operator_fails_closed() {
        let media = item(Some(2010), &["Drama"]);
        let now = Utc::now();
        // Ordering operator against an enum field.
        let rule = FilterRule::new(
            FilterField::Genre,
            FilterOperator::GreaterThan,
            FilterValue::Enum("Drama".into()),
        );
        assert!(!matches_rule(&media, &rule, now));
        // Date operator against a number field.
        let rule = FilterRule::new(
            FilterField::Year,
            FilterOperator::Before,
            FilterValue::Number(2000.0),
        );
        assert!(!matches_rule(&media, &rule, now));
        // Kind mismatch between field and value.
        let rule = FilterRule::new(
            FilterField::Year,
            FilterOperator::Equals,
            FilterValue::Text("2000".into()),
        );
        assert!(!matches_rule(&media, &rule, now));
    }

    #[test]
    fn enum_match_is_case_insensitive_set_intersection() {
        let media = item(None, &["Sci-Fi", "Drama"]);
        let now = Utc::now();
        let equals = FilterRule::new(
            FilterField::Genre,
            FilterOperator::Equals,
            FilterValue::EnumSet(vec!["drama".into(), "western".into()]),
        );
        assert!(matches_rule(&media, &equals, now));
        let not_equals = FilterRule::new(
            FilterField::Genre,
            FilterOperator::NotEquals,
            FilterValue::Enum("Comedy".into()),
        );
        assert!(matches_rule(&media, &not_equals, now));
    }

    #[test]
    fn date_rules_resolve_relative_ranges_at_evaluation_time() {
        let mut media = item(None, &[]);
        let now = Utc::now();
        media.metadata.as_mut().unwrap().added_at = Some(now - chrono::Duration::days(3));
        let within = FilterRule::new(
            FilterField::AddedAt,
            FilterOperator::On,
            FilterValue::RelativePreset(RelativeDatePreset::Last7Days),
        );
        assert!(matches_rule(&media, &within, now));
        let before = FilterRule::new(
            FilterField::AddedAt,
            FilterOperator::Before,
            FilterValue::RelativePreset(RelativeDatePreset::Today),
        );
        assert!(matches_rule(&media, &before, now));
        media.metadata.as_mut().unwrap().added_at = Some(now - chrono::Duration::days(30));
        assert!(!matches_rule(&media, &within, now));
    }

    #[test]
    fn partition_splits_rules_by_scope_preserving_mode() {
        let group = FilterGroup {
            mode: MatchMode::Any,
            rules: vec![
                FilterRule::new(
                    FilterField::SeriesTitle,
                    FilterOperator::Contains,
                    FilterValue::Text("night".into()),
                ),
                year_rule(2000.0),
            ],
            groups: vec![FilterGroup {
                mode: MatchMode::All,
                rules: vec![
                    FilterRule::new(
                        FilterField::ContentRating,
                        FilterOperator::Equals,
                        FilterValue::Enum("TV-14".into()),
                    ),
                    genre_rule("Drama"),
                ],
                groups: vec![],
            }],
        };
        let (parent, child) = group.partition_by_scope();
        assert_eq!(parent.mode, MatchMode::Any);
        assert_eq!(parent.rules.len(), 1);
        assert_eq!(parent.groups.len(), 1);
        assert_eq!(parent.groups[0].rules[0].field, FilterField::ContentRating);
        assert_eq!(child.rules.len(), 1);
        assert_eq!(child.groups[0].rules[0].field, FilterField::Genre);
    }

    #[test]
    fn nested_groups_recurse_without_depth_limit() {
        // Build a 64-deep chain of single-rule ALL groups.
        let mut group = FilterGroup {
            mode: MatchMode::All,
            rules: vec![genre_rule("Drama")],
            groups: vec![],
        };
        for _ in 0..64 {
            group = FilterGroup {
                mode: MatchMode::All,
                rules: vec![],
                groups: vec![group],
            };
        }
        assert!(group.matches(&item(None, &["Drama"]), Utc::now()));
        assert!(!group.matches(&item(None, &["Comedy"]), Utc::now()));
    }
}
