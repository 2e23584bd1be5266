use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::field::ValueKind;

/// Comparison tolerance for numeric equality.
pub const NUMBER_EPSILON: f64 = 1e-4;

const SECONDS_PER_DAY: f64 = 86_400.0;
// Calendar approximations used for span arithmetic.
const DAYS_PER_MONTH: f64 = 30.44;
const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    BeginsWith,
    EndsWith,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Before,
    On,
    After,
}

impl FilterOperator {
    /// Whether this operator applies to the given value kind. Everything
    /// outside these tables evaluates to false rather than raising.
    pub fn supported_for(&self, kind: ValueKind) -> bool {
        use FilterOperator::*;
        match kind {
            ValueKind::Text => matches!(
                self,
                Contains | NotContains | Equals | NotEquals | BeginsWith | EndsWith
            ),
            ValueKind::Enum => matches!(self, Equals | NotEquals),
            ValueKind::Number => matches!(
                self,
                Equals | NotEquals | GreaterThan | GreaterOrEqual | LessThan | LessOrEqual
            ),
            ValueKind::Bool => matches!(self, Equals | NotEquals),
            ValueKind::Date => matches!(self, Before | On | After),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeDatePreset {
    Today,
    Last7Days,
    Last30Days,
    Last90Days,
    Last365Days,
    LastDays(i64),
}

impl RelativeDatePreset {
    pub fn days_back(&self) -> i64 {
        match self {
            RelativeDatePreset::Today => 0,
            RelativeDatePreset::Last7Days => 7,
            RelativeDatePreset::Last30Days => 30,
            RelativeDatePreset::Last90Days => 90,
            RelativeDatePreset::Last365Days => 365,
            RelativeDatePreset::LastDays(days) => (*days).max(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl SpanUnit {
    pub fn seconds(&self) -> f64 {
        match self {
            SpanUnit::Seconds => 1.0,
            SpanUnit::Minutes => 60.0,
            SpanUnit::Hours => 3_600.0,
            SpanUnit::Days => SECONDS_PER_DAY,
            SpanUnit::Weeks => 7.0 * SECONDS_PER_DAY,
            SpanUnit::Months => DAYS_PER_MONTH * SECONDS_PER_DAY,
            SpanUnit::Years => DAYS_PER_YEAR * SECONDS_PER_DAY,
        }
    }

    /// Units of a day or longer resolve against day boundaries; smaller
    /// units keep sub-day precision.
    pub fn day_granular(&self) -> bool {
        matches!(
            self,
            SpanUnit::Days | SpanUnit::Weeks | SpanUnit::Months | SpanUnit::Years
        )
    }
}

/// Closed union of rule comparison values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    Enum(String),
    EnumSet(Vec<String>),
    RelativePreset(RelativeDatePreset),
    RelativeSpan { magnitude: i64, unit: SpanUnit },
}

impl FilterValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FilterValue::Text(_) => ValueKind::Text,
            FilterValue::Number(_) => ValueKind::Number,
            FilterValue::Bool(_) => ValueKind::Bool,
            FilterValue::Date(_)
            | FilterValue::RelativePreset(_)
            | FilterValue::RelativeSpan { .. } => ValueKind::Date,
            FilterValue::Enum(_) | FilterValue::EnumSet(_) => ValueKind::Enum,
        }
    }

    /// Resolve any date-kinded value to a concrete interval. Relative forms
    /// are never pre-computed; "now" moves between evaluations.
    pub fn resolve_date_range(&self, now: DateTime<Utc>) -> Option<DateRange> {
        match self {
            FilterValue::Date(date) => Some(DateRange::day_of(*date)),
            FilterValue::RelativePreset(preset) => {
                let start = start_of_day(now - Duration::days(preset.days_back()));
                Some(DateRange {
                    start,
                    end: end_of_day(now),
                })
            }
            FilterValue::RelativeSpan { magnitude, unit } => {
                let span_seconds = (*magnitude).max(0) as f64 * unit.seconds();
                let start = now - Duration::milliseconds((span_seconds * 1000.0) as i64);
                if unit.day_granular() {
                    Some(DateRange {
                        start: start_of_day(start),
                        end: end_of_day(now),
                    })
                } else {
                    Some(DateRange { start, end: now })
                }
            }
            _ => None,
        }
    }
}

/// Inclusive datetime interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn day_of(instant: DateTime<Utc>) -> Self {
        Self {
            start: start_of_day(instant),
            end: end_of_day(instant),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

fn start_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc()
}

fn end_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day(instant) + Duration::days(1) - Duration::milliseconds(1)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn preset_resolves_from_start_of_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 17, 30, 0).unwrap();
        let range = FilterValue::RelativePreset(RelativeDatePreset::Last7Days)
            .resolve_date_range(now)
            .unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap());
        assert!(range.end > now);
        assert!(range.contains(now));
    }

    #[test]
    fn sub_day_span_keeps_precision() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 17, 30, 0).unwrap();
        let range = FilterValue::RelativeSpan {
            magnitude: 90,
            unit: SpanUnit::Minutes,
        }
        .resolve_date_range(now)
        .unwrap();
        assert_eq!(range.end, now);
        assert_eq!(range.start, now - Duration::minutes(90));
    }

    #[test]
    fn month_and_year_spans_use_calendar_approximations() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let month = FilterValue::RelativeSpan {
            magnitude: 1,
            unit: SpanUnit::Months,
        }
        .resolve_date_range(now)
        .unwrap();
        // 30.44 days back from noon lands on Feb 14; day-granular flooring.
        assert_eq!(
            month.start,
            Utc.with_ymd_and_hms(2024, 2, 14, 0, 0, 0).unwrap()
        );
        let year = FilterValue::RelativeSpan {
            magnitude: 1,
            unit: SpanUnit::Years,
        }
        .resolve_date_range(now)
        .unwrap();
        // 365.25 days back crosses Feb 29 2024, landing on Mar 16 2023.
        assert_eq!(year.start, Utc.with_ymd_and_hms(2023, 3, 16, 0, 0, 0).unwrap());
    }

    #[test]
    fn non_date_values_have_no_range() {
        let now = Utc::now();
        assert!(FilterValue::Text("x".into()).resolve_date_range(now).is_none());
        assert!(FilterValue::Number(1.0).resolve_date_range(now).is_none());
    }
}
