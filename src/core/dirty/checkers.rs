use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::dirty::DirtyChecker;
use crate::core::entry::{current_timestamp, EntryMeta};
use crate::core::error::QueueError;

/// Structural inequality. A key with no stored value is always dirty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveChecker;

impl DirtyChecker for NaiveChecker {
    fn is_dirty(&self, previous: Option<&Value>, next: &Value, _meta: &EntryMeta) -> bool {
        previous != Some(next)
    }
}

/// Inequality restricted to a whitelist of top-level fields.
///
/// A missing previous value behaves like an empty object, so the first
/// publish is dirty only if it carries at least one whitelisted field.
#[derive(Debug, Clone)]
pub struct FieldChecker {
    fields: Vec<String>,
}

impl FieldChecker {
    pub fn new<I, S>(fields: I) -> Result<Self, QueueError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(QueueError::config(
                "field-based checker needs at least one field",
            ));
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl DirtyChecker for FieldChecker {
    fn is_dirty(&self, previous: Option<&Value>, next: &Value, _meta: &EntryMeta) -> bool {
        self.fields.iter().any(|field| {
            let before = previous.and_then(|p| p.get(field.as_str()));
            before != next.get(field.as_str())
        })
    }
}

/// Unit in which expiration thresholds are expressed.
///
/// Deserializes from any spelling [`FromStr`] accepts (`"s"`, `"min"`, `"hours"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum TimeUnit {
    #[default]
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    pub fn millis(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1_000.0,
            TimeUnit::Minutes => 60_000.0,
            TimeUnit::Hours => 3_600_000.0,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => Ok(TimeUnit::Seconds),
            "m" | "min" | "mins" | "minute" | "minutes" => Ok(TimeUnit::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" => Ok(TimeUnit::Hours),
            other => Err(QueueError::config(format!("unknown time unit `{other}`"))),
        }
    }
}

impl TryFrom<String> for TimeUnit {
    type Error = QueueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeUnit::Seconds => f.write_str("seconds"),
            TimeUnit::Minutes => f.write_str("minutes"),
            TimeUnit::Hours => f.write_str("hours"),
        }
    }
}

/// Validates `[start, end]` and draws a threshold uniformly from it.
fn draw_threshold(what: &str, start: f64, end: Option<f64>) -> Result<f64, QueueError> {
    if !start.is_finite() || start < 0.0 {
        return Err(QueueError::config(format!(
            "{what}: start must be a finite non-negative number, got {start}"
        )));
    }
    let end = end.unwrap_or(start);
    if !end.is_finite() || end < start {
        return Err(QueueError::config(format!(
            "{what}: end ({end}) must be finite and not below start ({start})"
        )));
    }
    if end == start {
        return Ok(start);
    }
    Ok(rand::thread_rng().gen_range(start..=end))
}

/// Forces a flush once the stored write is older than a threshold.
///
/// The threshold is drawn once per checker so keys sharing it don't flush in
/// lockstep with keys of other checkers.
#[derive(Debug, Clone)]
pub struct ExpirationChecker {
    threshold_ms: f64,
}

impl ExpirationChecker {
    pub fn new(start: f64, end: Option<f64>, unit: TimeUnit) -> Result<Self, QueueError> {
        let threshold = draw_threshold("expiration checker", start, end)?;
        Ok(Self {
            threshold_ms: threshold * unit.millis(),
        })
    }

    /// Like [`new`](Self::new) with a textual unit (`"s"`, `"minutes"`, ...).
    pub fn parse(start: f64, end: Option<f64>, unit: &str) -> Result<Self, QueueError> {
        Self::new(start, end, unit.parse()?)
    }

    pub fn threshold_ms(&self) -> f64 {
        self.threshold_ms
    }
}

impl DirtyChecker for ExpirationChecker {
    fn is_dirty(&self, _previous: Option<&Value>, _next: &Value, meta: &EntryMeta) -> bool {
        let updated = meta.time.unwrap_or(0);
        let age = current_timestamp().saturating_sub(updated);
        age as f64 >= self.threshold_ms
    }
}

/// Forces a flush once enough publishes have been skipped.
#[derive(Debug, Clone)]
pub struct SkippedCountChecker {
    threshold: f64,
}

impl SkippedCountChecker {
    pub fn new(start: f64, end: Option<f64>) -> Result<Self, QueueError> {
        Ok(Self {
            threshold: draw_threshold("skipped-count checker", start, end)?,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl DirtyChecker for SkippedCountChecker {
    fn is_dirty(&self, _previous: Option<&Value>, _next: &Value, meta: &EntryMeta) -> bool {
        meta.skipped_count as f64 >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta_at(time: u64, skipped_count: u64) -> EntryMeta {
        EntryMeta {
            time: Some(time),
            skipped_count,
            is_dirty: false,
        }
    }

    #[test]
    fn naive_detects_structural_change() {
        let c = NaiveChecker;
        let m = EntryMeta::default();
        assert!(c.is_dirty(None, &json!({"v": 1}), &m));
        assert!(!c.is_dirty(Some(&json!({"v": 1})), &json!({"v": 1}), &m));
        assert!(c.is_dirty(Some(&json!({"v": 1})), &json!({"v": 2}), &m));
    }

    #[test]
    fn field_checker_ignores_unlisted_fields() {
        let c = FieldChecker::new(["value"]).unwrap();
        let m = EntryMeta::default();
        let first = json!({"value": 1, "ts": 1});

        assert!(c.is_dirty(None, &first, &m));
        assert!(!c.is_dirty(Some(&first), &json!({"value": 1, "ts": 2}), &m));
        assert!(c.is_dirty(Some(&first), &json!({"value": 2, "ts": 2}), &m));
    }

    #[test]
    fn field_checker_without_listed_fields_is_clean() {
        let c = FieldChecker::new(["value"]).unwrap();
        assert!(!c.is_dirty(None, &json!({"other": 1}), &EntryMeta::default()));
    }

    #[test]
    fn field_checker_requires_fields() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            FieldChecker::new(empty),
            Err(QueueError::Configuration(_))
        ));
    }

    #[test]
    fn expiration_ignores_values() {
        let c = ExpirationChecker::new(0.0, None, TimeUnit::Seconds).unwrap();
        let v = json!({"v": 1});
        let stale = meta_at(current_timestamp().saturating_sub(5), 0);
        assert!(c.is_dirty(Some(&v), &v, &stale));
    }

    #[test]
    fn expiration_respects_threshold() {
        let c = ExpirationChecker::new(1.0, None, TimeUnit::Hours).unwrap();
        let v = json!(1);
        assert!(!c.is_dirty(Some(&v), &v, &meta_at(current_timestamp(), 0)));
        assert!(c.is_dirty(None, &v, &EntryMeta::default()));
    }

    #[test]
    fn expiration_threshold_is_drawn_once_within_range() {
        let c = ExpirationChecker::new(2.0, Some(4.0), TimeUnit::Seconds).unwrap();
        let t = c.threshold_ms();
        assert!((2_000.0..=4_000.0).contains(&t));
        assert_eq!(c.threshold_ms(), t);
    }

    #[test]
    fn expiration_rejects_bad_arguments() {
        assert!(ExpirationChecker::new(f64::NAN, None, TimeUnit::Seconds).is_err());
        assert!(ExpirationChecker::new(-1.0, None, TimeUnit::Seconds).is_err());
        assert!(ExpirationChecker::new(5.0, Some(1.0), TimeUnit::Seconds).is_err());
        assert!(ExpirationChecker::parse(1.0, None, "fortnights").is_err());
    }

    #[test]
    fn time_units_parse_short_and_long_forms() {
        assert_eq!("s".parse::<TimeUnit>().unwrap(), TimeUnit::Seconds);
        assert_eq!("minutes".parse::<TimeUnit>().unwrap(), TimeUnit::Minutes);
        assert_eq!("H".parse::<TimeUnit>().unwrap(), TimeUnit::Hours);
    }

    #[test]
    fn skipped_count_forces_flush() {
        let c = SkippedCountChecker::new(3.0, None).unwrap();
        let v = json!(1);
        assert!(!c.is_dirty(Some(&v), &v, &meta_at(0, 2)));
        assert!(c.is_dirty(Some(&v), &v, &meta_at(0, 3)));
    }
}
