use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::dirty::{
    AllOf, AnyOf, ExpirationChecker, FieldChecker, NaiveChecker, SharedChecker,
    SkippedCountChecker, TimeUnit,
};
use crate::core::error::QueueError;

/// Declarative dirty-checker description, as found in `queuep.toml`.
///
/// ```toml
/// [queues.dirty_checker]
/// kind = "any"
/// checkers = [
///   { kind = "fields", fields = ["value"] },
///   { kind = "expiration", start = 30, end = 60, unit = "seconds" },
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirtyCheckerConfig {
    #[default]
    Naive,
    Fields {
        fields: Vec<String>,
    },
    Expiration {
        start: f64,
        #[serde(default)]
        end: Option<f64>,
        #[serde(default)]
        unit: TimeUnit,
    },
    SkippedCount {
        start: f64,
        #[serde(default)]
        end: Option<f64>,
    },
    Any {
        checkers: Vec<DirtyCheckerConfig>,
    },
    All {
        checkers: Vec<DirtyCheckerConfig>,
    },
}

impl DirtyCheckerConfig {
    /// Builds the checker. Bad arguments fail here, never on first use.
    pub fn build(&self) -> Result<SharedChecker, QueueError> {
        let checker: SharedChecker = match self {
            DirtyCheckerConfig::Naive => Arc::new(NaiveChecker),
            DirtyCheckerConfig::Fields { fields } => Arc::new(FieldChecker::new(fields.clone())?),
            DirtyCheckerConfig::Expiration { start, end, unit } => {
                Arc::new(ExpirationChecker::new(*start, *end, *unit)?)
            }
            DirtyCheckerConfig::SkippedCount { start, end } => {
                Arc::new(SkippedCountChecker::new(*start, *end)?)
            }
            DirtyCheckerConfig::Any { checkers } => Arc::new(AnyOf::new(build_all(checkers)?)?),
            DirtyCheckerConfig::All { checkers } => Arc::new(AllOf::new(build_all(checkers)?)?),
        };
        Ok(checker)
    }
}

fn build_all(configs: &[DirtyCheckerConfig]) -> Result<Vec<SharedChecker>, QueueError> {
    configs.iter().map(DirtyCheckerConfig::build).collect()
}
