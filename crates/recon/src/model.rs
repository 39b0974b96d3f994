use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::error::ReconError;
use crate::table::{KeyValue, Table};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Raw tables keyed by source name, as handed over by the loader.
#[derive(Debug, Default)]
pub struct PipelineInput {
    pub tables: HashMap<String, Table>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Aggregate key = (district, grade, school, subject). Ordering drives output order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupKey {
    pub district: KeyValue,
    pub grade: KeyValue,
    pub school: KeyValue,
    pub subject: KeyValue,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.district, self.grade, self.school, self.subject
        )
    }
}

/// Percentage of correct answers for one (district, grade, school, subject).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRecord {
    #[serde(flatten)]
    pub key: GroupKey,
    pub correct: u64,
    pub total: u64,
    pub percentage: f64,
}

impl AggregateRecord {
    /// Build a record from counts. `total` must be positive and at least `correct`.
    pub fn from_counts(key: GroupKey, correct: u64, total: u64) -> Result<Self, ReconError> {
        if total == 0 {
            return Err(ReconError::EmptyGroup { group: key.to_string() });
        }
        if correct > total {
            return Err(ReconError::InvalidCounts { group: key.to_string(), correct, total });
        }
        let percentage = 100.0 * correct as f64 / total as f64;
        Ok(Self { key, correct, total, percentage })
    }
}

// ---------------------------------------------------------------------------
// Joins
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    #[default]
    Inner,
    Left,
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inner => write!(f, "inner"),
            Self::Left => write!(f, "left"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinStats {
    pub left: String,
    pub right: String,
    pub mode: JoinMode,
    pub key: Vec<String>,
    pub left_rows: usize,
    pub right_rows: usize,
    pub left_dropped_missing_key: usize,
    pub right_dropped_missing_key: usize,
    /// Keyed left rows with at least one right match.
    pub matched_left_rows: usize,
    /// Keyed left rows with no right match.
    pub unmatched_left_rows: usize,
    pub output_rows: usize,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PipelineMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub sources: usize,
    pub output: String,
    pub output_rows: usize,
    pub output_columns: usize,
    pub dropped_rows: usize,
    pub clean: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub meta: PipelineMeta,
    pub summary: PipelineSummary,
    pub unified: Table,
    pub joins: Vec<JoinStats>,
    pub diagnostics: Diagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn key() -> GroupKey {
        GroupKey {
            district: KeyValue::from_value(&Value::Number(1.0)).unwrap(),
            grade: KeyValue::from_value(&Value::Number(9.0)).unwrap(),
            school: KeyValue::from_value(&Value::text("A")).unwrap(),
            subject: KeyValue::from_value(&Value::text("LP")).unwrap(),
        }
    }

    #[test]
    fn percentage_from_counts() {
        let rec = AggregateRecord::from_counts(key(), 6, 10).unwrap();
        assert_eq!(rec.total, 10);
        assert_eq!(rec.correct, 6);
        assert_eq!(rec.percentage, 60.0);
    }

    #[test]
    fn zero_total_is_empty_group() {
        let err = AggregateRecord::from_counts(key(), 0, 0).unwrap_err();
        assert_eq!(err, ReconError::EmptyGroup { group: "(1, 9, A, LP)".into() });
    }

    #[test]
    fn correct_above_total_is_rejected() {
        let err = AggregateRecord::from_counts(key(), 11, 10).unwrap_err();
        assert!(matches!(err, ReconError::InvalidCounts { correct: 11, total: 10, .. }));
    }

    #[test]
    fn record_serializes_flat() {
        let rec = AggregateRecord::from_counts(key(), 3, 4).unwrap();
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["district"], 1.0);
        assert_eq!(json["school"], "A");
        assert_eq!(json["percentage"], 75.0);
    }
}
