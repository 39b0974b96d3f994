//! Reshape per-subject aggregates into one row per (district, school, grade).

use std::collections::{BTreeMap, BTreeSet};

use crate::config::ResponseColumns;
use crate::error::ReconError;
use crate::model::AggregateRecord;
use crate::table::{KeyValue, Table, Value};

type RowKey = (KeyValue, KeyValue, KeyValue);

/// Pivot `records` so each subject becomes a percentage column named
/// `<prefix>_<subject>`.
///
/// Rows are ordered by (district, school, grade); subject columns are ordered
/// lexicographically by subject text. A group without a record for some
/// subject gets a null cell. Two records landing in the same cell fail with
/// [`ReconError::AmbiguousPivot`]; a subject column named like one of the
/// identity columns fails with [`ReconError::ColumnCollision`].
pub fn pivot_subjects(
    name: &str,
    records: &[AggregateRecord],
    columns: &ResponseColumns,
) -> Result<Table, ReconError> {
    let mut cells: BTreeMap<RowKey, BTreeMap<String, f64>> = BTreeMap::new();
    let mut subjects: BTreeSet<String> = BTreeSet::new();

    for rec in records {
        let row_key = (
            rec.key.district.clone(),
            rec.key.school.clone(),
            rec.key.grade.clone(),
        );
        let subject = rec.key.subject.to_string();
        let row = cells.entry(row_key).or_default();
        if row.contains_key(&subject) {
            return Err(ReconError::AmbiguousPivot {
                district: rec.key.district.to_string(),
                school: rec.key.school.to_string(),
                grade: rec.key.grade.to_string(),
                subject,
            });
        }
        row.insert(subject.clone(), rec.percentage);
        subjects.insert(subject);
    }

    let mut header = vec![
        columns.district.clone(),
        columns.school.clone(),
        columns.grade.clone(),
    ];
    for subject in &subjects {
        let column = subject_column(&columns.pivot_prefix, subject);
        if header.contains(&column) {
            return Err(ReconError::ColumnCollision { column });
        }
        header.push(column);
    }

    let rows = cells
        .into_iter()
        .map(|((district, school, grade), by_subject)| {
            let mut row = vec![district.to_value(), school.to_value(), grade.to_value()];
            row.extend(subjects.iter().map(|s| match by_subject.get(s) {
                Some(pct) => Value::Number(*pct),
                None => Value::Null,
            }));
            row
        })
        .collect();

    Table::from_rows(name, header, rows)
}

fn subject_column(prefix: &str, subject: &str) -> String {
    if prefix.is_empty() {
        subject.to_string()
    } else {
        format!("{prefix}_{subject}")
    }
}
