use std::collections::{HashMap, HashSet};

use crate::error::ReconError;
use crate::model::{JoinMode, JoinStats};
use crate::table::{KeyValue, Table, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    /// Composite key: canonical column names present in both tables.
    pub key: Vec<String>,
    pub mode: JoinMode,
    /// `(left, right)` suffixes for non-key columns present on both sides.
    pub suffixes: Option<(String, String)>,
}

impl JoinSpec {
    pub fn new(key: Vec<String>, mode: JoinMode) -> Self {
        Self { key, mode, suffixes: None }
    }

    pub fn with_suffixes(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.suffixes = Some((left.into(), right.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub table: Table,
    pub stats: JoinStats,
}

/// Join `left` and `right` on `spec.key`.
///
/// Output columns are the key columns (values taken from the left row), then
/// the left non-key columns, then the right non-key columns. Rows follow the
/// left table's order; a left row matching several right rows is emitted
/// once per match, in the right table's order (one-to-many expansion, so an
/// inner join yields the sum over shared keys of left-group × right-group
/// rows). In `Left` mode an unmatched left row is emitted once with nulls in
/// the right columns.
///
/// Rows with a null or blank key cell on either side take no part in the
/// join and are counted in the returned [`JoinStats`].
pub fn join_tables(
    name: &str,
    left: &Table,
    right: &Table,
    spec: &JoinSpec,
) -> Result<JoinOutcome, ReconError> {
    let left_key_idx = left.require_columns(&spec.key)?;
    let right_key_idx = right.require_columns(&spec.key)?;

    let left_rest: Vec<usize> = (0..left.width()).filter(|i| !left_key_idx.contains(i)).collect();
    let right_rest: Vec<usize> = (0..right.width()).filter(|i| !right_key_idx.contains(i)).collect();

    let header = output_header(left, right, spec, &left_rest, &right_rest)?;

    // Right-side index: key tuple → row positions in original order.
    let mut right_index: HashMap<Vec<KeyValue>, Vec<usize>> = HashMap::new();
    let mut right_dropped = 0;
    for (ri, row) in right.rows().iter().enumerate() {
        match key_of(row, &right_key_idx) {
            Some(key) => right_index.entry(key).or_default().push(ri),
            None => right_dropped += 1,
        }
    }

    let mut rows = Vec::new();
    let mut left_dropped = 0;
    let mut matched = 0;
    let mut unmatched = 0;

    for row in left.rows() {
        let Some(key) = key_of(row, &left_key_idx) else {
            left_dropped += 1;
            continue;
        };

        let emit = |right_row: Option<&Vec<Value>>| -> Vec<Value> {
            let mut out = Vec::with_capacity(header.len());
            out.extend(left_key_idx.iter().map(|&i| row[i].clone()));
            out.extend(left_rest.iter().map(|&i| row[i].clone()));
            match right_row {
                Some(r) => out.extend(right_rest.iter().map(|&i| r[i].clone())),
                None => out.extend(right_rest.iter().map(|_| Value::Null)),
            }
            out
        };

        match right_index.get(&key) {
            Some(matches) => {
                matched += 1;
                for &ri in matches {
                    rows.push(emit(Some(&right.rows()[ri])));
                }
            }
            None => {
                unmatched += 1;
                if spec.mode == JoinMode::Left {
                    rows.push(emit(None));
                }
            }
        }
    }

    if left_dropped > 0 || right_dropped > 0 {
        log::warn!(
            "join '{}': skipped {} left and {} right row(s) with missing key values",
            name,
            left_dropped,
            right_dropped
        );
    }
    log::debug!(
        "join '{}' ({}): {} matched, {} unmatched, {} output row(s)",
        name,
        spec.mode,
        matched,
        unmatched,
        rows.len()
    );

    let stats = JoinStats {
        left: left.name().to_string(),
        right: right.name().to_string(),
        mode: spec.mode,
        key: spec.key.clone(),
        left_rows: left.len(),
        right_rows: right.len(),
        left_dropped_missing_key: left_dropped,
        right_dropped_missing_key: right_dropped,
        matched_left_rows: matched,
        unmatched_left_rows: unmatched,
        output_rows: rows.len(),
    };

    Ok(JoinOutcome {
        table: Table::from_rows(name, header, rows)?,
        stats,
    })
}

/// Join several tables left to right with the same spec.
pub fn join_all(
    name: &str,
    tables: &[&Table],
    spec: &JoinSpec,
) -> Result<(Table, Vec<JoinStats>), ReconError> {
    let Some((first, rest)) = tables.split_first() else {
        return Err(ReconError::ConfigValidation("join_all needs at least 1 table".into()));
    };
    let mut acc = (*first).clone();
    let mut stats = Vec::with_capacity(rest.len());
    for table in rest {
        let outcome = join_tables(name, &acc, table, spec)?;
        acc = outcome.table;
        stats.push(outcome.stats);
    }
    Ok((acc.renamed(name), stats))
}

/// Positions of the rows in `table` that a join on `key` would skip because a
/// key cell is null or blank.
pub fn missing_key_rows(table: &Table, key: &[String]) -> Result<Vec<usize>, ReconError> {
    let idx = table.require_columns(key)?;
    Ok(table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| key_of(row, &idx).is_none())
        .map(|(i, _)| i)
        .collect())
}

fn key_of(row: &[Value], idx: &[usize]) -> Option<Vec<KeyValue>> {
    idx.iter().map(|&i| KeyValue::from_value(&row[i])).collect()
}

fn output_header(
    left: &Table,
    right: &Table,
    spec: &JoinSpec,
    left_rest: &[usize],
    right_rest: &[usize],
) -> Result<Vec<String>, ReconError> {
    let left_names: HashSet<&str> = left_rest.iter().map(|&i| left.columns()[i].as_str()).collect();
    let colliding: HashSet<&str> = right_rest
        .iter()
        .map(|&i| right.columns()[i].as_str())
        .filter(|c| left_names.contains(c))
        .collect();

    let (left_suffix, right_suffix) = match (&spec.suffixes, colliding.is_empty()) {
        (_, true) => ("", ""),
        (Some((l, r)), false) => (l.as_str(), r.as_str()),
        (None, false) => {
            let first = right_rest
                .iter()
                .map(|&i| right.columns()[i].as_str())
                .find(|c| colliding.contains(c))
                .unwrap_or_default();
            return Err(ReconError::ColumnCollision { column: first.to_string() });
        }
    };

    let rename = |col: &str, suffix: &str| {
        if colliding.contains(col) {
            format!("{col}{suffix}")
        } else {
            col.to_string()
        }
    };

    let mut header: Vec<String> = spec.key.clone();
    header.extend(left_rest.iter().map(|&i| rename(&left.columns()[i], left_suffix)));
    header.extend(right_rest.iter().map(|&i| rename(&right.columns()[i], right_suffix)));

    let mut seen = HashSet::new();
    for col in &header {
        if !seen.insert(col.as_str()) {
            return Err(ReconError::ColumnCollision { column: col.clone() });
        }
    }
    Ok(header)
}
