//! Structured diagnostics: what each stage dropped or could not recognize.
//!
//! Nothing here prints. The report is returned to the caller, which decides
//! how to surface it.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableDiagnostics {
    pub dropped_rows_missing_key: usize,
    pub unrecognized_columns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped_columns: Vec<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub excluded_null_subject: usize,
    #[serde(skip_serializing_if = "is_zero")]
    pub excluded_null_correctness: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl TableDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.dropped_rows_missing_key == 0
            && self.unrecognized_columns.is_empty()
            && self.dropped_columns.is_empty()
            && self.excluded_null_subject == 0
            && self.excluded_null_correctness == 0
    }

    fn absorb(&mut self, other: TableDiagnostics) {
        self.dropped_rows_missing_key += other.dropped_rows_missing_key;
        self.excluded_null_subject += other.excluded_null_subject;
        self.excluded_null_correctness += other.excluded_null_correctness;
        for col in other.unrecognized_columns {
            if !self.unrecognized_columns.contains(&col) {
                self.unrecognized_columns.push(col);
            }
        }
        for col in other.dropped_columns {
            if !self.dropped_columns.contains(&col) {
                self.dropped_columns.push(col);
            }
        }
    }
}

/// Per-table report, keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    pub tables: BTreeMap<String, TableDiagnostics>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `table`, created on first use.
    pub fn table_mut(&mut self, table: &str) -> &mut TableDiagnostics {
        self.tables.entry(table.to_string()).or_default()
    }

    pub fn get(&self, table: &str) -> Option<&TableDiagnostics> {
        self.tables.get(table)
    }

    pub fn record(&mut self, table: &str, entry: TableDiagnostics) {
        self.table_mut(table).absorb(entry);
    }

    pub fn record_missing_keys(&mut self, table: &str, rows: usize) {
        if rows > 0 {
            self.table_mut(table).dropped_rows_missing_key += rows;
        }
    }

    pub fn merge(&mut self, other: Diagnostics) {
        for (table, entry) in other.tables {
            self.record(&table, entry);
        }
    }

    pub fn is_clean(&self) -> bool {
        self.tables.values().all(TableDiagnostics::is_clean)
    }

    pub fn total_dropped_rows(&self) -> usize {
        self.tables
            .values()
            .map(|t| t.dropped_rows_missing_key + t.excluded_null_subject + t.excluded_null_correctness)
            .sum()
    }
}
