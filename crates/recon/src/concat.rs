use std::collections::HashMap;

use crate::error::ReconError;
use crate::table::{Table, Value};

/// Stack `tables` vertically.
///
/// The output header is the union of input columns in first-seen order; a
/// row gets null for every column its table lacks. With `source_column`, an
/// extra trailing column holds the name of the table each row came from.
pub fn concat_tables(
    name: &str,
    tables: &[&Table],
    source_column: Option<&str>,
) -> Result<Table, ReconError> {
    let mut header: Vec<String> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();
    for table in tables {
        for col in table.columns() {
            if !position.contains_key(col) {
                position.insert(col.clone(), header.len());
                header.push(col.clone());
            }
        }
    }

    if let Some(col) = source_column {
        if position.contains_key(col) {
            return Err(ReconError::ColumnCollision { column: col.to_string() });
        }
        header.push(col.to_string());
    }

    let width = header.len();
    let total: usize = tables.iter().map(|t| t.len()).sum();
    let mut rows = Vec::with_capacity(total);

    for table in tables {
        let targets: Vec<usize> = table.columns().iter().map(|c| position[c]).collect();
        for row in table.rows() {
            let mut out = vec![Value::Null; width];
            for (value, &target) in row.iter().zip(&targets) {
                out[target] = value.clone();
            }
            if source_column.is_some() {
                out[width - 1] = Value::text(table.name());
            }
            rows.push(out);
        }
    }

    log::debug!(
        "concat '{}': {} table(s), {} row(s), {} column(s)",
        name,
        tables.len(),
        rows.len(),
        width
    );

    Table::from_rows(name, header, rows)
}
