//! `saresp normalize` - show how a file's headers map onto canonical names.

use std::path::PathBuf;

use serde::Serialize;

use saresp_recon::config::aliases_from_toml;
use saresp_recon::{normalize_columns, AliasTable, CollisionPolicy};

use crate::util::{display_width, load_table, pad_right, read_text};
use crate::CliError;

#[derive(Serialize)]
struct ColumnMapping<'a> {
    original: &'a str,
    canonical: &'a str,
    recognized: bool,
    kept: bool,
}

#[derive(Serialize)]
struct NormalizeReport<'a> {
    file: &'a str,
    columns: Vec<ColumnMapping<'a>>,
    unrecognized: &'a [String],
    dropped: &'a [String],
}

pub fn cmd_normalize(
    file: String,
    aliases_file: Option<PathBuf>,
    no_builtin: bool,
    json_output: bool,
) -> Result<(), CliError> {
    let mut aliases = if no_builtin { AliasTable::new() } else { AliasTable::builtin() };
    if let Some(ref path) = aliases_file {
        let overrides = aliases_from_toml(&read_text(path, "alias file")?).map_err(CliError::recon)?;
        aliases.extend(&overrides).map_err(CliError::recon)?;
    }

    let table = load_table(&file)?;
    let normalized =
        normalize_columns(&table, &aliases, CollisionPolicy::KeepFirst).map_err(CliError::recon)?;

    let columns: Vec<ColumnMapping> = normalized
        .mapping
        .iter()
        .map(|(original, canonical)| ColumnMapping {
            original,
            canonical,
            recognized: aliases.is_known(original),
            kept: !normalized.dropped.contains(original),
        })
        .collect();

    if json_output {
        let report = NormalizeReport {
            file: &file,
            columns,
            unrecognized: &normalized.unrecognized,
            dropped: &normalized.dropped,
        };
        let json = serde_json::to_string_pretty(&report).map_err(|e| CliError {
            code: crate::exit_codes::EXIT_ERROR,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;
        println!("{json}");
        return Ok(());
    }

    let width = columns.iter().map(|c| display_width(c.original)).max().unwrap_or(0);
    for col in &columns {
        let note = match (col.recognized, col.kept) {
            (_, false) => "  (dropped: duplicate)",
            (false, true) => "  (unrecognized)",
            (true, true) => "",
        };
        println!("{} -> {}{}", pad_right(col.original, width), col.canonical, note);
    }
    eprintln!(
        "{} column(s): {} unrecognized, {} dropped",
        columns.len(),
        normalized.unrecognized.len(),
        normalized.dropped.len()
    );
    Ok(())
}
