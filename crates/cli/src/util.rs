use std::path::Path;

use saresp_io::Loader;
use saresp_recon::{normalize_columns, AliasTable, CollisionPolicy, Table};
use unicode_width::UnicodeWidthStr;

use crate::exit_codes::{load_exit_code, recon_exit_code, EXIT_USAGE};
use crate::CliError;

/// Display width of a string, accounting for accented and double-width chars.
pub(crate) fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Right-pad `s` with spaces to `width` display columns.
pub(crate) fn pad_right(s: &str, width: usize) -> String {
    let sw = display_width(s);
    if sw >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - sw))
    }
}

pub(crate) fn read_text(path: &Path, what: &str) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| CliError {
        code: EXIT_USAGE,
        message: format!("cannot read {what} {}: {e}", path.display()),
        hint: None,
    })
}

/// Load one table from a path or URL, named after its file stem.
pub(crate) fn load_table(location: &str) -> Result<Table, CliError> {
    let name = Path::new(location)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| location.to_string());
    let mut loader = Loader::http().map_err(CliError::load)?;
    loader.load(&name, location).map_err(CliError::load)
}

/// Load `location` and canonicalize its columns with the built-in aliases.
/// Colliding columns keep the first occurrence.
pub(crate) fn load_normalized(location: &str) -> Result<(Table, AliasTable), CliError> {
    let table = load_table(location)?;
    let aliases = AliasTable::builtin();
    let normalized =
        normalize_columns(&table, &aliases, CollisionPolicy::KeepFirst).map_err(CliError::recon)?;
    for col in &normalized.dropped {
        eprintln!("warning: column '{col}' ignored (duplicate after normalization)");
    }
    Ok((normalized.table, aliases))
}

impl CliError {
    pub fn load(err: saresp_io::LoadError) -> Self {
        Self { code: load_exit_code(&err), message: err.to_string(), hint: None }
    }

    pub fn recon(err: saresp_recon::ReconError) -> Self {
        let hint = match &err {
            saresp_recon::ReconError::DuplicateColumn { .. } => {
                Some("set on_collision = \"keep_first\" or \"keep_last\" in the pipeline".into())
            }
            saresp_recon::ReconError::ColumnCollision { .. } => {
                Some("add suffixes = [\"_LEFT\", \"_RIGHT\"] to the join".into())
            }
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_counts_accented_chars_once() {
        assert_eq!(pad_right("Série", 7), "Série  ");
        assert_eq!(pad_right("ESCOLA", 3), "ESCOLA");
    }
}
