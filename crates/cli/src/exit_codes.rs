//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | CLI usage error (bad args, missing file)             |
//! | 3    | Pipeline or alias config is invalid                  |
//! | 4    | A source could not be loaded (I/O, HTTP, CSV)        |
//! | 5    | The pipeline or a statistic failed on the data       |
//! | 6    | `--strict` and the diagnostics report is not clean   |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use saresp_io::LoadError;
use saresp_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable input file.
pub const EXIT_USAGE: u8 = 2;

/// Config did not parse or failed validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Source load failed: missing file, HTTP error, undecodable CSV.
pub const EXIT_LOAD: u8 = 4;

/// Data-dependent failure: duplicate columns, collisions, missing keys,
/// ambiguous pivot cells, insufficient data for a statistic.
pub const EXIT_PIPELINE: u8 = 5;

/// Pipeline succeeded but dropped rows or saw unrecognized columns, and
/// `--strict` was given.
pub const EXIT_STRICT: u8 = 6;

/// Map a ReconError to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_)
        | ReconError::ConfigValidation(_)
        | ReconError::UnknownDataset(_) => EXIT_INVALID_CONFIG,
        _ => EXIT_PIPELINE,
    }
}

/// Map a LoadError to its exit code.
pub fn load_exit_code(err: &LoadError) -> u8 {
    match err {
        LoadError::Source { error, .. } => load_exit_code(error),
        LoadError::BadLocation(_) => EXIT_INVALID_CONFIG,
        _ => EXIT_LOAD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_map_to_invalid_config() {
        assert_eq!(recon_exit_code(&ReconError::ConfigParse("x".into())), EXIT_INVALID_CONFIG);
        assert_eq!(recon_exit_code(&ReconError::UnknownDataset("x".into())), EXIT_INVALID_CONFIG);
    }

    #[test]
    fn data_errors_map_to_pipeline() {
        let err = ReconError::ColumnCollision { column: "NOTA".into() };
        assert_eq!(recon_exit_code(&err), EXIT_PIPELINE);
    }

    #[test]
    fn nested_source_errors_unwrap() {
        let err = LoadError::Source {
            name: "s".into(),
            error: Box::new(LoadError::BadLocation("ftp://x".into())),
        };
        assert_eq!(load_exit_code(&err), EXIT_INVALID_CONFIG);
        let err = LoadError::EmptyFile("s".into());
        assert_eq!(load_exit_code(&err), EXIT_LOAD);
    }

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_INVALID_CONFIG,
            EXIT_LOAD,
            EXIT_PIPELINE,
            EXIT_STRICT,
        ];
        let unique: std::collections::HashSet<u8> = codes.iter().copied().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
