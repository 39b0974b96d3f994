//! `saresp run` / `saresp validate` - config-driven pipeline.

use std::path::{Path, PathBuf};

use serde::Serialize;

use saresp_io::Loader;
use saresp_recon::model::{JoinStats, PipelineSummary};
use saresp_recon::{Diagnostics, PipelineConfig, PipelineResult};

use crate::exit_codes::{EXIT_ERROR, EXIT_STRICT};
use crate::util::read_text;
use crate::CliError;

fn write_err(what: &str, path: &Path, e: impl std::fmt::Display) -> CliError {
    CliError {
        code: EXIT_ERROR,
        message: format!("cannot write {what} {}: {e}", path.display()),
        hint: None,
    }
}

fn load_config(config_path: &Path) -> Result<PipelineConfig, CliError> {
    let config_str = read_text(config_path, "config")?;
    PipelineConfig::from_toml(&config_str).map_err(CliError::recon)
}

/// Everything in the result except the unified rows.
#[derive(Serialize)]
struct Report<'a> {
    config_name: &'a str,
    run_at: &'a str,
    summary: &'a PipelineSummary,
    joins: &'a [JoinStats],
    diagnostics: &'a Diagnostics,
}

impl<'a> From<&'a PipelineResult> for Report<'a> {
    fn from(result: &'a PipelineResult) -> Self {
        Self {
            config_name: &result.meta.config_name,
            run_at: &result.meta.run_at,
            summary: &result.summary,
            joins: &result.joins,
            diagnostics: &result.diagnostics,
        }
    }
}

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    report_file: Option<PathBuf>,
    strict: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    // Resolve file paths relative to config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let mut loader = Loader::http().map_err(CliError::load)?.with_base_dir(base_dir);
    let input = loader.load_all(&config).map_err(CliError::load)?;
    log::info!("loaded {} source table(s) from {}", input.tables.len(), base_dir.display());

    let result = saresp_recon::run(&config, &input).map_err(CliError::recon)?;

    if let Some(ref path) = output_file {
        saresp_io::csv::export(&result.unified, path).map_err(|e| write_err("output", path, e))?;
        eprintln!("wrote {}", path.display());
    }

    if let Some(ref path) = report_file {
        let json = serde_json::to_string_pretty(&Report::from(&result))
            .map_err(|e| write_err("report", path, e))?;
        std::fs::write(path, json).map_err(|e| write_err("report", path, e))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        let json = serde_json::to_string_pretty(&result).map_err(|e| CliError {
            code: EXIT_ERROR,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;
        println!("{json}");
    } else if output_file.is_none() {
        saresp_io::csv::write_table(&result.unified, std::io::stdout().lock())
            .map_err(|e| write_err("output", Path::new("<stdout>"), e))?;
    }

    print_summary(&result);

    if strict && !result.summary.clean {
        return Err(CliError {
            code: EXIT_STRICT,
            message: format!(
                "diagnostics not clean: {} row(s) dropped, {} table(s) with issues",
                result.summary.dropped_rows,
                result.diagnostics.tables.values().filter(|t| !t.is_clean()).count()
            ),
            hint: Some("use --report FILE to inspect the diagnostics".into()),
        });
    }

    Ok(())
}

// Human summary to stderr
fn print_summary(result: &PipelineResult) {
    let s = &result.summary;
    eprintln!(
        "pipeline '{}': {} source(s) -> '{}' ({} rows x {} columns)",
        result.meta.config_name, s.sources, s.output, s.output_rows, s.output_columns
    );
    for join in &result.joins {
        eprintln!(
            "  join {} + {} ({} on {}): {} matched, {} unmatched -> {} rows",
            join.left,
            join.right,
            join.mode,
            join.key.join(", "),
            join.matched_left_rows,
            join.unmatched_left_rows,
            join.output_rows
        );
    }
    for (table, d) in &result.diagnostics.tables {
        if d.is_clean() {
            continue;
        }
        let mut parts = Vec::new();
        if d.dropped_rows_missing_key > 0 {
            parts.push(format!("{} row(s) missing key", d.dropped_rows_missing_key));
        }
        if d.excluded_null_subject > 0 {
            parts.push(format!("{} null subject", d.excluded_null_subject));
        }
        if d.excluded_null_correctness > 0 {
            parts.push(format!("{} null correctness", d.excluded_null_correctness));
        }
        if !d.unrecognized_columns.is_empty() {
            parts.push(format!("unrecognized: {}", d.unrecognized_columns.join(", ")));
        }
        if !d.dropped_columns.is_empty() {
            parts.push(format!("dropped: {}", d.dropped_columns.join(", ")));
        }
        eprintln!("  {table}: {}", parts.join("; "));
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    eprintln!(
        "valid: pipeline '{}' with {} source(s), {} concat(s), {} join(s); output '{}'",
        config.name,
        config.sources.len(),
        config.concat.len(),
        config.joins.len(),
        config.output_name().unwrap_or_default(),
    );
    Ok(())
}
