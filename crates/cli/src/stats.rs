//! `saresp stats` - group means and spread, regression and correlation over one table.

use clap::Subcommand;
use serde::Serialize;

use saresp_recon::stats::{correlation_matrix, group_mean, group_summary, linear_regression};

use crate::exit_codes::EXIT_ERROR;
use crate::util::{display_width, load_normalized, pad_right};
use crate::CliError;

#[derive(Subcommand)]
pub enum StatsCommands {
    /// Mean of a numeric column per group
    #[command(after_help = "\
Examples:
  saresp stats mean unified.csv --by RACA --value SARESP
  saresp stats mean unified.csv --by \"Raça\" --value \"Nota SARESP\" --json")]
    Mean {
        /// CSV file path or URL
        file: String,

        /// Column to group by
        #[arg(long)]
        by: String,

        /// Numeric column to average
        #[arg(long)]
        value: String,

        /// Output JSON to stdout instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Minimum, quartiles and maximum of a numeric column per group
    #[command(after_help = "\
Examples:
  saresp stats summary unified.csv --by RACA --value SARESP
  saresp stats summary unified.csv --by RACA --value SARESP --json")]
    Summary {
        /// CSV file path or URL
        file: String,

        /// Column to group by
        #[arg(long)]
        by: String,

        /// Numeric column to summarize
        #[arg(long)]
        value: String,

        /// Output JSON to stdout instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Least-squares line of one column against another
    #[command(after_help = "\
Examples:
  saresp stats regress unified.csv --x Simulado_LP --y SARESP")]
    Regress {
        /// CSV file path or URL
        file: String,

        /// Explanatory column
        #[arg(long)]
        x: String,

        /// Response column
        #[arg(long)]
        y: String,

        /// Output JSON to stdout instead of a summary line
        #[arg(long)]
        json: bool,
    },

    /// Pairwise Pearson correlation
    #[command(after_help = "\
Examples:
  saresp stats corr unified.csv --columns Simulado_LP,Simulado_MAT,SARESP")]
    Corr {
        /// CSV file path or URL
        file: String,

        /// Comma-separated column names (at least 2)
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        /// Output JSON to stdout instead of a matrix
        #[arg(long)]
        json: bool,
    },
}

pub fn cmd_stats(cmd: StatsCommands) -> Result<(), CliError> {
    match cmd {
        StatsCommands::Mean { file, by, value, json } => cmd_mean(&file, &by, &value, json),
        StatsCommands::Summary { file, by, value, json } => cmd_summary(&file, &by, &value, json),
        StatsCommands::Regress { file, x, y, json } => cmd_regress(&file, &x, &y, json),
        StatsCommands::Corr { file, columns, json } => cmd_corr(&file, &columns, json),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CliError {
        code: EXIT_ERROR,
        message: format!("JSON serialization error: {e}"),
        hint: None,
    })?;
    println!("{json}");
    Ok(())
}

fn cmd_mean(file: &str, by: &str, value: &str, json: bool) -> Result<(), CliError> {
    let (table, aliases) = load_normalized(file)?;
    let out = group_mean(&table, &aliases.canonicalize(by), &aliases.canonicalize(value))
        .map_err(CliError::recon)?;

    if json {
        return print_json(&out);
    }

    let labels: Vec<String> = out.groups.iter().map(|g| g.group.to_string()).collect();
    let width = labels
        .iter()
        .map(|l| display_width(l))
        .chain(std::iter::once(display_width(&out.group_column)))
        .max()
        .unwrap_or(0);
    println!("{}  {:>10}  {:>6}", pad_right(&out.group_column, width), out.value_column, "n");
    for (label, g) in labels.iter().zip(&out.groups) {
        println!("{}  {:>10.2}  {:>6}", pad_right(label, width), g.mean, g.count);
    }
    if out.skipped > 0 {
        eprintln!("skipped {} row(s) with a missing group or non-numeric value", out.skipped);
    }
    Ok(())
}

fn cmd_summary(file: &str, by: &str, value: &str, json: bool) -> Result<(), CliError> {
    let (table, aliases) = load_normalized(file)?;
    let out = group_summary(&table, &aliases.canonicalize(by), &aliases.canonicalize(value))
        .map_err(CliError::recon)?;

    if json {
        return print_json(&out);
    }

    let labels: Vec<String> = out.groups.iter().map(|g| g.group.to_string()).collect();
    let width = labels
        .iter()
        .map(|l| display_width(l))
        .chain(std::iter::once(display_width(&out.group_column)))
        .max()
        .unwrap_or(0);
    println!(
        "{}  {:>6}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}",
        pad_right(&out.group_column, width),
        "n",
        "min",
        "q1",
        "median",
        "q3",
        "max"
    );
    for (label, g) in labels.iter().zip(&out.groups) {
        println!(
            "{}  {:>6}  {:>10.2}  {:>10.2}  {:>10.2}  {:>10.2}  {:>10.2}",
            pad_right(label, width),
            g.count,
            g.min,
            g.q1,
            g.median,
            g.q3,
            g.max
        );
    }
    if out.skipped > 0 {
        eprintln!("skipped {} row(s) with a missing group or non-numeric value", out.skipped);
    }
    Ok(())
}

fn cmd_regress(file: &str, x: &str, y: &str, json: bool) -> Result<(), CliError> {
    let (table, aliases) = load_normalized(file)?;
    let fit = linear_regression(&table, &aliases.canonicalize(x), &aliases.canonicalize(y))
        .map_err(CliError::recon)?;

    if json {
        return print_json(&fit);
    }

    let fmt_opt = |v: Option<f64>| v.map(|v| format!("{v:.4}")).unwrap_or_else(|| "n/a".into());
    println!(
        "{} = {:.4} * {} + {:.4}  (r = {}, r² = {}, n = {})",
        fit.y,
        fit.slope,
        fit.x,
        fit.intercept,
        fmt_opt(fit.r),
        fmt_opt(fit.r_squared),
        fit.n
    );
    Ok(())
}

fn cmd_corr(file: &str, columns: &[String], json: bool) -> Result<(), CliError> {
    let (table, aliases) = load_normalized(file)?;
    let columns = aliases.canonicalize_all(columns);
    let matrix = correlation_matrix(&table, &columns).map_err(CliError::recon)?;

    if json {
        return print_json(&matrix);
    }

    let width = matrix.columns.iter().map(|c| display_width(c)).max().unwrap_or(0).max(7);
    let mut header = pad_right("", width);
    for col in &matrix.columns {
        header.push_str("  ");
        header.push_str(&pad_right(col, width));
    }
    println!("{}", header.trim_end());
    for (col, row) in matrix.columns.iter().zip(&matrix.values) {
        let mut line = pad_right(col, width);
        for r in row {
            let cell = r.map(|r| format!("{r:.4}")).unwrap_or_else(|| "n/a".into());
            line.push_str("  ");
            line.push_str(&pad_right(&cell, width));
        }
        println!("{}", line.trim_end());
    }
    Ok(())
}
