use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::aggregate::aggregate_responses;
use crate::concat::concat_tables;
use crate::config::{PipelineConfig, SourceKind};
use crate::diagnostics::Diagnostics;
use crate::error::ReconError;
use crate::join::{join_tables, missing_key_rows, JoinSpec};
use crate::model::{PipelineInput, PipelineMeta, PipelineResult, PipelineSummary};
use crate::normalize::normalize_columns;
use crate::pivot::pivot_subjects;
use crate::table::Table;

/// Run the pipeline per config over pre-loaded raw tables.
///
/// Each source is normalized (and, for response sources, aggregated and
/// pivoted), then concatenations and joins run in declaration order. The
/// output dataset becomes the unified table.
pub fn run(config: &PipelineConfig, input: &PipelineInput) -> Result<PipelineResult, ReconError> {
    config.validate()?;

    let aliases = config.alias_table()?;
    let responses = config.responses.canonicalized(&aliases);
    let mut diagnostics = Diagnostics::new();
    let mut datasets: HashMap<String, Table> = HashMap::new();

    // Sources
    for (name, source) in &config.sources {
        let raw = input.tables.get(name).ok_or_else(|| {
            ReconError::UnknownDataset(format!("source '{name}' was not loaded"))
        })?;
        let normalized = normalize_columns(raw, &aliases, config.on_collision)?;
        diagnostics.record(name, normalized.diagnostics());
        let table = normalized.table.renamed(name);

        let table = match source.kind {
            SourceKind::Table => table,
            SourceKind::Responses => {
                let outcome = aggregate_responses(&table, &responses)?;
                log::info!(
                    "source '{}': {} response row(s) -> {} aggregate(s)",
                    name,
                    table.len(),
                    outcome.records.len()
                );
                diagnostics.record(name, outcome.diagnostics);
                pivot_subjects(name, &outcome.records, &responses)?
            }
        };
        datasets.insert(name.clone(), table);
    }

    // Concatenations
    for (name, concat) in &config.concat {
        let parts = concat
            .sources
            .iter()
            .map(|s| lookup(&datasets, s))
            .collect::<Result<Vec<_>, _>>()?;
        let source_column = concat.source_column.as_deref().map(|c| aliases.canonicalize(c));
        let table = concat_tables(name, &parts, source_column.as_deref())?;
        datasets.insert(name.clone(), table);
    }

    // Joins
    let mut joins = Vec::with_capacity(config.joins.len());
    // A row skipped by several joins is still one dropped row of its table.
    let mut missing_keys: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
    for step in &config.joins {
        let out = step.output_name();
        let mut spec = JoinSpec::new(aliases.canonicalize_all(&step.on), step.mode);
        if let Some([left, right]) = &step.suffixes {
            spec = spec.with_suffixes(left.as_str(), right.as_str());
        }

        let left = lookup(&datasets, &step.left)?;
        let right = lookup(&datasets, &step.right)?;
        let outcome = join_tables(&out, left, right, &spec)?;
        for (dataset, table) in [(&step.left, left), (&step.right, right)] {
            missing_keys
                .entry(dataset.clone())
                .or_default()
                .extend(missing_key_rows(table, &spec.key)?);
        }
        log::info!(
            "join '{}': {} x {} -> {} row(s)",
            out,
            outcome.stats.left_rows,
            outcome.stats.right_rows,
            outcome.stats.output_rows
        );
        joins.push(outcome.stats);
        datasets.insert(out, outcome.table);
    }

    for (dataset, rows) in &missing_keys {
        diagnostics.record_missing_keys(dataset, rows.len());
    }

    let output = config.output_name().ok_or_else(|| {
        ReconError::ConfigValidation("output is required when no joins are configured".into())
    })?;
    let unified = datasets
        .remove(&output)
        .ok_or_else(|| ReconError::UnknownDataset(format!("output dataset '{output}' not found")))?;

    if !diagnostics.is_clean() {
        log::warn!(
            "pipeline '{}': {} row(s) dropped; see diagnostics",
            config.name,
            diagnostics.total_dropped_rows()
        );
    }

    let summary = PipelineSummary {
        sources: config.sources.len(),
        output,
        output_rows: unified.len(),
        output_columns: unified.width(),
        dropped_rows: diagnostics.total_dropped_rows(),
        clean: diagnostics.is_clean(),
    };

    Ok(PipelineResult {
        meta: PipelineMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        unified,
        joins,
        diagnostics,
    })
}

fn lookup<'a>(datasets: &'a HashMap<String, Table>, name: &str) -> Result<&'a Table, ReconError> {
    datasets
        .get(name)
        .ok_or_else(|| ReconError::UnknownDataset(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn input(tables: Vec<(&str, Table)>) -> PipelineInput {
        PipelineInput {
            tables: tables.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
        }
    }

    #[test]
    fn single_source_passes_through_normalized() {
        let config = PipelineConfig::from_toml(
            r#"
name = "one"
[sources.saresp]
location = "saresp.csv"
"#,
        )
        .unwrap();
        let raw = Table::from_rows(
            "saresp.csv",
            vec!["Escolas".into(), "D.E.".into(), "Nota".into()],
            vec![vec![Value::text("A"), Value::Number(1.0), Value::Number(7.5)]],
        )
        .unwrap();
        let result = run(&config, &input(vec![("saresp", raw)])).unwrap();
        assert_eq!(result.unified.name(), "saresp");
        assert_eq!(result.unified.columns(), &["ESCOLA", "DE", "NOTA"]);
        assert_eq!(result.summary.output, "saresp");
        assert!(result.joins.is_empty());
        assert!(!result.summary.clean); // NOTA is not a known column
        assert_eq!(
            result.diagnostics.get("saresp").unwrap().unrecognized_columns,
            vec!["NOTA"]
        );
    }

    #[test]
    fn missing_source_table_is_reported() {
        let config = PipelineConfig::from_toml(
            r#"
name = "one"
[sources.saresp]
location = "saresp.csv"
"#,
        )
        .unwrap();
        let err = run(&config, &PipelineInput::default()).unwrap_err();
        assert!(matches!(err, ReconError::UnknownDataset(_)));
    }

    #[test]
    fn source_in_two_joins_counts_each_null_key_row_once() {
        let config = PipelineConfig::from_toml(
            r#"
name = "shared"
output = "j2"

[sources.a]
location = "a.csv"
[sources.b]
location = "b.csv"
[sources.c]
location = "c.csv"

[[joins]]
name = "j1"
left = "a"
right = "b"
on = ["K"]

[[joins]]
name = "j2"
left = "a"
right = "c"
on = ["K"]
mode = "left"
"#,
        )
        .unwrap();
        let keyed = |name: &str, value_col: &str, keys: Vec<Value>| {
            let rows = keys.into_iter().map(|k| vec![k, Value::Number(1.0)]).collect();
            Table::from_rows(name, vec!["K".into(), value_col.into()], rows).unwrap()
        };
        let a = keyed("a", "A_VAL", vec![Value::Number(1.0), Value::Null, Value::Number(2.0)]);
        let b = keyed("b", "B_VAL", vec![Value::Number(1.0)]);
        let c = keyed("c", "C_VAL", vec![Value::Number(2.0)]);

        let result = run(&config, &input(vec![("a", a), ("b", b), ("c", c)])).unwrap();
        assert_eq!(result.joins.len(), 2);
        assert_eq!(result.joins[0].left_dropped_missing_key, 1);
        assert_eq!(result.joins[1].left_dropped_missing_key, 1);
        assert_eq!(result.diagnostics.get("a").unwrap().dropped_rows_missing_key, 1);
        assert_eq!(result.summary.dropped_rows, 1);
        assert_eq!(result.unified.len(), 2);
    }

    #[test]
    fn meta_carries_name_and_version() {
        let config = PipelineConfig::from_toml(
            r#"
name = "meta"
[sources.s]
location = "s.csv"
"#,
        )
        .unwrap();
        let raw = Table::from_rows("s", vec!["ESCOLA".into()], vec![]).unwrap();
        let result = run(&config, &input(vec![("s", raw)])).unwrap();
        assert_eq!(result.meta.config_name, "meta");
        assert_eq!(result.meta.engine_version, env!("CARGO_PKG_VERSION"));
        assert!(chrono::DateTime::parse_from_rfc3339(&result.meta.run_at).is_ok());
    }
}
