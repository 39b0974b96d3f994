use std::collections::BTreeMap;

use crate::config::ResponseColumns;
use crate::diagnostics::TableDiagnostics;
use crate::error::ReconError;
use crate::model::{AggregateRecord, GroupKey};
use crate::table::{fold, KeyValue, Table, Value};

#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub records: Vec<AggregateRecord>,
    pub diagnostics: TableDiagnostics,
}

/// Group response rows by (district, grade, school, subject) and compute the
/// share of correct answers.
///
/// Rows are excluded (and counted) when a district/grade/school value is
/// missing, when the subject is null, or when the correctness flag is null or
/// unreadable. Excluded rows count in neither numerator nor denominator.
pub fn aggregate_responses(
    table: &Table,
    columns: &ResponseColumns,
) -> Result<AggregateOutcome, ReconError> {
    let idx = table.require_columns(&[
        columns.district.clone(),
        columns.grade.clone(),
        columns.school.clone(),
        columns.subject.clone(),
        columns.is_correct.clone(),
    ])?;
    let (district_idx, grade_idx, school_idx, subject_idx, correct_idx) =
        (idx[0], idx[1], idx[2], idx[3], idx[4]);

    let mut groups: BTreeMap<GroupKey, (u64, u64)> = BTreeMap::new();
    let mut diagnostics = TableDiagnostics::default();

    for row in table.rows() {
        let (Some(district), Some(grade), Some(school)) = (
            KeyValue::from_value(&row[district_idx]),
            KeyValue::from_value(&row[grade_idx]),
            KeyValue::from_value(&row[school_idx]),
        ) else {
            diagnostics.dropped_rows_missing_key += 1;
            continue;
        };
        let Some(subject) = KeyValue::from_value(&row[subject_idx]) else {
            diagnostics.excluded_null_subject += 1;
            continue;
        };
        let Some(is_correct) = parse_correctness(&row[correct_idx]) else {
            diagnostics.excluded_null_correctness += 1;
            continue;
        };

        let entry = groups
            .entry(GroupKey { district, grade, school, subject })
            .or_insert((0, 0));
        if is_correct {
            entry.0 += 1;
        }
        entry.1 += 1;
    }

    if !diagnostics.is_clean() {
        log::warn!(
            "table '{}': excluded {} row(s) missing key, {} null subject, {} null correctness",
            table.name(),
            diagnostics.dropped_rows_missing_key,
            diagnostics.excluded_null_subject,
            diagnostics.excluded_null_correctness
        );
    }

    let records = groups
        .into_iter()
        .map(|(key, (correct, total))| AggregateRecord::from_counts(key, correct, total))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AggregateOutcome { records, diagnostics })
}

/// Read a correctness flag. `None` for null or unrecognized values.
pub fn parse_correctness(value: &Value) -> Option<bool> {
    match value {
        Value::Number(n) if *n == 1.0 => Some(true),
        Value::Number(n) if *n == 0.0 => Some(false),
        Value::Text(s) => match fold(s).as_str() {
            "1" | "TRUE" | "VERDADEIRO" | "V" | "SIM" | "S" | "CERTO" | "C" => Some(true),
            "0" | "FALSE" | "FALSO" | "F" | "NAO" | "NÃO" | "N" | "ERRADO" | "E" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responses(rows: Vec<Vec<Value>>) -> Table {
        Table::from_rows(
            "simulado",
            vec![
                "DE".into(),
                "SERIE".into(),
                "ESCOLA".into(),
                "DISCIPLINA".into(),
                "ACERTO".into(),
            ],
            rows,
        )
        .unwrap()
    }

    fn answer(de: f64, grade: f64, school: &str, subject: &str, correct: Value) -> Vec<Value> {
        vec![
            Value::Number(de),
            Value::Number(grade),
            Value::text(school),
            Value::text(subject),
            correct,
        ]
    }

    #[test]
    fn six_of_ten_is_sixty_percent() {
        let rows = (0..10)
            .map(|i| answer(1.0, 9.0, "A", "LP", Value::Number(if i < 6 { 1.0 } else { 0.0 })))
            .collect();
        let out = aggregate_responses(&responses(rows), &ResponseColumns::default()).unwrap();
        assert_eq!(out.records.len(), 1);
        let rec = &out.records[0];
        assert_eq!(rec.total, 10);
        assert_eq!(rec.correct, 6);
        assert_eq!(rec.percentage, 60.0);
        assert!(out.diagnostics.is_clean());
    }

    #[test]
    fn groups_by_all_four_dimensions() {
        let rows = vec![
            answer(1.0, 9.0, "A", "LP", Value::Number(1.0)),
            answer(1.0, 9.0, "A", "MAT", Value::Number(0.0)),
            answer(1.0, 9.0, "B", "LP", Value::Number(1.0)),
            answer(2.0, 9.0, "A", "LP", Value::Number(1.0)),
            answer(1.0, 5.0, "A", "LP", Value::Number(1.0)),
        ];
        let out = aggregate_responses(&responses(rows), &ResponseColumns::default()).unwrap();
        assert_eq!(out.records.len(), 5);
        for rec in &out.records {
            assert!(rec.total > 0);
            assert!((0.0..=100.0).contains(&rec.percentage));
        }
        // BTreeMap ordering: district, then grade
        assert_eq!(out.records[0].key.grade.to_string(), "5");
    }

    #[test]
    fn null_subject_and_flag_are_excluded_and_counted() {
        let rows = vec![
            answer(1.0, 9.0, "A", "LP", Value::Number(1.0)),
            vec![
                Value::Number(1.0),
                Value::Number(9.0),
                Value::text("A"),
                Value::Null,
                Value::Number(1.0),
            ],
            answer(1.0, 9.0, "A", "LP", Value::Null),
            answer(1.0, 9.0, "A", "LP", Value::text("talvez")),
            vec![
                Value::Null,
                Value::Number(9.0),
                Value::text("A"),
                Value::text("LP"),
                Value::Number(0.0),
            ],
        ];
        let out = aggregate_responses(&responses(rows), &ResponseColumns::default()).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].total, 1);
        assert_eq!(out.records[0].percentage, 100.0);
        assert_eq!(out.diagnostics.excluded_null_subject, 1);
        assert_eq!(out.diagnostics.excluded_null_correctness, 2);
        assert_eq!(out.diagnostics.dropped_rows_missing_key, 1);
    }

    #[test]
    fn textual_flags_are_understood() {
        assert_eq!(parse_correctness(&Value::text("Sim")), Some(true));
        assert_eq!(parse_correctness(&Value::text(" não ")), Some(false));
        assert_eq!(parse_correctness(&Value::text("TRUE")), Some(true));
        assert_eq!(parse_correctness(&Value::text("errado")), Some(false));
        assert_eq!(parse_correctness(&Value::Number(0.5)), None);
        assert_eq!(parse_correctness(&Value::Null), None);
    }

    #[test]
    fn missing_response_column_is_reported() {
        let table = Table::from_rows("t", vec!["DE".into(), "ESCOLA".into()], vec![]).unwrap();
        let err = aggregate_responses(&table, &ResponseColumns::default()).unwrap_err();
        match err {
            ReconError::MissingKeyColumns { columns, .. } => {
                assert_eq!(columns, vec!["SERIE", "DISCIPLINA", "ACERTO"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
