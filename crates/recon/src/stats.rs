//! Numeric summaries over unified tables: per-group means and spread,
//! simple linear regression and Pearson correlation.
//!
//! Cells are read with [`Value::as_f64`], so numeric text counts. Rows whose
//! cells are null or non-numeric are skipped.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ReconError;
use crate::table::{KeyValue, Table, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMean {
    pub group: KeyValue,
    pub mean: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMeans {
    pub group_column: String,
    pub value_column: String,
    pub groups: Vec<GroupMean>,
    /// Rows skipped for a missing group or a non-numeric value.
    pub skipped: usize,
}

/// Mean of `value_col` per distinct `group_col` value, ordered by group.
pub fn group_mean(
    table: &Table,
    group_col: &str,
    value_col: &str,
) -> Result<GroupMeans, ReconError> {
    let (by_group, skipped) = grouped_values(table, group_col, value_col)?;

    let groups = by_group
        .into_iter()
        .map(|(group, xs)| GroupMean {
            group,
            mean: xs.iter().sum::<f64>() / xs.len() as f64,
            count: xs.len(),
        })
        .collect();

    Ok(GroupMeans {
        group_column: group_col.to_string(),
        value_column: value_col.to_string(),
        groups,
        skipped,
    })
}

/// Spread of one group: minimum, quartiles and maximum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group: KeyValue,
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummaries {
    pub group_column: String,
    pub value_column: String,
    pub groups: Vec<GroupSummary>,
    pub skipped: usize,
}

/// Five-number summary of `value_col` per distinct `group_col` value.
///
/// Quartiles interpolate linearly between the closest ranks, so the median
/// of an even-sized group is the mean of its two middle values.
pub fn group_summary(
    table: &Table,
    group_col: &str,
    value_col: &str,
) -> Result<GroupSummaries, ReconError> {
    let (by_group, skipped) = grouped_values(table, group_col, value_col)?;

    let groups = by_group
        .into_iter()
        .map(|(group, mut xs)| {
            xs.sort_by(f64::total_cmp);
            GroupSummary {
                group,
                count: xs.len(),
                min: xs[0],
                q1: quantile(&xs, 0.25),
                median: quantile(&xs, 0.5),
                q3: quantile(&xs, 0.75),
                max: xs[xs.len() - 1],
            }
        })
        .collect();

    Ok(GroupSummaries {
        group_column: group_col.to_string(),
        value_column: value_col.to_string(),
        groups,
        skipped,
    })
}

/// Numeric values of `value_col` bucketed by `group_col`, plus the number of
/// rows skipped for a missing group or a non-numeric value. Every bucket is
/// non-empty.
fn grouped_values(
    table: &Table,
    group_col: &str,
    value_col: &str,
) -> Result<(BTreeMap<KeyValue, Vec<f64>>, usize), ReconError> {
    let idx = table.require_columns(&[group_col.to_string(), value_col.to_string()])?;
    let (g, v) = (idx[0], idx[1]);

    let mut by_group: BTreeMap<KeyValue, Vec<f64>> = BTreeMap::new();
    let mut skipped = 0;
    for row in table.rows() {
        match (KeyValue::from_value(&row[g]), finite(&row[v])) {
            (Some(group), Some(x)) => by_group.entry(group).or_default().push(x),
            _ => skipped += 1,
        }
    }
    Ok((by_group, skipped))
}

// `sorted` is ascending and non-empty
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Regression {
    pub x: String,
    pub y: String,
    pub slope: f64,
    pub intercept: f64,
    /// Pearson r; `None` when `y` is constant.
    pub r: Option<f64>,
    pub r_squared: Option<f64>,
    pub n: usize,
}

/// Least-squares fit of `y = slope * x + intercept`.
pub fn linear_regression(table: &Table, x: &str, y: &str) -> Result<Regression, ReconError> {
    let idx = table.require_columns(&[x.to_string(), y.to_string()])?;
    let points = paired(table, idx[0], idx[1]);
    let what = format!("regression of '{y}' on '{x}'");

    if points.len() < 2 {
        return Err(ReconError::InsufficientData {
            what,
            reason: format!("need at least 2 numeric pairs, found {}", points.len()),
        });
    }

    let m = Moments::of(&points);
    if m.sxx == 0.0 {
        return Err(ReconError::InsufficientData {
            what,
            reason: format!("'{x}' has zero variance"),
        });
    }

    let slope = m.sxy / m.sxx;
    let intercept = m.mean_y - slope * m.mean_x;
    let r = m.pearson();

    Ok(Regression {
        x: x.to_string(),
        y: y.to_string(),
        slope,
        intercept,
        r,
        r_squared: r.map(|r| r * r),
        n: points.len(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// `values[i][j]` is r(columns[i], columns[j]); `None` when undefined.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }
}

/// Pairwise Pearson correlation. Each pair uses the rows where both cells
/// are numeric.
pub fn correlation_matrix(
    table: &Table,
    columns: &[String],
) -> Result<CorrelationMatrix, ReconError> {
    if columns.len() < 2 {
        return Err(ReconError::InsufficientData {
            what: "correlation matrix".into(),
            reason: format!("need at least 2 columns, got {}", columns.len()),
        });
    }
    let idx = table.require_columns(columns)?;

    let n = idx.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let points = paired(table, idx[i], idx[j]);
            let r = if points.len() < 2 {
                None
            } else {
                Moments::of(&points).pearson()
            };
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    Ok(CorrelationMatrix { columns: columns.to_vec(), values })
}

fn finite(value: &Value) -> Option<f64> {
    value.as_f64().filter(|x| x.is_finite())
}

fn paired(table: &Table, a: usize, b: usize) -> Vec<(f64, f64)> {
    table
        .rows()
        .iter()
        .filter_map(|row| Some((finite(&row[a])?, finite(&row[b])?)))
        .collect()
}

struct Moments {
    mean_x: f64,
    mean_y: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
}

impl Moments {
    fn of(points: &[(f64, f64)]) -> Self {
        let n = points.len() as f64;
        let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
        let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for &(x, y) in points {
            let (dx, dy) = (x - mean_x, y - mean_y);
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }
        Self { mean_x, mean_y, sxx, syy, sxy }
    }

    fn pearson(&self) -> Option<f64> {
        let denom = (self.sxx * self.syy).sqrt();
        if denom == 0.0 {
            None
        } else {
            Some((self.sxy / denom).clamp(-1.0, 1.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy(points: &[(Value, Value)]) -> Table {
        Table::from_rows(
            "t",
            vec!["X".into(), "Y".into()],
            points.iter().map(|(x, y)| vec![x.clone(), y.clone()]).collect(),
        )
        .unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn mean_per_group_in_key_order() {
        let table = Table::from_rows(
            "t",
            vec!["RACA".into(), "SARESP".into()],
            vec![
                vec![Value::text("PARDA"), Value::Number(240.0)],
                vec![Value::text("BRANCA"), Value::Number(260.0)],
                vec![Value::text("parda"), Value::Number(250.0)],
                vec![Value::Null, Value::Number(300.0)],
                vec![Value::text("BRANCA"), Value::text("n/a")],
            ],
        )
        .unwrap();
        let out = group_mean(&table, "RACA", "SARESP").unwrap();
        assert_eq!(out.groups.len(), 2);
        assert_eq!(out.groups[0].group.to_string(), "BRANCA");
        assert_eq!(out.groups[0].mean, 260.0);
        assert_eq!(out.groups[1].mean, 245.0);
        assert_eq!(out.groups[1].count, 2);
        assert_eq!(out.skipped, 2);
    }

    #[test]
    fn summary_quartiles_interpolate() {
        let table = Table::from_rows(
            "t",
            vec!["RACA".into(), "SARESP".into()],
            vec![
                vec![Value::text("PARDA"), Value::Number(5.0)],
                vec![Value::text("PARDA"), Value::Number(1.0)],
                vec![Value::text("PARDA"), Value::Number(4.0)],
                vec![Value::text("PARDA"), Value::Number(2.0)],
                vec![Value::text("PARDA"), Value::Number(3.0)],
                vec![Value::text("BRANCA"), Value::Number(20.0)],
                vec![Value::text("BRANCA"), Value::Number(10.0)],
                vec![Value::text("PRETA"), Value::Null],
            ],
        )
        .unwrap();
        let out = group_summary(&table, "RACA", "SARESP").unwrap();
        assert_eq!(out.skipped, 1);
        assert_eq!(out.groups.len(), 2);

        let branca = &out.groups[0];
        assert_eq!(branca.group.to_string(), "BRANCA");
        assert_eq!((branca.min, branca.max), (10.0, 20.0));
        assert!(approx(branca.median, 15.0));
        assert!(approx(branca.q1, 12.5));
        assert!(approx(branca.q3, 17.5));

        let parda = &out.groups[1];
        assert_eq!(parda.count, 5);
        assert_eq!((parda.min, parda.q1, parda.median, parda.q3, parda.max), (1.0, 2.0, 3.0, 4.0, 5.0));
    }

    #[test]
    fn summary_of_single_value_is_flat() {
        let table = Table::from_rows(
            "t",
            vec!["G".into(), "V".into()],
            vec![vec![Value::text("A"), Value::Number(7.0)]],
        )
        .unwrap();
        let g = &group_summary(&table, "G", "V").unwrap().groups[0];
        assert_eq!((g.min, g.q1, g.median, g.q3, g.max), (7.0, 7.0, 7.0, 7.0, 7.0));
    }

    #[test]
    fn perfect_line() {
        let table = xy(&[
            (Value::Number(1.0), Value::Number(3.0)),
            (Value::Number(2.0), Value::Number(5.0)),
            (Value::Number(3.0), Value::Number(7.0)),
            (Value::Null, Value::Number(100.0)),
        ]);
        let fit = linear_regression(&table, "X", "Y").unwrap();
        assert!(approx(fit.slope, 2.0));
        assert!(approx(fit.intercept, 1.0));
        assert!(approx(fit.r.unwrap(), 1.0));
        assert_eq!(fit.n, 3);
    }

    #[test]
    fn numeric_text_is_used() {
        let table = xy(&[
            (Value::text("1"), Value::text("2")),
            (Value::text("2"), Value::text("4")),
        ]);
        let fit = linear_regression(&table, "X", "Y").unwrap();
        assert!(approx(fit.slope, 2.0));
    }

    #[test]
    fn too_few_points() {
        let table = xy(&[(Value::Number(1.0), Value::Number(3.0))]);
        let err = linear_regression(&table, "X", "Y").unwrap_err();
        assert!(matches!(err, ReconError::InsufficientData { .. }));
    }

    #[test]
    fn constant_x_has_no_fit() {
        let table = xy(&[
            (Value::Number(1.0), Value::Number(3.0)),
            (Value::Number(1.0), Value::Number(5.0)),
        ]);
        let err = linear_regression(&table, "X", "Y").unwrap_err();
        assert!(err.to_string().contains("zero variance"));
    }

    #[test]
    fn constant_y_has_flat_slope_and_no_r() {
        let table = xy(&[
            (Value::Number(1.0), Value::Number(4.0)),
            (Value::Number(2.0), Value::Number(4.0)),
        ]);
        let fit = linear_regression(&table, "X", "Y").unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.r, None);
    }

    #[test]
    fn correlation_matrix_is_symmetric() {
        let table = Table::from_rows(
            "t",
            vec!["A".into(), "B".into(), "C".into()],
            vec![
                vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)],
                vec![Value::Number(2.0), Value::Number(4.0), Value::Number(1.0)],
                vec![Value::Number(3.0), Value::Number(6.0), Value::Number(2.0)],
            ],
        )
        .unwrap();
        let cols = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let m = correlation_matrix(&table, &cols).unwrap();
        assert!(approx(m.get("A", "B").unwrap(), 1.0));
        assert!(approx(m.get("A", "A").unwrap(), 1.0));
        assert_eq!(m.get("A", "C"), m.get("C", "A"));
        assert!(m.get("A", "C").unwrap() < 0.0);
    }

    #[test]
    fn correlation_needs_two_columns() {
        let table = xy(&[]);
        let err = correlation_matrix(&table, &["X".to_string()]).unwrap_err();
        assert!(matches!(err, ReconError::InsufficientData { .. }));
    }
}
