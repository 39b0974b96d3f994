use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconError {
    /// Two source columns fold to the same canonical name.
    DuplicateColumn { table: String, canonical: String, sources: Vec<String> },
    /// A group was supplied with zero rows.
    EmptyGroup { group: String },
    /// Externally supplied counts where correct exceeds total.
    InvalidCounts { group: String, correct: u64, total: u64 },
    /// More than one aggregate maps to the same pivot cell.
    AmbiguousPivot { district: String, school: String, grade: String, subject: String },
    /// A non-key column name appears on both sides of a join (or twice after suffixing).
    ColumnCollision { column: String },
    /// Required key columns are absent from a table entirely.
    MissingKeyColumns { table: String, columns: Vec<String> },
    /// Row has a different number of cells than the table has columns.
    RowWidth { table: String, row: usize, expected: usize, found: usize },
    /// Not enough numeric data for a statistic.
    InsufficientData { what: String, reason: String },
    /// A pipeline step references a dataset that does not exist.
    UnknownDataset(String),
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad reference, empty key, etc.).
    ConfigValidation(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateColumn { table, canonical, sources } => write!(
                f,
                "table '{table}': columns {} all normalize to '{canonical}'",
                quoted_list(sources)
            ),
            Self::EmptyGroup { group } => write!(f, "group {group} has no rows"),
            Self::InvalidCounts { group, correct, total } => {
                write!(f, "group {group}: correct count {correct} exceeds total {total}")
            }
            Self::AmbiguousPivot { district, school, grade, subject } => write!(
                f,
                "more than one record for district '{district}', school '{school}', grade '{grade}', subject '{subject}'"
            ),
            Self::ColumnCollision { column } => {
                write!(f, "column '{column}' would appear twice in the output")
            }
            Self::MissingKeyColumns { table, columns } => {
                write!(f, "table '{table}': missing column(s) {}", quoted_list(columns))
            }
            Self::RowWidth { table, row, expected, found } => write!(
                f,
                "table '{table}', row {row}: expected {expected} value(s), found {found}"
            ),
            Self::InsufficientData { what, reason } => write!(f, "{what}: {reason}"),
            Self::UnknownDataset(name) => write!(f, "unknown dataset: {name}"),
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

fn quoted_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
