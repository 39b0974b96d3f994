use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::error::ReconError;
use crate::model::JoinMode;
use crate::normalize::{AliasTable, CollisionPolicy};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    /// Start from the crate's built-in alias table.
    #[serde(default = "default_true")]
    pub builtin_aliases: bool,
    #[serde(default)]
    pub on_collision: CollisionPolicy,
    /// Dataset that becomes the unified table. Defaults to the last join.
    #[serde(default)]
    pub output: Option<String>,
    /// Extra `synonym = canonical` entries, layered over the built-ins.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub responses: ResponseColumns,
    pub sources: BTreeMap<String, SourceConfig>,
    #[serde(default)]
    pub concat: BTreeMap<String, ConcatConfig>,
    #[serde(default)]
    pub joins: Vec<JoinStep>,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// File path (relative to the config file) or URL.
    pub location: String,
    #[serde(default)]
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Already one row per school (or per student); used as-is.
    #[default]
    Table,
    /// One row per answered question; aggregated and pivoted per subject.
    Responses,
}

// ---------------------------------------------------------------------------
// Response-level columns
// ---------------------------------------------------------------------------

/// Canonical column names of a row-per-response table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResponseColumns {
    pub district: String,
    pub grade: String,
    pub school: String,
    pub subject: String,
    pub is_correct: String,
    /// Pivoted subject columns are named `<prefix>_<subject>`.
    pub pivot_prefix: String,
}

impl Default for ResponseColumns {
    fn default() -> Self {
        Self {
            district: "DE".into(),
            grade: "SERIE".into(),
            school: "ESCOLA".into(),
            subject: "DISCIPLINA".into(),
            is_correct: "ACERTO".into(),
            pivot_prefix: "Simulado".into(),
        }
    }
}

impl ResponseColumns {
    /// Same columns with names folded through `aliases`.
    pub fn canonicalized(&self, aliases: &AliasTable) -> Self {
        Self {
            district: aliases.canonicalize(&self.district),
            grade: aliases.canonicalize(&self.grade),
            school: aliases.canonicalize(&self.school),
            subject: aliases.canonicalize(&self.subject),
            is_correct: aliases.canonicalize(&self.is_correct),
            pivot_prefix: self.pivot_prefix.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Concat + Join
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ConcatConfig {
    pub sources: Vec<String>,
    /// Column recording which source each row came from.
    #[serde(default)]
    pub source_column: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinStep {
    #[serde(default)]
    pub name: Option<String>,
    pub left: String,
    pub right: String,
    pub on: Vec<String>,
    #[serde(default)]
    pub mode: JoinMode,
    /// `[left_suffix, right_suffix]` for colliding non-key columns.
    #[serde(default)]
    pub suffixes: Option<[String; 2]>,
}

impl JoinStep {
    pub fn output_name(&self) -> String {
        match self.name {
            Some(ref name) => name.clone(),
            None => format!("{}+{}", self.left, self.right),
        }
    }
}

// ---------------------------------------------------------------------------
// Standalone alias files
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AliasFile {
    aliases: BTreeMap<String, String>,
}

/// Parse a TOML document with an `[aliases]` table into an [`AliasTable`].
pub fn aliases_from_toml(input: &str) -> Result<AliasTable, ReconError> {
    let file: AliasFile =
        toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
    AliasTable::from_pairs(file.aliases)
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PipelineConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in aliases (unless disabled) with this config's entries on top.
    pub fn alias_table(&self) -> Result<AliasTable, ReconError> {
        let overrides = AliasTable::from_pairs(&self.aliases)?;
        if self.builtin_aliases {
            let mut table = AliasTable::builtin();
            table.extend(&overrides)?;
            Ok(table)
        } else {
            Ok(overrides)
        }
    }

    /// Name of the dataset that becomes the unified table.
    pub fn output_name(&self) -> Option<String> {
        if let Some(ref output) = self.output {
            return Some(output.clone());
        }
        if let Some(last) = self.joins.last() {
            return Some(last.output_name());
        }
        if self.concat.len() == 1 {
            return self.concat.keys().next().cloned();
        }
        if self.concat.is_empty() && self.sources.len() == 1 {
            return self.sources.keys().next().cloned();
        }
        None
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.sources.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least 1 source is required".into(),
            ));
        }
        for (name, source) in &self.sources {
            if source.location.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "source '{name}': location must not be empty"
                )));
            }
        }

        let aliases = self.alias_table()?;

        let r = &self.responses;
        for (field, value) in [
            ("district", &r.district),
            ("grade", &r.grade),
            ("school", &r.school),
            ("subject", &r.subject),
            ("is_correct", &r.is_correct),
        ] {
            if value.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "responses.{field} must not be empty"
                )));
            }
        }

        let mut available: HashSet<String> = self.sources.keys().cloned().collect();

        for (name, concat) in &self.concat {
            if available.contains(name) {
                return Err(ReconError::ConfigValidation(format!(
                    "concat '{name}': name already used by a source"
                )));
            }
            if concat.sources.is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "concat '{name}': at least 1 source is required"
                )));
            }
            for source in &concat.sources {
                if !self.sources.contains_key(source) {
                    return Err(ReconError::UnknownDataset(format!(
                        "concat '{name}': source '{source}' not found"
                    )));
                }
            }
        }
        available.extend(self.concat.keys().cloned());

        // Joins run in order; each may use anything defined before it.
        for (i, join) in self.joins.iter().enumerate() {
            let out = join.output_name();
            for (side, reference) in [("left", &join.left), ("right", &join.right)] {
                if !available.contains(reference) {
                    return Err(ReconError::UnknownDataset(format!(
                        "join #{} '{out}': {side} dataset '{reference}' not found",
                        i + 1
                    )));
                }
            }
            if join.on.is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "join '{out}': key must name at least 1 column"
                )));
            }
            let key = aliases.canonicalize_all(&join.on);
            let distinct: HashSet<&String> = key.iter().collect();
            if distinct.len() != key.len() {
                return Err(ReconError::ConfigValidation(format!(
                    "join '{out}': key repeats a column ({})",
                    key.join(", ")
                )));
            }
            if !available.insert(out.clone()) {
                return Err(ReconError::ConfigValidation(format!(
                    "join '{out}': name already used by another dataset"
                )));
            }
        }

        match self.output_name() {
            Some(output) if available.contains(&output) => Ok(()),
            Some(output) => Err(ReconError::UnknownDataset(format!(
                "output dataset '{output}' not found"
            ))),
            None => Err(ReconError::ConfigValidation(
                "output is required when no joins are configured".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
