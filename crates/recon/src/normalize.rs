//! Column-name normalization against a declarative alias table.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Deserialize;

use crate::diagnostics::TableDiagnostics;
use crate::error::ReconError;
use crate::table::{fold, Table};

/// Synonyms the SARESP / Simulado exports are known to use, as
/// `(synonym, canonical)`. Folded at load time.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("ESCOLAS", "ESCOLA"),
    ("NOME DA ESCOLA", "ESCOLA"),
    ("NOME ESCOLA", "ESCOLA"),
    ("NOME_ESCOLA", "ESCOLA"),
    ("NOMESC", "ESCOLA"),
    ("UNIDADE ESCOLAR", "ESCOLA"),
    ("D.E.", "DE"),
    ("D.E", "DE"),
    ("DIRETORIA", "DE"),
    ("DIRETORIA DE ENSINO", "DE"),
    ("DIRETORIA_ENSINO", "DE"),
    ("NOMEDEP", "DE"),
    ("CÓDIGO DA ESCOLA", "CODIGO_ESCOLA"),
    ("CODIGO DA ESCOLA", "CODIGO_ESCOLA"),
    ("COD_ESC", "CODIGO_ESCOLA"),
    ("CODESC", "CODIGO_ESCOLA"),
    ("CIE", "CODIGO_ESCOLA"),
    ("ANO", "SERIE"),
    ("ANO/SÉRIE", "SERIE"),
    ("ANO/SERIE", "SERIE"),
    ("SÉRIE", "SERIE"),
    ("SÉRIE/ANO", "SERIE"),
    ("SERIE_ANO", "SERIE"),
    ("COMPONENTE", "DISCIPLINA"),
    ("COMPONENTE CURRICULAR", "DISCIPLINA"),
    ("MATERIA", "DISCIPLINA"),
    ("MATÉRIA", "DISCIPLINA"),
    ("DS_COMP", "DISCIPLINA"),
    ("ACERTOU", "ACERTO"),
    ("CORRETA", "ACERTO"),
    ("CORRETO", "ACERTO"),
    ("IS_CORRECT", "ACERTO"),
    ("RESPOSTA CORRETA", "ACERTO"),
    ("RACE", "RACA"),
    ("RAÇA", "RACA"),
    ("RAÇA/COR", "RACA"),
    ("COR/RAÇA", "RACA"),
    ("COR_RACA", "RACA"),
    ("NOTA SARESP", "SARESP"),
    ("NOTA_SARESP", "SARESP"),
    ("PROFICIENCIA", "SARESP"),
    ("PROFICIÊNCIA", "SARESP"),
    ("NOTA SIMULADO", "SIMULADO"),
    ("NOTA_SIMULADO", "SIMULADO"),
    ("MUNICÍPIO", "MUNICIPIO"),
    ("CIDADE", "MUNICIPIO"),
    ("NOME DO ALUNO", "ALUNO"),
    ("ESTUDANTE", "ALUNO"),
];

// ---------------------------------------------------------------------------
// Alias table
// ---------------------------------------------------------------------------

static BUILTIN: LazyLock<AliasTable> = LazyLock::new(|| {
    AliasTable::from_pairs(BUILTIN_ALIASES.iter().copied())
        .expect("built-in aliases never remap a canonical name")
});

/// Folded synonym → canonical name. Every canonical name maps to itself, so
/// canonicalizing a canonical name is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    map: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aliases shipped with the crate.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    pub fn from_pairs<I, S, C>(pairs: I) -> Result<Self, ReconError>
    where
        I: IntoIterator<Item = (S, C)>,
        S: AsRef<str>,
        C: AsRef<str>,
    {
        let mut table = Self::new();
        for (synonym, canonical) in pairs {
            table.insert(synonym.as_ref(), canonical.as_ref())?;
        }
        Ok(table)
    }

    /// Register `synonym → canonical`, replacing an earlier mapping for the
    /// same synonym. Rejects entries that would make canonicalization
    /// non-idempotent.
    pub fn insert(&mut self, synonym: &str, canonical: &str) -> Result<(), ReconError> {
        let synonym = fold(synonym);
        let canonical = fold(canonical);
        if synonym.is_empty() || canonical.is_empty() {
            return Err(ReconError::ConfigValidation("alias names must not be blank".into()));
        }

        if let Some(target) = self.map.get(&canonical) {
            if synonym != canonical && *target != canonical {
                return Err(ReconError::ConfigValidation(format!(
                    "alias target '{canonical}' is itself an alias of '{target}'"
                )));
            }
        }
        if synonym != canonical && self.map.values().any(|v| *v == synonym) {
            return Err(ReconError::ConfigValidation(format!(
                "'{synonym}' is a canonical name and cannot be remapped to '{canonical}'"
            )));
        }

        self.map.insert(canonical.clone(), canonical.clone());
        self.map.insert(synonym, canonical);
        Ok(())
    }

    /// Layer `overrides` on top of this table.
    pub fn extend(&mut self, overrides: &AliasTable) -> Result<(), ReconError> {
        let mut pairs: Vec<(&String, &String)> = overrides.map.iter().collect();
        // Identity entries first so targets exist before their synonyms.
        pairs.sort_by_key(|(s, c)| (s != c, s.as_str()));
        for (synonym, canonical) in pairs {
            self.insert(synonym, canonical)?;
        }
        Ok(())
    }

    pub fn canonicalize(&self, name: &str) -> String {
        let folded = fold(name);
        match self.map.get(&folded) {
            Some(canonical) => canonical.clone(),
            None => folded,
        }
    }

    pub fn canonicalize_all(&self, names: &[String]) -> Vec<String> {
        names.iter().map(|n| self.canonicalize(n)).collect()
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.map.contains_key(&fold(name))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// What to do when several source columns normalize to the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    #[default]
    Error,
    KeepFirst,
    KeepLast,
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub table: Table,
    /// Original → canonical, for every column in the input.
    pub mapping: Vec<(String, String)>,
    /// Retained columns that matched no alias.
    pub unrecognized: Vec<String>,
    /// Original names of columns discarded by the collision policy.
    pub dropped: Vec<String>,
}

impl Normalized {
    pub fn diagnostics(&self) -> TableDiagnostics {
        TableDiagnostics {
            unrecognized_columns: self.unrecognized.clone(),
            dropped_columns: self.dropped.clone(),
            ..TableDiagnostics::default()
        }
    }
}

/// Return a copy of `table` whose column names are canonical.
pub fn normalize_columns(
    table: &Table,
    aliases: &AliasTable,
    policy: CollisionPolicy,
) -> Result<Normalized, ReconError> {
    let mapping: Vec<(String, String)> = table
        .columns()
        .iter()
        .map(|c| (c.clone(), aliases.canonicalize(c)))
        .collect();

    // canonical → source column indices, in first-seen order
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, (_, canonical)) in mapping.iter().enumerate() {
        match groups.iter_mut().find(|(c, _)| c == canonical) {
            Some((_, idxs)) => idxs.push(i),
            None => groups.push((canonical.clone(), vec![i])),
        }
    }

    let mut keep = vec![true; mapping.len()];
    let mut dropped = Vec::new();
    for (canonical, idxs) in &groups {
        if idxs.len() < 2 {
            continue;
        }
        let winner = match policy {
            CollisionPolicy::Error => {
                return Err(ReconError::DuplicateColumn {
                    table: table.name().to_string(),
                    canonical: canonical.clone(),
                    sources: idxs.iter().map(|&i| mapping[i].0.clone()).collect(),
                });
            }
            CollisionPolicy::KeepFirst => idxs[0],
            CollisionPolicy::KeepLast => idxs[idxs.len() - 1],
        };
        for &i in idxs {
            if i != winner {
                keep[i] = false;
                dropped.push(mapping[i].0.clone());
            }
        }
        log::warn!(
            "table '{}': {} column(s) normalize to '{}', kept '{}'",
            table.name(),
            idxs.len(),
            canonical,
            mapping[winner].0
        );
    }

    let columns: Vec<String> = mapping
        .iter()
        .zip(&keep)
        .filter(|(_, k)| **k)
        .map(|((_, c), _)| c.clone())
        .collect();

    let rows: Vec<Vec<_>> = table
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(v, _)| v.clone())
                .collect()
        })
        .collect();

    let unrecognized: Vec<String> = columns
        .iter()
        .filter(|c| !aliases.is_known(c))
        .cloned()
        .collect();
    if !unrecognized.is_empty() {
        log::debug!("table '{}': unrecognized columns {:?}", table.name(), unrecognized);
    }

    Ok(Normalized {
        table: Table::from_rows(table.name(), columns, rows)?,
        mapping,
        unrecognized,
        dropped,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
