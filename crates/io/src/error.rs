use std::fmt;

use saresp_recon::ReconError;

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Csv(csv::Error),
    /// File or response contained no header row.
    EmptyFile(String),
    /// Request failed, or the server answered with something other than data.
    Http { url: String, message: String },
    /// A location string that is neither a path nor an http(s) URL.
    BadLocation(String),
    /// Parsed rows could not form a table.
    Table(ReconError),
    /// Error while loading a named pipeline source.
    Source { name: String, error: Box<LoadError> },
}

impl LoadError {
    pub(crate) fn in_source(self, name: &str) -> Self {
        match self {
            Self::Source { .. } => self,
            other => Self::Source { name: name.to_string(), error: Box::new(other) },
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Csv(e) => write!(f, "CSV error: {e}"),
            Self::EmptyFile(what) => write!(f, "{what}: no header row"),
            Self::Http { url, message } => write!(f, "fetching {url}: {message}"),
            Self::BadLocation(loc) => write!(f, "unsupported location: {loc}"),
            Self::Table(e) => write!(f, "{e}"),
            Self::Source { name, error } => write!(f, "source '{name}': {error}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Csv(e) => Some(e),
            Self::Table(e) => Some(e),
            Self::Source { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for LoadError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

impl From<ReconError> for LoadError {
    fn from(e: ReconError) -> Self {
        Self::Table(e)
    }
}
