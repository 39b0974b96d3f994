//! Where a source table lives: a local file or an http(s) URL.
//!
//! Google Drive and Google Sheets share links point at viewer pages, not at
//! the data. [`download_url`] rewrites them to their direct-download form.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Path(PathBuf),
    Url(String),
}

impl SourceLocation {
    /// Parse a location string. Relative paths are resolved against `base_dir`.
    pub fn parse(raw: &str, base_dir: Option<&Path>) -> Result<Self, LoadError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(LoadError::BadLocation("(empty)".into()));
        }

        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(Self::Url(raw.to_string()));
        }
        if let Some(path) = raw.strip_prefix("file://") {
            return Ok(Self::Path(PathBuf::from(path)));
        }
        if has_scheme(raw) {
            return Err(LoadError::BadLocation(raw.to_string()));
        }

        let path = PathBuf::from(raw);
        match base_dir {
            Some(base) if path.is_relative() => Ok(Self::Path(base.join(path))),
            _ => Ok(Self::Path(path)),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Url(_))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::Url(u) => f.write_str(u),
        }
    }
}

// `scheme://` with a scheme of at least two chars, so `C:\data.csv` stays a path.
fn has_scheme(raw: &str) -> bool {
    match raw.find("://") {
        Some(i) if i >= 2 => raw[..i]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}

/// Direct-download URL for `url`.
///
/// - `drive.google.com/file/d/<id>/...` and `drive.google.com/open?id=<id>`
///   become `https://drive.google.com/uc?export=download&id=<id>`.
/// - `docs.google.com/spreadsheets/d/<id>/...` becomes the sheet's CSV export,
///   keeping the `gid` of the selected tab when present.
///
/// Anything else is returned unchanged.
pub fn download_url(url: &str) -> String {
    if let Some(id) = capture(&DRIVE_FILE, url).or_else(|| capture(&DRIVE_OPEN, url)) {
        return format!("https://drive.google.com/uc?export=download&id={id}");
    }

    if let Some(id) = capture(&SHEETS, url) {
        let mut out = format!("https://docs.google.com/spreadsheets/d/{id}/export?format=csv");
        if let Some(gid) = capture(&SHEET_GID, url) {
            out.push_str("&gid=");
            out.push_str(&gid);
        }
        return out;
    }

    url.to_string()
}

static DRIVE_FILE: LazyLock<Regex> =
    LazyLock::new(|| link_pattern(r"drive\.google\.com/file/d/([A-Za-z0-9_-]+)"));
static DRIVE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| link_pattern(r"drive\.google\.com/open\?(?:.*&)?id=([A-Za-z0-9_-]+)"));
static SHEETS: LazyLock<Regex> =
    LazyLock::new(|| link_pattern(r"docs\.google\.com/spreadsheets/d/([A-Za-z0-9_-]+)"));
static SHEET_GID: LazyLock<Regex> = LazyLock::new(|| link_pattern(r"[?#&]gid=(\d+)"));

fn link_pattern(pattern: &str) -> Regex {
    Regex::new(pattern).expect("link patterns are valid regexes")
}

fn capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
