use std::path::{Path, PathBuf};
use std::time::Duration;

use saresp_recon::{PipelineConfig, PipelineInput, Table};

use crate::cache::TtlCache;
use crate::csv::parse_table;
use crate::error::LoadError;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::source::{download_url, SourceLocation};

/// Default lifetime of a cached remote payload.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Turns source locations into tables. Remote payloads are cached per
/// download URL for the cache's TTL; local files are always re-read.
pub struct Loader<F: Fetcher = HttpFetcher> {
    fetcher: F,
    cache: TtlCache<Vec<u8>>,
    base_dir: Option<PathBuf>,
}

impl Loader<HttpFetcher> {
    pub fn http() -> Result<Self, LoadError> {
        Ok(Self::new(HttpFetcher::new()?, DEFAULT_TTL))
    }
}

impl<F: Fetcher> Loader<F> {
    pub fn new(fetcher: F, ttl: Duration) -> Self {
        Self { fetcher, cache: TtlCache::new(ttl), base_dir: None }
    }

    /// Resolve relative paths against `dir` (usually the pipeline file's directory).
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn load(&mut self, name: &str, location: &str) -> Result<Table, LoadError> {
        let location = SourceLocation::parse(location, self.base_dir.as_deref())?;
        self.load_location(name, &location)
    }

    pub fn load_location(
        &mut self,
        name: &str,
        location: &SourceLocation,
    ) -> Result<Table, LoadError> {
        let bytes = match location {
            SourceLocation::Path(path) => read_local(path)?,
            SourceLocation::Url(url) => self.fetch_cached(url)?,
        };
        parse_table(name, &bytes)
    }

    /// Load every source named in `config`.
    pub fn load_all(&mut self, config: &PipelineConfig) -> Result<PipelineInput, LoadError> {
        let mut input = PipelineInput::default();
        for (name, source) in &config.sources {
            let table = self
                .load(name, &source.location)
                .map_err(|e| e.in_source(name))?;
            log::info!(
                "loaded '{}': {} row(s), {} column(s)",
                name,
                table.len(),
                table.width()
            );
            input.tables.insert(name.clone(), table);
        }
        Ok(input)
    }

    /// Forget the cached payload for `url` (share link or direct link).
    pub fn invalidate(&mut self, url: &str) -> bool {
        self.cache.invalidate(&download_url(url))
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn fetch_cached(&mut self, url: &str) -> Result<Vec<u8>, LoadError> {
        let direct = download_url(url);
        if let Some(bytes) = self.cache.get(&direct) {
            log::debug!("cache hit: {}", direct);
            return Ok(bytes.clone());
        }
        if direct != url {
            log::debug!("rewrote {} -> {}", url, direct);
        }
        let bytes = self.fetcher.fetch(&direct)?;
        self.cache.insert(direct, bytes.clone());
        Ok(bytes)
    }
}

fn read_local(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|e| {
        LoadError::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display())))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Default)]
    struct StaticFetcher {
        bodies: HashMap<String, Vec<u8>>,
        calls: RefCell<Vec<String>>,
    }

    impl StaticFetcher {
        fn with(url: &str, body: &str) -> Self {
            let mut f = Self::default();
            f.bodies.insert(url.to_string(), body.as_bytes().to_vec());
            f
        }
    }

    impl Fetcher for StaticFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
            self.calls.borrow_mut().push(url.to_string());
            self.bodies.get(url).cloned().ok_or_else(|| LoadError::Http {
                url: url.to_string(),
                message: "HTTP 404".into(),
            })
        }
    }

    const DIRECT: &str = "https://drive.google.com/uc?export=download&id=abc";
    const SHARE: &str = "https://drive.google.com/file/d/abc/view?usp=drive_link";

    #[test]
    fn share_links_are_rewritten_and_cached() {
        let mut loader = Loader::new(StaticFetcher::with(DIRECT, "ESCOLA,DE\nA,1\n"), DEFAULT_TTL);

        let first = loader.load("simulado", SHARE).unwrap();
        let second = loader.load("simulado", SHARE).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.name(), "simulado");
        assert_eq!(loader.fetcher.calls.borrow().as_slice(), &[DIRECT.to_string()]);

        assert!(loader.invalidate(SHARE));
        loader.load("simulado", SHARE).unwrap();
        assert_eq!(loader.fetcher.calls.borrow().len(), 2);
    }

    #[test]
    fn zero_ttl_refetches() {
        let mut loader = Loader::new(StaticFetcher::with(DIRECT, "A,B\n1,2\n"), Duration::ZERO);
        loader.load("s", DIRECT).unwrap();
        loader.load("s", DIRECT).unwrap();
        assert_eq!(loader.fetcher.calls.borrow().len(), 2);
    }

    #[test]
    fn relative_paths_use_base_dir() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("saresp.csv"), "Escolas;Nota\nA;7,5\n").unwrap();

        let mut loader =
            Loader::new(StaticFetcher::default(), DEFAULT_TTL).with_base_dir(dir.path());
        let table = loader.load("saresp", "saresp.csv").unwrap();
        assert_eq!(table.columns(), &["Escolas", "Nota"]);
        assert!(loader.fetcher.calls.borrow().is_empty());
    }

    #[test]
    fn load_all_names_the_failing_source() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ok.csv"), "A,B\n1,2\n").unwrap();
        let config = PipelineConfig::from_toml(
            r#"
name = "t"
[sources.good]
location = "ok.csv"
[sources.missing]
location = "nope.csv"
[[joins]]
left = "good"
right = "missing"
on = ["A"]
"#,
        )
        .unwrap();

        let mut loader =
            Loader::new(StaticFetcher::default(), DEFAULT_TTL).with_base_dir(dir.path());
        let err = loader.load_all(&config).unwrap_err();
        match err {
            LoadError::Source { name, error } => {
                assert_eq!(name, "missing");
                assert!(matches!(*error, LoadError::Io(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_all_collects_every_source() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "A,B\n1,2\n").unwrap();
        let config = PipelineConfig::from_toml(&format!(
            r#"
name = "t"
output = "local"
[sources.local]
location = "a.csv"
[sources.remote]
location = "{SHARE}"
"#
        ))
        .unwrap();

        let mut loader = Loader::new(StaticFetcher::with(DIRECT, "X\n1\n"), DEFAULT_TTL)
            .with_base_dir(dir.path());
        let input = loader.load_all(&config).unwrap();
        assert_eq!(input.tables.len(), 2);
        assert_eq!(input.tables["remote"].columns(), &["X"]);
    }
}
