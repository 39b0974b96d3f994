// Source loading: locations, fetching, caching, CSV decoding

pub mod cache;
pub mod csv;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod source;

pub use cache::TtlCache;
pub use error::LoadError;
pub use fetch::{Fetcher, HttpFetcher};
pub use loader::{Loader, DEFAULT_TTL};
pub use source::{download_url, SourceLocation};
