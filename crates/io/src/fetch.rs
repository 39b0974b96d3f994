//! Remote fetching: a `Fetcher` seam plus the reqwest-backed implementation.

use std::thread;
use std::time::Duration;

use crate::error::LoadError;

pub const MAX_RETRIES: u32 = 3;
pub const USER_AGENT: &str = concat!("saresp/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Retrieves the raw bytes behind a URL.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError>;
}

/// Blocking HTTP client with retry and exponential backoff.
///
/// 429, 5xx and network errors are retried up to `max_retries` times; other
/// 4xx statuses fail immediately. A 429 `Retry-After` header (in seconds)
/// overrides the backoff for that attempt.
pub struct HttpFetcher {
    http: reqwest::blocking::Client,
    max_retries: u32,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, LoadError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, LoadError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LoadError::Http {
                url: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, max_retries: MAX_RETRIES, backoff: Duration::from_secs(1) })
    }

    /// Override retry count and initial backoff (doubled after each retry).
    pub fn with_retry(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let http_err = |message: String| LoadError::Http { url: url.to_string(), message };
        let mut backoff = self.backoff;

        for attempt in 0..=self.max_retries {
            let resp = match self.http.get(url).send() {
                Ok(resp) => resp,
                Err(e) => {
                    // Network/timeout errors: retry
                    if attempt == self.max_retries {
                        return Err(http_err(format!(
                            "failed after {} attempt(s): {e}",
                            attempt + 1
                        )));
                    }
                    log::warn!(
                        "retry {}/{} in {:?} ({})",
                        attempt + 1,
                        self.max_retries,
                        backoff,
                        e
                    );
                    thread::sleep(backoff);
                    backoff *= 2;
                    continue;
                }
            };

            let status = resp.status().as_u16();

            if status == 429 || status >= 500 {
                if attempt == self.max_retries {
                    let what = if status == 429 { "rate limited" } else { "upstream error" };
                    return Err(http_err(format!(
                        "{what} after {} attempt(s) (HTTP {status})",
                        attempt + 1
                    )));
                }
                let wait = if status == 429 {
                    resp.headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse::<u64>().ok())
                        .map(Duration::from_secs)
                        .unwrap_or(backoff)
                } else {
                    backoff
                };
                log::warn!(
                    "retry {}/{} in {:?} (HTTP {})",
                    attempt + 1,
                    self.max_retries,
                    wait,
                    status
                );
                thread::sleep(wait);
                backoff *= 2;
                continue;
            }

            if status >= 400 {
                let hint = if status == 401 || status == 403 || status == 404 {
                    "; is the file shared publicly?"
                } else {
                    ""
                };
                return Err(http_err(format!("HTTP {status}{hint}")));
            }

            let is_html = resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_ascii_lowercase().starts_with("text/html"))
                .unwrap_or(false);

            let body = resp
                .bytes()
                .map_err(|e| http_err(format!("failed to read response body: {e}")))?;

            if is_html || looks_like_html(&body) {
                return Err(http_err(
                    "received an HTML page instead of data; check that the link is public \
                     and points at a file"
                        .into(),
                ));
            }

            log::debug!("fetched {} ({} bytes)", url, body.len());
            return Ok(body.to_vec());
        }

        Err(http_err("no attempts made".into()))
    }
}

fn looks_like_html(body: &[u8]) -> bool {
    let head = &body[..body.len().min(256)];
    let text = String::from_utf8_lossy(head).trim_start().to_ascii_lowercase();
    text.starts_with("<!doctype html") || text.starts_with("<html")
}
