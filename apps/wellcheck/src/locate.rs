//! Resource locator: turns a target plus a file key into bytes.
//!
//! Local targets are read from disk; remote targets are fetched over HTTP
//! through the `Fetch` seam so tests can substitute a stub. No retries:
//! a missing file is itself a finding.

use crate::analyze::CancelToken;
use crate::checks::sitemap;
use crate::error::{AnalyzeError, FetchError, FetchErrorKind, LocateError};
use crate::models::FileKey;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Where the well-known files live for this run.
pub enum Target {
    Local(PathBuf),
    Remote(Url),
}

impl Target {
    /// Parse a target string: `http(s)://` URLs are remote, anything else is
    /// a filesystem path.
    pub fn parse(s: &str) -> Result<Target, AnalyzeError> {
        let t = s.trim();
        if t.is_empty() {
            return Err(AnalyzeError::InvalidTarget(
                s.to_string(),
                "target is empty".into(),
            ));
        }
        let lower = t.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let mut url = Url::parse(t)
                .map_err(|e| AnalyzeError::InvalidTarget(t.to_string(), e.to_string()))?;
            if url.host_str().is_none() {
                return Err(AnalyzeError::InvalidTarget(
                    t.to_string(),
                    "URL has no host".into(),
                ));
            }
            // Relative joins need a trailing slash on the base path.
            if !url.path().ends_with('/') {
                let p = format!("{}/", url.path());
                url.set_path(&p);
            }
            url.set_query(None);
            url.set_fragment(None);
            Ok(Target::Remote(url))
        } else {
            Ok(Target::Local(PathBuf::from(t)))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Target::Remote(_))
    }

    /// Human-readable description used as the report's `target`.
    pub fn describe(&self) -> String {
        match self {
            Target::Local(p) => p.to_string_lossy().to_string(),
            Target::Remote(u) => u.to_string(),
        }
    }

    /// Source descriptor for a file that was not obtained: `"local"` or the
    /// URL of the preferred well-known path.
    pub fn source_label(&self, key: FileKey) -> String {
        match self {
            Target::Local(_) => "local".to_string(),
            Target::Remote(base) => base
                .join(key.well_known_paths()[0])
                .map(|u| u.to_string())
                .unwrap_or_else(|_| base.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Where a file's bytes actually came from.
pub struct Source {
    /// `"local"` or the final URL after transparent redirects.
    pub label: String,
    /// Relative well-known path that matched.
    pub location: String,
    /// Whether the file came from a `.well-known/` path.
    pub well_known: bool,
    /// `Some(true)` when served over HTTPS; `None` for local reads.
    pub https: Option<bool>,
}

#[derive(Debug)]
pub struct Located {
    pub bytes: Vec<u8>,
    pub source: Source,
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    /// Final URL after any redirects the fetch layer followed.
    pub url: Url,
    pub bytes: Vec<u8>,
}

/// Remote bodies are read up to this many bytes. One byte past the largest
/// checker limit, so an oversized sitemap is still reported as such.
pub const MAX_BODY_BYTES: u64 = sitemap::MAX_BYTES + 1;

/// How often a waiting fetch polls its cancel token.
const CANCEL_POLL: Duration = Duration::from_millis(25);

/// The single capability the analyzer needs from the network layer.
///
/// Implementations must return promptly with a `Cancelled` error once
/// `cancel` trips, even while a request is in flight.
pub trait Fetch: Send + Sync {
    fn get(
        &self,
        url: &Url,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<FetchResponse, FetchError>;
}

/// Run `job` on a helper thread and wait for it, giving up as soon as
/// `cancel` trips. The abandoned job finishes in the background and its
/// result is dropped.
pub fn run_cancellable<T, F>(cancel: &CancelToken, job: F) -> Result<T, FetchError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, FetchError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("wellcheck-fetch".into())
        .spawn(move || {
            let _ = tx.send(job());
        })
        .map_err(|e| FetchError::new(FetchErrorKind::Other, e.to_string()))?;
    loop {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        match rx.recv_timeout(CANCEL_POLL) {
            Ok(result) => return result,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(FetchError::new(
                    FetchErrorKind::Other,
                    "fetch worker exited without a result",
                ))
            }
        }
    }
}

fn cancelled() -> FetchError {
    FetchError::new(FetchErrorKind::Cancelled, "run cancelled")
}

/// Blocking HTTP fetcher backed by `reqwest`.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn get(
        &self,
        url: &Url,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<FetchResponse, FetchError> {
        let client = self.client.clone();
        let url = url.clone();
        run_cancellable(cancel, move || {
            let resp = client.get(url).timeout(timeout).send()?;
            let status = resp.status().as_u16();
            let final_url = resp.url().clone();
            let mut bytes = Vec::new();
            resp.take(MAX_BODY_BYTES)
                .read_to_end(&mut bytes)
                .map_err(|e| FetchError::new(FetchErrorKind::Other, e.to_string()))?;
            Ok(FetchResponse {
                status,
                url: final_url,
                bytes,
            })
        })
    }
}

/// Obtain the bytes for `key` from `target`, trying each well-known path in
/// preference order.
pub fn locate(
    target: &Target,
    key: FileKey,
    fetcher: &dyn Fetch,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<Located, LocateError> {
    match target {
        Target::Local(root) => locate_local(root, key),
        Target::Remote(base) => locate_remote(base, key, fetcher, timeout, cancel),
    }
}

fn locate_local(root: &Path, key: FileKey) -> Result<Located, LocateError> {
    for rel in key.well_known_paths() {
        let path = root.join(rel);
        if !path.is_file() {
            debug!(file = %key, path = %path.display(), "not present");
            continue;
        }
        let bytes = fs::read(&path).map_err(|source| LocateError::Read {
            path: path.clone(),
            source,
        })?;
        debug!(file = %key, path = %path.display(), bytes = bytes.len(), "read local file");
        return Ok(Located {
            bytes,
            source: Source {
                label: "local".to_string(),
                location: rel.to_string(),
                well_known: rel.starts_with(".well-known/"),
                https: None,
            },
        });
    }
    Err(LocateError::NotFound)
}

fn locate_remote(
    base: &Url,
    key: FileKey,
    fetcher: &dyn Fetch,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<Located, LocateError> {
    let mut first_err: Option<FetchError> = None;
    for rel in key.well_known_paths() {
        if cancel.is_cancelled() {
            return Err(LocateError::Cancelled);
        }
        let url = match base.join(rel) {
            Ok(u) => u,
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(FetchError::new(FetchErrorKind::Other, e.to_string()));
                }
                continue;
            }
        };
        let outcome = fetcher.get(&url, timeout, cancel);
        // A fetch that finishes after cancellation must not be reported.
        if cancel.is_cancelled() {
            return Err(LocateError::Cancelled);
        }
        match outcome {
            Err(e) if e.kind == FetchErrorKind::Cancelled => return Err(LocateError::Cancelled),
            Ok(resp) if (200..300).contains(&resp.status) => {
                debug!(file = %key, url = %resp.url, status = resp.status, "fetched");
                let https = resp.url.scheme() == "https";
                return Ok(Located {
                    bytes: resp.bytes,
                    source: Source {
                        label: resp.url.to_string(),
                        location: rel.to_string(),
                        well_known: rel.starts_with(".well-known/"),
                        https: Some(https),
                    },
                });
            }
            Ok(resp) => {
                debug!(file = %key, url = %url, status = resp.status, "non-success status");
            }
            Err(e) => {
                debug!(file = %key, url = %url, error = %e, "fetch failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }
    match first_err {
        Some(e) => Err(LocateError::Fetch(e)),
        None => Err(LocateError::NotFound),
    }
}
