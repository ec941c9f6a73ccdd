//! Error types for locating, parsing, and analyzing well-known files.
//!
//! Only `AnalyzeError` escapes `analyze`; the others are folded into the
//! affected file's report.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Broad cause of a transport failure, used to detect a target that is
/// unreachable as a whole.
pub enum FetchErrorKind {
    Timeout,
    Connect,
    Other,
    /// The run was cancelled while the request was in flight.
    Cancelled,
}

#[derive(Error, Debug, Clone)]
#[error("{message}")]
/// Network, DNS, or timeout failure while fetching a remote file.
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FetchErrorKind::Timeout
        } else if err.is_connect() {
            FetchErrorKind::Connect
        } else {
            FetchErrorKind::Other
        };
        FetchError::new(kind, err.to_string())
    }
}

#[derive(Error, Debug)]
/// Failure to obtain a file's bytes.
pub enum LocateError {
    #[error("not found at any well-known path")]
    NotFound,

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("read failed for {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("run cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
/// Content retrieved but malformed for its format.
pub enum CheckError {
    #[error("content is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("malformed XML: {0}")]
    Xml(String),
}

impl From<quick_xml::Error> for CheckError {
    fn from(err: quick_xml::Error) -> Self {
        CheckError::Xml(err.to_string())
    }
}

#[derive(Error, Debug)]
/// Whole-run failure, distinct from "everything is non-compliant".
pub enum AnalyzeError {
    #[error("invalid target '{0}': {1}")]
    InvalidTarget(String, String),

    #[error("target directory does not exist: {0}")]
    TargetMissing(PathBuf),

    #[error("target unreachable: {0}")]
    TargetUnreachable(String),

    #[error("worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, AnalyzeError>;

#[derive(Error, Debug)]
/// Invalid configuration file or flag value. The binary exits 2 on these.
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{0}")]
    Only(String),

    #[error("invalid output mode '{0}' (expected human or json)")]
    Output(String),

    #[error("timeout must be at least one second")]
    Timeout,
}
