//! Wellcheck core library.
//!
//! This crate exposes programmatic APIs for auditing the well-known files of
//! a site or a build directory and reporting severity-ranked findings.
//!
//! High-level modules:
//! - `analyze`: Runs the per-file checks and folds them into one report.
//! - `locate`: Reads files from disk or fetches them over HTTP.
//! - `checks`: Format checkers, one per well-known file.
//! - `models`: Issues, severities, per-file and whole-run reports.
//! - `output`: Human/JSON renderers.
//! - `config`: Discovery and effective configuration resolution.
//! - `cli`: CLI argument parsing (binary uses this).
//! - `error`: Error types.
//! - `utils`: Supporting helpers.
pub mod analyze;
pub mod checks;
pub mod cli;
pub mod config;
pub mod error;
pub mod locate;
pub mod models;
pub mod output;
pub mod utils;

pub use analyze::{analyze, analyze_with, CancelToken, CheckOptions};
pub use error::{AnalyzeError, Result};
pub use locate::Target;
pub use models::{AnalysisReport, FileKey, FileReport, Issue, Severity};
