//! Format checkers, one per well-known file.
//!
//! The file set is closed, so dispatch is a plain `match` on `FileKey`
//! rather than a registry. Each checker receives decoded text plus a small
//! context and returns `Findings`; the aggregator stamps file and source.

pub mod ads;
pub mod humans;
pub mod llms;
pub mod robots;
pub mod security;
pub mod sitemap;

use crate::error::CheckError;
use crate::locate::{Source, Target};
use crate::models::{FileKey, Findings};
use chrono::{DateTime, Utc};

/// Inputs a checker may consult besides the content itself.
pub struct CheckContext<'a> {
    pub target: &'a Target,
    pub source: &'a Source,
    /// Reference time for expiry rules.
    pub now: DateTime<Utc>,
}

/// Decode `bytes` and run the checker for `key`.
pub fn run_check(key: FileKey, bytes: &[u8], ctx: &CheckContext) -> Result<Findings, CheckError> {
    let text = std::str::from_utf8(bytes)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let findings = match key {
        FileKey::Sitemap => sitemap::check(text, ctx)?,
        FileKey::Robots => robots::check(text, ctx),
        FileKey::Llms => llms::check(text, false),
        FileKey::LlmsFull => llms::check(text, true),
        FileKey::Security => security::check(text, ctx),
        FileKey::Humans => humans::check(text),
        FileKey::Ads => ads::check(text),
    };
    Ok(findings)
}

/// Iterate non-blank lines with their 1-based line number, with `#`
/// comments removed and surrounding whitespace trimmed.
pub(crate) fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines().enumerate().filter_map(|(i, raw)| {
        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let line = line.trim();
        if line.is_empty() {
            None
        } else {
            Some((i + 1, line))
        }
    })
}

/// Split a `Field: value` line at the first colon.
pub(crate) fn split_field(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some((name, value.trim()))
}
