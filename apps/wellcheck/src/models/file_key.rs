//! Keys for the seven well-known files and the paths they live at.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// One of the well-known web resource files. Declaration order is report order.
pub enum FileKey {
    Sitemap,
    Robots,
    Llms,
    LlmsFull,
    Security,
    Humans,
    Ads,
}

impl FileKey {
    pub const ALL: [FileKey; 7] = [
        FileKey::Sitemap,
        FileKey::Robots,
        FileKey::Llms,
        FileKey::LlmsFull,
        FileKey::Security,
        FileKey::Humans,
        FileKey::Ads,
    ];

    /// Short key used by `--only` and as the report map key.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKey::Sitemap => "sitemap",
            FileKey::Robots => "robots",
            FileKey::Llms => "llms",
            FileKey::LlmsFull => "llms-full",
            FileKey::Security => "security",
            FileKey::Humans => "humans",
            FileKey::Ads => "ads",
        }
    }

    /// File name as it appears on disk or in a URL.
    pub fn file_name(&self) -> &'static str {
        match self {
            FileKey::Sitemap => "sitemap.xml",
            FileKey::Robots => "robots.txt",
            FileKey::Llms => "llms.txt",
            FileKey::LlmsFull => "llms-full.txt",
            FileKey::Security => "security.txt",
            FileKey::Humans => "humans.txt",
            FileKey::Ads => "ads.txt",
        }
    }

    /// Relative paths to try, in preference order.
    ///
    /// Only `security.txt` has an alternate: RFC 9116 places it under
    /// `/.well-known/` and keeps the site root as a legacy fallback.
    pub fn well_known_paths(&self) -> &'static [&'static str] {
        match self {
            FileKey::Security => &[".well-known/security.txt", "security.txt"],
            FileKey::Sitemap => &["sitemap.xml"],
            FileKey::Robots => &["robots.txt"],
            FileKey::Llms => &["llms.txt"],
            FileKey::LlmsFull => &["llms-full.txt"],
            FileKey::Humans => &["humans.txt"],
            FileKey::Ads => &["ads.txt"],
        }
    }

    /// Whether the file is optional, so its absence is only a recommendation.
    pub fn is_optional(&self) -> bool {
        matches!(self, FileKey::Humans)
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim().to_ascii_lowercase();
        FileKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == t || k.file_name() == t)
            .ok_or_else(|| {
                format!(
                    "unknown file key '{}' (expected one of: {})",
                    s.trim(),
                    FileKey::ALL
                        .iter()
                        .map(|k| k.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// Parse a comma-separated `only` list. Empty tokens are skipped.
pub fn parse_only_list(s: &str) -> Result<Vec<FileKey>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(FileKey::from_str)
        .collect()
}
