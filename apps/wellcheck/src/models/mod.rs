//! Shared data models: severities, issues, per-file and whole-run reports.
//!
//! Every checker speaks this vocabulary. Counts in `Summary` and
//! `ReportSummary` are always derived from the collections they describe;
//! there are no setters for them.

pub mod file_key;

pub use file_key::FileKey;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Severity bucket. Ordered from most to least severe.
pub enum Severity {
    Critical,
    Important,
    Recommended,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Recommended => "recommended",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Optional context attached to an issue or passed check. Only the fields
/// relevant to a rule are populated.
pub struct Context {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_until_expiry: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A single rule violation.
pub struct Issue {
    pub severity: Severity,
    pub check: String,
    pub message: String,
    pub fix: String,
    #[serde(flatten)]
    pub context: Context,
}

impl Issue {
    /// The one constructor for issues. `message` and `fix` are required so no
    /// finding leaves without remediation text.
    pub fn new(
        severity: Severity,
        check: impl Into<String>,
        message: impl Into<String>,
        fix: impl Into<String>,
    ) -> Self {
        let message = message.into();
        let fix = fix.into();
        debug_assert!(!message.trim().is_empty(), "issue message must not be empty");
        debug_assert!(!fix.trim().is_empty(), "issue fix must not be empty");
        Self {
            severity,
            check: check.into(),
            message,
            fix,
            context: Context::default(),
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.context.line = Some(line);
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.context.value = Some(value.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.context.url = Some(url.into());
        self
    }

    pub fn with_count(mut self, count: u64, total: u64) -> Self {
        self.context.count = Some(count);
        self.context.total = Some(total);
        self
    }

    pub fn with_limit(mut self, count: u64, max: u64) -> Self {
        self.context.count = Some(count);
        self.context.max = Some(max);
        self
    }

    pub fn with_size(mut self, size_bytes: u64, max_bytes: u64) -> Self {
        self.context.size_bytes = Some(size_bytes);
        self.context.max_bytes = Some(max_bytes);
        self
    }

    pub fn with_days_until_expiry(mut self, days: i64) -> Self {
        self.context.days_until_expiry = Some(days);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A rule that was verified and held.
pub struct PassedCheck {
    pub check: String,
    pub message: String,
    #[serde(flatten)]
    pub context: Context,
}

impl PassedCheck {
    pub fn new(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            message: message.into(),
            context: Context::default(),
        }
    }

    pub fn with_count(mut self, count: u64, total: u64) -> Self {
        self.context.count = Some(count);
        self.context.total = Some(total);
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.context.value = Some(value.into());
        self
    }

    pub fn with_days_until_expiry(mut self, days: i64) -> Self {
        self.context.days_until_expiry = Some(days);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Per-file counts.
pub struct Summary {
    pub critical: usize,
    pub important: usize,
    pub recommended: usize,
    pub passed: usize,
}

impl Summary {
    /// Count issues by severity plus passed checks.
    pub fn tally(issues: &[Issue], passed: &[PassedCheck]) -> Self {
        let mut s = Summary {
            passed: passed.len(),
            ..Summary::default()
        };
        for is in issues {
            match is.severity {
                Severity::Critical => s.critical += 1,
                Severity::Important => s.important += 1,
                Severity::Recommended => s.recommended += 1,
            }
        }
        s
    }
}

/// Findings produced by a checker before the aggregator stamps file and source.
#[derive(Debug, Default)]
pub struct Findings {
    pub issues: Vec<Issue>,
    pub passed: Vec<PassedCheck>,
    pub stats: Option<Map<String, Json>>,
    pub fields: Option<Map<String, Json>>,
    pub structure: Option<Map<String, Json>>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn pass(&mut self, passed: PassedCheck) {
        self.passed.push(passed);
    }

    pub fn critical(&mut self, check: &str, message: impl Into<String>, fix: impl Into<String>) {
        self.push(Issue::new(Severity::Critical, check, message, fix));
    }

    pub fn important(&mut self, check: &str, message: impl Into<String>, fix: impl Into<String>) {
        self.push(Issue::new(Severity::Important, check, message, fix));
    }

    pub fn recommended(&mut self, check: &str, message: impl Into<String>, fix: impl Into<String>) {
        self.push(Issue::new(Severity::Recommended, check, message, fix));
    }

    pub fn passed(&mut self, check: &str, message: impl Into<String>) {
        self.pass(PassedCheck::new(check, message));
    }

    /// Insert a key into the `stats` object, creating it on first use.
    pub fn stat(&mut self, key: &str, value: impl Into<Json>) {
        self.stats
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
    }

    pub fn has_critical(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Result of checking one well-known file.
pub struct FileReport {
    pub file: FileKey,
    /// `"local"` for filesystem targets, otherwise the URL that was requested.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub found: bool,
    pub valid: bool,
    pub summary: Summary,
    pub issues: Vec<Issue>,
    pub passed: Vec<PassedCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Map<String, Json>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Map<String, Json>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<Map<String, Json>>,
}

impl FileReport {
    /// Build a report for a file that was found and checked.
    pub fn from_findings(
        file: FileKey,
        source: String,
        location: Option<String>,
        findings: Findings,
    ) -> Self {
        let Findings {
            issues,
            passed,
            stats,
            fields,
            structure,
        } = findings;
        Self::assemble(file, source, location, true, issues, passed, None).with_extras(
            stats, fields, structure,
        )
    }

    /// Build the report for a file absent at every well-known path.
    pub fn not_found(file: FileKey, source: String) -> Self {
        let paths = file.well_known_paths().join(" or ");
        let issue = if file.is_optional() {
            Issue::new(
                Severity::Recommended,
                "not-found",
                format!("{} not found (optional)", file.file_name()),
                format!(
                    "Consider adding /{} to credit the people behind the site",
                    paths
                ),
            )
        } else {
            Issue::new(
                Severity::Critical,
                "not-found",
                format!("{} not found", file.file_name()),
                format!("Create /{}", paths),
            )
        };
        Self::assemble(file, source, None, false, vec![issue], Vec::new(), None)
    }

    /// Build the report for a file whose retrieval failed in transport.
    pub fn fetch_failed(file: FileKey, source: String, cause: String) -> Self {
        let issue = Issue::new(
            Severity::Critical,
            "fetch-failed",
            format!("{} could not be retrieved: {}", file.file_name(), cause),
            "Check that the host is reachable and responds within the timeout",
        );
        Self::assemble(file, source, None, false, vec![issue], Vec::new(), Some(cause))
    }

    /// Build the report for content that was retrieved but could not be parsed.
    pub fn parse_failed(
        file: FileKey,
        source: String,
        location: Option<String>,
        cause: String,
    ) -> Self {
        let issue = Issue::new(
            Severity::Critical,
            "parse-error",
            format!("{} could not be parsed: {}", file.file_name(), cause),
            format!("Fix the syntax of {} so it can be parsed", file.file_name()),
        );
        Self::assemble(file, source, location, true, vec![issue], Vec::new(), Some(cause))
    }

    fn assemble(
        file: FileKey,
        source: String,
        location: Option<String>,
        found: bool,
        issues: Vec<Issue>,
        passed: Vec<PassedCheck>,
        error: Option<String>,
    ) -> Self {
        let summary = Summary::tally(&issues, &passed);
        Self {
            file,
            source,
            location,
            found,
            valid: summary.critical == 0,
            summary,
            issues,
            passed,
            error,
            stats: None,
            fields: None,
            structure: None,
        }
    }

    fn with_extras(
        mut self,
        stats: Option<Map<String, Json>>,
        fields: Option<Map<String, Json>>,
        structure: Option<Map<String, Json>>,
    ) -> Self {
        self.stats = stats;
        self.fields = fields;
        self.structure = structure;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Issue counts by severity.
pub struct SeverityCounts {
    pub critical: usize,
    pub important: usize,
    pub recommended: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Whole-run rollup; pure sums over the per-file reports.
pub struct ReportSummary {
    pub total_files: usize,
    pub found: usize,
    pub valid: usize,
    pub issues: SeverityCounts,
    pub passed: usize,
}

impl ReportSummary {
    pub fn from_files(files: &BTreeMap<FileKey, FileReport>) -> Self {
        let mut s = ReportSummary {
            total_files: files.len(),
            ..ReportSummary::default()
        };
        for fr in files.values() {
            s.found += usize::from(fr.found);
            s.valid += usize::from(fr.valid);
            s.issues.critical += fr.summary.critical;
            s.issues.important += fr.summary.important;
            s.issues.recommended += fr.summary.recommended;
            s.passed += fr.summary.passed;
        }
        s
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// The full result of one analysis run.
pub struct AnalysisReport {
    pub target: String,
    pub timestamp: String,
    pub summary: ReportSummary,
    pub files: BTreeMap<FileKey, FileReport>,
}

impl AnalysisReport {
    pub fn new(target: String, timestamp: String, files: BTreeMap<FileKey, FileReport>) -> Self {
        Self {
            target,
            timestamp,
            summary: ReportSummary::from_files(&files),
            files,
        }
    }

    /// True when any checked file carries a critical issue.
    pub fn has_critical(&self) -> bool {
        self.summary.issues.critical > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_report_shape() {
        let fr = FileReport::not_found(FileKey::Sitemap, "local".into());
        assert!(!fr.found);
        assert!(!fr.valid);
        assert_eq!(fr.summary.critical, 1);
        assert_eq!(fr.issues.len(), 1);
        assert_eq!(fr.issues[0].check, "not-found");
    }

    #[test]
    fn test_optional_file_absence_is_recommended() {
        let fr = FileReport::not_found(FileKey::Humans, "local".into());
        assert!(!fr.found);
        assert_eq!(fr.summary.critical, 0);
        assert_eq!(fr.summary.recommended, 1);
        assert_eq!(fr.valid, fr.summary.critical == 0);
    }

    #[test]
    fn test_valid_tracks_critical_count() {
        let mut f = Findings::new();
        f.important("a", "m", "f");
        f.passed("b", "ok");
        let fr = FileReport::from_findings(FileKey::Robots, "local".into(), None, f);
        assert!(fr.valid);
        assert_eq!(fr.summary.important, 1);
        assert_eq!(fr.summary.passed, 1);

        let mut f = Findings::new();
        f.critical("c", "m", "f");
        let fr = FileReport::from_findings(FileKey::Robots, "local".into(), None, f);
        assert!(!fr.valid);
    }

    #[test]
    fn test_report_summary_sums_files() {
        let mut files = BTreeMap::new();
        files.insert(
            FileKey::Sitemap,
            FileReport::not_found(FileKey::Sitemap, "local".into()),
        );
        let mut f = Findings::new();
        f.recommended("x", "m", "f");
        f.important("y", "m", "f");
        f.passed("z", "ok");
        files.insert(
            FileKey::Ads,
            FileReport::from_findings(FileKey::Ads, "local".into(), None, f),
        );
        let rep = AnalysisReport::new("/tmp/x".into(), "t".into(), files);
        assert_eq!(rep.summary.total_files, 2);
        assert_eq!(rep.summary.found, 1);
        assert_eq!(rep.summary.valid, 1);
        assert_eq!(rep.summary.issues.critical, 1);
        assert_eq!(rep.summary.issues.important, 1);
        assert_eq!(rep.summary.issues.recommended, 1);
        assert_eq!(rep.summary.passed, 1);
        assert!(rep.has_critical());
    }

    #[test]
    fn test_issue_context_serializes_flat_camel_case() {
        let is = Issue::new(Severity::Important, "expiry-soon", "m", "f").with_days_until_expiry(3);
        let v = serde_json::to_value(&is).unwrap();
        assert_eq!(v["severity"], "important");
        assert_eq!(v["daysUntilExpiry"], 3);
        assert!(v.get("line").is_none());
    }
}
