//! Aggregator: locate and check each selected file, then fold the results
//! into one `AnalysisReport`.
//!
//! Files are checked in parallel on a pool sized to the file set (at most
//! seven workers). Every per-file failure becomes that file's report; only
//! a target-level failure is returned as an error.

use crate::checks::{run_check, CheckContext};
use crate::error::{AnalyzeError, FetchError, FetchErrorKind, LocateError, Result};
use crate::locate::{locate, Fetch, FetchResponse, HttpFetcher, Target};
use crate::models::{AnalysisReport, FileKey, FileReport};
use chrono::{DateTime, SecondsFormat, Utc};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Default)]
/// Shared flag for aborting a run. Files not yet started are omitted from
/// the report; fetches that complete after cancellation are discarded.
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
/// Per-run options.
pub struct CheckOptions {
    /// Restrict the run to these keys; `None` checks all seven.
    pub only: Option<BTreeSet<FileKey>>,
    /// Timeout applied to each fetch.
    pub timeout: Duration,
    pub user_agent: String,
    pub cancel: CancelToken,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            only: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: default_user_agent(),
            cancel: CancelToken::new(),
        }
    }
}

impl CheckOptions {
    /// All seven keys intersected with `only`, in report order.
    pub fn file_set(&self) -> Vec<FileKey> {
        FileKey::ALL
            .iter()
            .copied()
            .filter(|k| self.only.as_ref().map_or(true, |set| set.contains(k)))
            .collect()
    }
}

pub fn default_user_agent() -> String {
    format!("wellcheck/{}", env!("CARGO_PKG_VERSION"))
}

/// Stands in for the network when the target is a directory.
struct Offline;

impl Fetch for Offline {
    fn get(
        &self,
        url: &Url,
        _timeout: Duration,
        _cancel: &CancelToken,
    ) -> std::result::Result<FetchResponse, FetchError> {
        Err(FetchError::new(
            FetchErrorKind::Other,
            format!("network disabled for local target: {}", url),
        ))
    }
}

/// Analyze `target` with the default HTTP fetcher and the current time.
pub fn analyze(target: &Target, options: &CheckOptions) -> Result<AnalysisReport> {
    match target {
        Target::Remote(_) => {
            let fetcher = HttpFetcher::new(&options.user_agent)
                .map_err(|e| AnalyzeError::TargetUnreachable(e.to_string()))?;
            analyze_with(target, options, &fetcher, Utc::now())
        }
        Target::Local(_) => analyze_with(target, options, &Offline, Utc::now()),
    }
}

/// Analyze `target` using `fetcher` for remote reads and `now` as the
/// reference time for expiry rules and the report timestamp.
pub fn analyze_with(
    target: &Target,
    options: &CheckOptions,
    fetcher: &dyn Fetch,
    now: DateTime<Utc>,
) -> Result<AnalysisReport> {
    if let Target::Local(root) = target {
        if !root.is_dir() {
            return Err(AnalyzeError::TargetMissing(root.clone()));
        }
    }

    let keys = options.file_set();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(keys.len().max(1))
        .build()?;
    debug!(site = %target.describe(), files = keys.len(), "starting analysis");

    let outcomes: Vec<(FileKey, Option<FileOutcome>)> = pool.install(|| {
        keys.par_iter()
            .map(|&key| (key, check_file(target, key, fetcher, options, now)))
            .collect()
    });

    let mut files: BTreeMap<FileKey, FileReport> = BTreeMap::new();
    let mut transport_failures: Vec<(FetchErrorKind, String)> = Vec::new();
    let mut completed = 0usize;
    for (key, outcome) in outcomes {
        let Some(outcome) = outcome else {
            debug!(file = %key, "omitted after cancellation");
            continue;
        };
        completed += 1;
        if let Some(failure) = outcome.transport_failure {
            transport_failures.push(failure);
        }
        files.insert(key, outcome.report);
    }

    if target.is_remote() && completed > 0 && transport_failures.len() == completed {
        let first_kind = transport_failures[0].0;
        if transport_failures.iter().all(|(k, _)| *k == first_kind) {
            warn!(site = %target.describe(), "every file failed with the same transport error");
            return Err(AnalyzeError::TargetUnreachable(
                transport_failures[0].1.clone(),
            ));
        }
    }

    let report = AnalysisReport::new(
        target.describe(),
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
        files,
    );
    info!(
        site = %report.target,
        files = report.summary.total_files,
        found = report.summary.found,
        critical = report.summary.issues.critical,
        "analysis complete"
    );
    Ok(report)
}

struct FileOutcome {
    report: FileReport,
    transport_failure: Option<(FetchErrorKind, String)>,
}

/// Locate and check one file. `None` means the run was cancelled before
/// this file produced an authoritative result.
fn check_file(
    target: &Target,
    key: FileKey,
    fetcher: &dyn Fetch,
    options: &CheckOptions,
    now: DateTime<Utc>,
) -> Option<FileOutcome> {
    if options.cancel.is_cancelled() {
        return None;
    }
    let label = target.source_label(key);
    match locate(target, key, fetcher, options.timeout, &options.cancel) {
        Ok(located) => {
            let ctx = CheckContext {
                target,
                source: &located.source,
                now,
            };
            let report = match run_check(key, &located.bytes, &ctx) {
                Ok(findings) => FileReport::from_findings(
                    key,
                    located.source.label.clone(),
                    Some(located.source.location.clone()),
                    findings,
                ),
                Err(e) => {
                    warn!(file = %key, error = %e, "parse failed");
                    FileReport::parse_failed(
                        key,
                        located.source.label.clone(),
                        Some(located.source.location.clone()),
                        e.to_string(),
                    )
                }
            };
            debug!(file = %key, critical = report.summary.critical, "checked");
            Some(FileOutcome {
                report,
                transport_failure: None,
            })
        }
        Err(LocateError::NotFound) => {
            debug!(file = %key, "not found");
            Some(FileOutcome {
                report: FileReport::not_found(key, label),
                transport_failure: None,
            })
        }
        Err(LocateError::Fetch(e)) => {
            warn!(file = %key, error = %e, "fetch failed");
            Some(FileOutcome {
                report: FileReport::fetch_failed(key, label, e.message.clone()),
                transport_failure: Some((e.kind, e.message)),
            })
        }
        Err(e @ LocateError::Read { .. }) => {
            warn!(file = %key, error = %e, "read failed");
            Some(FileOutcome {
                report: FileReport::fetch_failed(key, label, e.to_string()),
                transport_failure: None,
            })
        }
        Err(LocateError::Cancelled) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::tests::fixed_now;
    use crate::locate::run_cancellable;
    use crate::locate::tests::StubFetcher;
    use crate::models::Severity;
    use crate::output::to_json;
    use std::fs;
    use tempfile::tempdir;

    fn only(keys: &[FileKey]) -> CheckOptions {
        CheckOptions {
            only: Some(keys.iter().copied().collect()),
            ..CheckOptions::default()
        }
    }

    fn populated_site() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("robots.txt"),
            "User-agent: *\nDisallow: /private\nSitemap: https://example.com/sitemap.xml\n",
        )
        .unwrap();
        fs::write(
            root.join("llms.txt"),
            "# Example\n> Summary\n## Docs\n- [Guide](https://example.com/guide)\n",
        )
        .unwrap();
        fs::create_dir_all(root.join(".well-known")).unwrap();
        fs::write(
            root.join(".well-known/security.txt"),
            "Contact: mailto:a@b.com\nExpires: 2000-01-01T00:00:00.000Z\n",
        )
        .unwrap();
        fs::write(root.join("ads.txt"), "google.com, pub-1, DIRECT\nbad\n").unwrap();
        dir
    }

    fn run_local(dir: &std::path::Path, opts: &CheckOptions) -> AnalysisReport {
        let target = Target::Local(dir.to_path_buf());
        analyze_with(&target, opts, &Offline, fixed_now()).unwrap()
    }

    #[test]
    fn test_missing_sitemap_scenario() {
        let dir = tempdir().unwrap();
        let rep = run_local(dir.path(), &CheckOptions::default());
        let sm = &rep.files[&FileKey::Sitemap];
        assert!(!sm.found);
        assert!(!sm.valid);
        assert_eq!(sm.summary.critical, 1);
        assert_eq!(sm.source, "local");
        assert_eq!(rep.files.len(), 7);
    }

    #[test]
    fn test_only_restricts_file_map() {
        let dir = populated_site();
        let rep = run_local(dir.path(), &only(&[FileKey::Security]));
        assert_eq!(rep.files.len(), 1);
        assert!(rep.files.contains_key(&FileKey::Security));
        assert_eq!(rep.summary.total_files, 1);
    }

    #[test]
    fn test_summary_is_sum_of_files() {
        let dir = populated_site();
        let rep = run_local(dir.path(), &CheckOptions::default());
        let sum = |sel: fn(&FileReport) -> usize| rep.files.values().map(sel).sum::<usize>();
        assert_eq!(rep.summary.issues.critical, sum(|f| f.summary.critical));
        assert_eq!(rep.summary.issues.important, sum(|f| f.summary.important));
        assert_eq!(rep.summary.issues.recommended, sum(|f| f.summary.recommended));
        assert_eq!(rep.summary.found, rep.files.values().filter(|f| f.found).count());
        for fr in rep.files.values() {
            assert_eq!(fr.valid, fr.summary.critical == 0, "{}", fr.file);
            assert_eq!(
                fr.summary.critical,
                fr.issues.iter().filter(|i| i.severity == Severity::Critical).count()
            );
            assert_eq!(fr.summary.passed, fr.passed.len());
        }
        // Expired security.txt and missing files drive the critical count.
        let sec = &rep.files[&FileKey::Security];
        assert!(sec.found);
        assert_eq!(sec.location.as_deref(), Some(".well-known/security.txt"));
        assert!(sec.issues.iter().any(|i| i.check == "expired"));
        assert!(rep.files[&FileKey::Llms].issues.is_empty());
        assert!(rep.has_critical());
    }

    #[test]
    fn test_idempotent_on_unchanged_content() {
        let dir = populated_site();
        let a = run_local(dir.path(), &CheckOptions::default());
        let b = run_local(dir.path(), &CheckOptions::default());
        assert_eq!(a.files, b.files);
        assert_eq!(a.summary, b.summary);
    }

    #[test]
    fn test_parse_failure_is_isolated() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("sitemap.xml"), "<urlset><url>").unwrap();
        fs::write(dir.path().join("humans.txt"), "/* TEAM */\nAda").unwrap();
        let rep = run_local(dir.path(), &only(&[FileKey::Sitemap, FileKey::Humans]));
        let sm = &rep.files[&FileKey::Sitemap];
        assert!(sm.found);
        assert!(!sm.valid);
        assert!(sm.error.is_some());
        assert_eq!(sm.summary.critical, 1);
        assert!(rep.files[&FileKey::Humans].valid);
    }

    #[test]
    fn test_missing_local_target_is_operational() {
        let dir = tempdir().unwrap();
        let target = Target::Local(dir.path().join("nope"));
        let err = analyze_with(&target, &CheckOptions::default(), &Offline, fixed_now())
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::TargetMissing(_)));
    }

    #[test]
    fn test_remote_unreachable_is_operational() {
        let target = Target::parse("https://down.example").unwrap();
        let stub = StubFetcher::failing(FetchErrorKind::Connect);
        let err = analyze_with(&target, &CheckOptions::default(), &stub, fixed_now())
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::TargetUnreachable(_)));
    }

    #[test]
    fn test_remote_mixed_results() {
        let target = Target::parse("https://example.com").unwrap();
        let stub = StubFetcher::new()
            .page(
                "https://example.com/robots.txt",
                "User-agent: *\nAllow: /\nSitemap: https://example.com/sitemap.xml",
            )
            .page(
                "https://example.com/.well-known/security.txt",
                "Contact: mailto:a@b.com\nExpires: 2026-01-01T00:00:00Z\nCanonical: https://example.com/.well-known/security.txt",
            );
        let rep = analyze_with(&target, &CheckOptions::default(), &stub, fixed_now()).unwrap();
        let robots = &rep.files[&FileKey::Robots];
        assert!(robots.found && robots.valid);
        assert_eq!(robots.source, "https://example.com/robots.txt");
        let sec = &rep.files[&FileKey::Security];
        assert!(sec.issues.is_empty(), "{:?}", sec.issues);
        let ads = &rep.files[&FileKey::Ads];
        assert!(!ads.found);
        assert_eq!(ads.source, "https://example.com/ads.txt");
        assert_eq!(rep.summary.found, 2);
        assert_eq!(rep.timestamp, "2025-06-01T12:00:00Z");
    }

    #[test]
    fn test_partial_transport_failure_is_per_file() {
        struct Flaky;
        impl Fetch for Flaky {
            fn get(
                &self,
                url: &Url,
                _timeout: Duration,
                _cancel: &CancelToken,
            ) -> std::result::Result<FetchResponse, FetchError> {
                if url.path() == "/ads.txt" {
                    Err(FetchError::new(FetchErrorKind::Timeout, "timed out"))
                } else {
                    Ok(FetchResponse {
                        status: 404,
                        url: url.clone(),
                        bytes: Vec::new(),
                    })
                }
            }
        }
        let target = Target::parse("https://example.com").unwrap();
        let rep = analyze_with(&target, &CheckOptions::default(), &Flaky, fixed_now()).unwrap();
        let ads = &rep.files[&FileKey::Ads];
        assert!(!ads.found);
        assert_eq!(ads.error.as_deref(), Some("timed out"));
        assert_eq!(ads.issues[0].check, "fetch-failed");
        assert_eq!(rep.files[&FileKey::Robots].issues[0].check, "not-found");
    }

    #[test]
    fn test_cancelled_run_omits_unstarted_files() {
        let dir = populated_site();
        let opts = CheckOptions::default();
        opts.cancel.cancel();
        let rep = run_local(dir.path(), &opts);
        assert!(rep.files.is_empty());
        assert_eq!(rep.summary.total_files, 0);
    }

    #[test]
    fn test_cancel_during_fetch_returns_promptly() {
        struct SlowCancelling;
        impl Fetch for SlowCancelling {
            fn get(
                &self,
                _url: &Url,
                _timeout: Duration,
                cancel: &CancelToken,
            ) -> std::result::Result<FetchResponse, FetchError> {
                cancel.cancel();
                run_cancellable(cancel, || {
                    std::thread::sleep(Duration::from_millis(300));
                    Err(FetchError::new(FetchErrorKind::Timeout, "slow"))
                })
            }
        }
        let target = Target::parse("https://example.com").unwrap();
        let started = std::time::Instant::now();
        let rep = analyze_with(
            &target,
            &CheckOptions::default(),
            &SlowCancelling,
            fixed_now(),
        )
        .unwrap();
        assert!(rep.files.is_empty());
        assert!(started.elapsed() < Duration::from_millis(250));
    }

    #[test]
    fn test_full_report_survives_json() {
        let dir = populated_site();
        let root = dir.path();
        fs::write(
            root.join("sitemap.xml"),
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/</loc><lastmod>2025-05-01</lastmod><changefreq>weekly</changefreq><priority>0.8</priority></url>
  <url><loc>/relative</loc><priority>1.5</priority></url>
</urlset>"#,
        )
        .unwrap();
        fs::write(
            root.join("llms-full.txt"),
            "# Example\n> Everything in one file.\n## Docs\n- [Guide](https://example.com/guide)\n",
        )
        .unwrap();
        fs::write(root.join("humans.txt"), "/* TEAM */\nDeveloper: Ada\n").unwrap();

        let rep = run_local(root, &CheckOptions::default());
        assert_eq!(rep.summary.found, 7);
        let sec = &rep.files[&FileKey::Security];
        assert!(sec.fields.is_some());
        assert!(sec.issues.iter().any(|i| i.context.days_until_expiry.is_some()));
        assert!(rep.files[&FileKey::Sitemap].stats.is_some());
        assert!(rep.files[&FileKey::LlmsFull].structure.is_some());
        assert!(rep.files[&FileKey::Ads]
            .issues
            .iter()
            .any(|i| i.context.line.is_some()));

        let back: AnalysisReport = serde_json::from_str(&to_json(&rep).unwrap()).unwrap();
        assert_eq!(back, rep);
    }

    #[test]
    fn test_file_set_order() {
        let opts = only(&[FileKey::Ads, FileKey::Sitemap]);
        assert_eq!(opts.file_set(), vec![FileKey::Sitemap, FileKey::Ads]);
        assert_eq!(CheckOptions::default().file_set().len(), 7);
    }
}
