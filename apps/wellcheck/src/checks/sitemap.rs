//! sitemap.xml checks per the sitemaps.org protocol.
//!
//! Accepts a `<urlset>` or a `<sitemapindex>` root. Per-entry problems are
//! folded into one issue per rule with `count`/`total`, so a large sitemap
//! yields a readable report instead of thousands of lines.

use super::CheckContext;
use crate::error::CheckError;
use crate::locate::Target;
use crate::models::{Findings, Issue, PassedCheck, Severity};
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

pub const MAX_URLS: u64 = 50_000;
pub const MAX_BYTES: u64 = 50 * 1024 * 1024;
const MAX_LOC_CHARS: usize = 2_048;
const CHANGEFREQS: [&str; 7] = [
    "always", "hourly", "daily", "weekly", "monthly", "yearly", "never",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    UrlSet,
    Index,
}

#[derive(Debug, Default)]
struct Entry {
    loc: Option<String>,
    lastmod: Option<String>,
    changefreq: Option<String>,
    priority: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Tag {
    Lastmod,
    Changefreq,
    Priority,
}

impl Tag {
    fn name(self) -> &'static str {
        match self {
            Tag::Lastmod => "lastmod",
            Tag::Changefreq => "changefreq",
            Tag::Priority => "priority",
        }
    }

    fn get(self, e: &Entry) -> Option<&str> {
        match self {
            Tag::Lastmod => e.lastmod.as_deref(),
            Tag::Changefreq => e.changefreq.as_deref(),
            Tag::Priority => e.priority.as_deref(),
        }
    }

    fn fix(self) -> &'static str {
        match self {
            Tag::Lastmod => {
                "Add <lastmod> with the last modification date (W3C Datetime, e.g. 2025-01-31)"
            }
            Tag::Changefreq => {
                "Add <changefreq> (always, hourly, daily, weekly, monthly, yearly, never)"
            }
            Tag::Priority => "Add <priority> between 0.0 and 1.0 to signal relative importance",
        }
    }
}

struct Parsed {
    root: String,
    entries: Vec<Entry>,
}

fn w3c_datetime() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\d{4}(-\d{2}(-\d{2}(T\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:\d{2}))?)?)?$",
        )
        .expect("static regex")
    })
}

/// Stream the document and collect entries under the root.
fn parse(text: &str) -> Result<Parsed, CheckError> {
    let mut reader = XmlReader::from_str(text);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut root: Option<String> = None;
    let mut entries: Vec<Entry> = Vec::new();
    let mut current: Option<Entry> = None;
    let mut field_text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if root.is_none() {
                    root = Some(name.clone());
                } else if stack.is_empty() {
                    return Err(CheckError::Xml("multiple root elements".into()));
                }
                if stack.len() == 1 && (name == "url" || name == "sitemap") {
                    current = Some(Entry::default());
                }
                field_text.clear();
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if root.is_none() {
                    root = Some(name);
                    continue;
                }
                if stack.is_empty() {
                    return Err(CheckError::Xml("multiple root elements".into()));
                }
                if stack.len() == 1 && (name == "url" || name == "sitemap") {
                    entries.push(Entry::default());
                } else if stack.len() == 2 {
                    if let Some(cur) = current.as_mut() {
                        set_field(cur, &name, String::new());
                    }
                }
            }
            Event::Text(e) => {
                let t = e.unescape()?;
                field_text.push_str(t.as_ref());
            }
            Event::CData(e) => {
                let raw = e.into_inner();
                field_text.push_str(&String::from_utf8_lossy(raw.as_ref()));
            }
            Event::End(_) => {
                let name = stack
                    .pop()
                    .ok_or_else(|| CheckError::Xml("unexpected closing tag".into()))?;
                if stack.len() == 2 {
                    if let Some(cur) = current.as_mut() {
                        set_field(cur, &name, field_text.trim().to_string());
                    }
                } else if stack.len() == 1 && (name == "url" || name == "sitemap") {
                    if let Some(cur) = current.take() {
                        entries.push(cur);
                    }
                }
                field_text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(CheckError::Xml(format!(
            "unexpected end of document inside <{}>",
            open
        )));
    }
    let root = root.ok_or_else(|| CheckError::Xml("document has no root element".into()))?;
    Ok(Parsed { root, entries })
}

fn set_field(entry: &mut Entry, name: &str, value: String) {
    match name {
        "loc" => entry.loc = Some(value),
        "lastmod" => entry.lastmod = Some(value),
        "changefreq" => entry.changefreq = Some(value),
        "priority" => entry.priority = Some(value),
        _ => {}
    }
}

/// Run all sitemap rules over `text`.
pub fn check(text: &str, ctx: &CheckContext) -> Result<Findings, CheckError> {
    let mut f = Findings::new();
    let size = text.len() as u64;
    f.stat("sizeBytes", size);

    if size > MAX_BYTES {
        f.push(
            Issue::new(
                Severity::Important,
                "file-size",
                format!("Sitemap is {} bytes, over the 50 MB uncompressed limit", size),
                "Split the sitemap into several files referenced from a sitemap index",
            )
            .with_size(size, MAX_BYTES),
        );
    } else {
        f.passed("file-size", "Sitemap is within the 50 MB uncompressed limit");
    }

    let parsed = parse(text)?;
    let kind = match parsed.root.as_str() {
        "urlset" => Kind::UrlSet,
        "sitemapindex" => Kind::Index,
        other => {
            f.push(
                Issue::new(
                    Severity::Critical,
                    "root-element",
                    format!("Root element is <{}>, expected <urlset>", other),
                    "Wrap entries in <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">",
                )
                .with_value(other),
            );
            return Ok(f);
        }
    };
    f.stat(
        "kind",
        match kind {
            Kind::UrlSet => "urlset",
            Kind::Index => "sitemapindex",
        },
    );
    f.passed("root-element", format!("Root element is <{}>", parsed.root));

    let entries = &parsed.entries;
    let total = entries.len() as u64;
    let entry_tag = match kind {
        Kind::UrlSet => "url",
        Kind::Index => "sitemap",
    };
    let locs: Vec<&str> = entries.iter().filter_map(|e| e.loc.as_deref()).collect();
    f.stat("urlCount", total);

    if locs.iter().all(|l| l.is_empty()) {
        f.critical(
            "no-urls",
            format!("Sitemap has no <{}> entries with a <loc>", entry_tag),
            format!("Add at least one <{0}><loc>...</loc></{0}> entry", entry_tag),
        );
    } else {
        f.pass(
            PassedCheck::new("has-urls", format!("Sitemap lists {} entries", total))
                .with_count(locs.len() as u64, total),
        );
    }

    let missing_loc = entries
        .iter()
        .filter(|e| e.loc.as_deref().map_or(true, str::is_empty))
        .count() as u64;
    if missing_loc > 0 && missing_loc < total {
        f.push(
            Issue::new(
                Severity::Important,
                "missing-loc",
                format!("{} <{}> entries have no <loc>", missing_loc, entry_tag),
                "Give every entry a <loc> with its absolute URL, or remove it",
            )
            .with_count(missing_loc, total),
        );
    }

    if total > MAX_URLS {
        f.push(
            Issue::new(
                Severity::Important,
                "url-count",
                format!("Sitemap has {} entries, over the 50,000 limit", total),
                "Split the URLs across several sitemaps and list them in a sitemap index",
            )
            .with_limit(total, MAX_URLS),
        );
    } else {
        f.passed("url-count", "Entry count is within the 50,000 limit");
    }

    check_locs(&mut f, &locs, ctx.target);
    check_optional_tags(&mut f, entries, kind);
    Ok(f)
}

fn check_locs(f: &mut Findings, locs: &[&str], target: &Target) {
    let total = locs.len() as u64;
    let origin = match target {
        Target::Remote(base) => Some(base.origin()),
        Target::Local(_) => None,
    };

    let mut not_absolute: Vec<&str> = Vec::new();
    let mut cross_origin: Vec<&str> = Vec::new();
    let mut too_long: Vec<&str> = Vec::new();
    let mut duplicates: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for loc in locs.iter().copied().filter(|l| !l.is_empty()) {
        if !seen.insert(loc) {
            duplicates.push(loc);
        }
        if loc.chars().count() > MAX_LOC_CHARS {
            too_long.push(loc);
        }
        match Url::parse(loc) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {
                if let Some(o) = origin.as_ref() {
                    if &u.origin() != o {
                        cross_origin.push(loc);
                    }
                }
            }
            _ => not_absolute.push(loc),
        }
    }

    if not_absolute.is_empty() {
        f.passed("loc-absolute", "All <loc> values are absolute URLs");
    } else {
        f.push(
            Issue::new(
                Severity::Recommended,
                "loc-absolute",
                format!("{} <loc> values are not absolute http(s) URLs", not_absolute.len()),
                "Use fully-qualified URLs including scheme and host, e.g. https://example.com/page",
            )
            .with_count(not_absolute.len() as u64, total)
            .with_value(not_absolute[0]),
        );
    }

    if origin.is_some() {
        if cross_origin.is_empty() {
            f.passed("loc-same-origin", "All <loc> URLs share the site's origin");
        } else {
            f.push(
                Issue::new(
                    Severity::Recommended,
                    "loc-same-origin",
                    format!(
                        "{} <loc> URLs point to a different origin than the site",
                        cross_origin.len()
                    ),
                    "List only URLs on the same scheme and host as the sitemap",
                )
                .with_count(cross_origin.len() as u64, total)
                .with_url(cross_origin[0]),
            );
        }
    }

    if !too_long.is_empty() {
        f.push(
            Issue::new(
                Severity::Recommended,
                "loc-length",
                format!("{} <loc> values exceed 2,048 characters", too_long.len()),
                "Shorten these URLs; search engines may ignore them",
            )
            .with_count(too_long.len() as u64, total),
        );
    }

    if !duplicates.is_empty() {
        f.push(
            Issue::new(
                Severity::Recommended,
                "duplicate-loc",
                format!("{} <loc> values appear more than once", duplicates.len()),
                "List each URL only once",
            )
            .with_count(duplicates.len() as u64, total)
            .with_value(duplicates[0]),
        );
    }
}

fn check_optional_tags(f: &mut Findings, entries: &[Entry], kind: Kind) {
    let total = entries.len() as u64;
    if total == 0 {
        return;
    }

    let mut tags = vec![Tag::Lastmod];
    if kind == Kind::UrlSet {
        tags.push(Tag::Changefreq);
        tags.push(Tag::Priority);
    }
    for tag in tags {
        let n = entries.iter().filter(|e| tag.get(e).is_none()).count() as u64;
        let check = format!("missing-{}", tag.name());
        if n > 0 {
            f.push(
                Issue::new(
                    Severity::Recommended,
                    check,
                    format!("{} of {} entries have no <{}>", n, total, tag.name()),
                    tag.fix(),
                )
                .with_count(n, total),
            );
        } else {
            f.passed(&check, format!("All entries have <{}>", tag.name()));
        }
    }

    let bad_lastmod: Vec<&str> = entries
        .iter()
        .filter_map(|e| e.lastmod.as_deref())
        .filter(|v| !w3c_datetime().is_match(v))
        .collect();
    if !bad_lastmod.is_empty() {
        f.push(
            Issue::new(
                Severity::Recommended,
                "lastmod-format",
                format!("{} <lastmod> values are not W3C Datetime", bad_lastmod.len()),
                "Use YYYY-MM-DD or a full timestamp such as 2025-01-31T10:00:00+00:00",
            )
            .with_count(bad_lastmod.len() as u64, total)
            .with_value(bad_lastmod[0]),
        );
    }

    if kind == Kind::Index {
        return;
    }

    let bad_freq: Vec<&str> = entries
        .iter()
        .filter_map(|e| e.changefreq.as_deref())
        .filter(|v| !CHANGEFREQS.contains(&v.to_ascii_lowercase().as_str()))
        .collect();
    if !bad_freq.is_empty() {
        f.push(
            Issue::new(
                Severity::Important,
                "changefreq-value",
                format!("{} <changefreq> values are not recognised", bad_freq.len()),
                "Use one of: always, hourly, daily, weekly, monthly, yearly, never",
            )
            .with_count(bad_freq.len() as u64, total)
            .with_value(bad_freq[0]),
        );
    }

    let bad_priority: Vec<&str> = entries
        .iter()
        .filter_map(|e| e.priority.as_deref())
        .filter(|v| !matches!(v.parse::<f64>(), Ok(p) if (0.0..=1.0).contains(&p)))
        .collect();
    if !bad_priority.is_empty() {
        f.push(
            Issue::new(
                Severity::Important,
                "priority-range",
                format!(
                    "{} <priority> values are outside 0.0-1.0",
                    bad_priority.len()
                ),
                "Set <priority> to a decimal between 0.0 and 1.0",
            )
            .with_count(bad_priority.len() as u64, total)
            .with_value(bad_priority[0]),
        );
    }
}
