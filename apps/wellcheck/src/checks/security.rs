//! security.txt checks per RFC 9116.
//!
//! Field names are case-insensitive. Unknown fields are kept in the report
//! but never flagged, since the RFC allows extensions.

use super::{split_field, CheckContext};
use crate::models::{Findings, Issue, PassedCheck, Severity};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value as Json};

/// Warn when expiry is closer than this.
pub const EXPIRY_WARNING_DAYS: i64 = 30;
/// RFC 9116 recommends an Expires less than a year ahead.
pub const EXPIRY_MAX_DAYS: i64 = 366;

const KNOWN_FIELDS: [&str; 9] = [
    "Acknowledgments",
    "Canonical",
    "Contact",
    "CSAF",
    "Encryption",
    "Expires",
    "Hiring",
    "Policy",
    "Preferred-Languages",
];

#[derive(Debug)]
struct Field {
    name: String,
    value: String,
    line: usize,
}

/// Strip an OpenPGP cleartext signature, returning the signed body.
fn unwrap_signed(text: &str) -> Option<String> {
    let mut lines = text.lines().map(str::trim_end);
    let first = lines.find(|l| !l.trim().is_empty())?;
    if first.trim() != "-----BEGIN PGP SIGNED MESSAGE-----" {
        return None;
    }
    // Armor headers (e.g. `Hash: SHA256`) end at the first blank line.
    for l in lines.by_ref() {
        if l.trim().is_empty() {
            break;
        }
    }
    let mut body = Vec::new();
    for l in lines {
        if l.starts_with("-----BEGIN PGP SIGNATURE-----") {
            break;
        }
        body.push(l.strip_prefix("- ").unwrap_or(l));
    }
    Some(body.join("\n"))
}

/// Parse an Expires value. RFC 3339 is the required form; a bare date or a
/// zone-less timestamp is read as UTC.
pub fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    let v = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ndt.and_utc());
    }
    NaiveDate::parse_from_str(v, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

fn canonical_name(name: &str) -> String {
    KNOWN_FIELDS
        .iter()
        .find(|k| k.eq_ignore_ascii_case(name))
        .map(|k| k.to_string())
        .unwrap_or_else(|| name.to_string())
}

pub fn check(text: &str, ctx: &CheckContext) -> Findings {
    let mut f = Findings::new();

    let signed_body = unwrap_signed(text);
    let body = signed_body.as_deref().unwrap_or(text);
    if signed_body.is_some() {
        f.passed("signature", "File is OpenPGP cleartext-signed");
    }

    let mut fields: Vec<Field> = Vec::new();
    for (i, raw) in body.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match split_field(line) {
            Some((name, value)) => fields.push(Field {
                name: canonical_name(name),
                value: value.to_string(),
                line: i + 1,
            }),
            None => f.push(
                Issue::new(
                    Severity::Important,
                    "invalid-line",
                    format!("Line {} is not a `Field: value` pair", i + 1),
                    "Use `Field: value` lines; start comments with #",
                )
                .with_line(i + 1)
                .with_value(line),
            ),
        }
    }
    let contacts = named(&fields, "Contact");
    if contacts.is_empty() {
        f.critical(
            "contact",
            "Missing required Contact field",
            "Add `Contact: mailto:security@example.com` (or an https:// or tel: URI)",
        );
    } else {
        f.pass(
            PassedCheck::new("contact", "Contact field present")
                .with_count(contacts.len() as u64, contacts.len() as u64),
        );
        for c in &contacts {
            let lower = c.value.to_ascii_lowercase();
            let ok = lower.starts_with("mailto:")
                || lower.starts_with("tel:")
                || lower.starts_with("https://");
            if !ok {
                f.push(
                    Issue::new(
                        Severity::Important,
                        "contact-scheme",
                        "Contact must be a mailto:, tel:, or https:// URI",
                        "Rewrite the value as a URI, e.g. `mailto:security@example.com`",
                    )
                    .with_line(c.line)
                    .with_value(c.value.clone()),
                );
            }
        }
    }

    let expires = named(&fields, "Expires");
    match expires.first() {
        None => f.critical(
            "expires",
            "Missing required Expires field",
            "Add `Expires:` with an ISO 8601 timestamp less than a year ahead, e.g. 2026-12-31T23:59:59Z",
        ),
        Some(e) => {
            if expires.len() > 1 {
                f.push(
                    Issue::new(
                        Severity::Important,
                        "expires-duplicate",
                        "Expires appears more than once",
                        "Keep a single Expires field",
                    )
                    .with_line(expires[1].line)
                    .with_count(expires.len() as u64, 1),
                );
            }
            check_expiry(&mut f, e, ctx.now);
        }
    }

    let canonical = named(&fields, "Canonical");
    if canonical.is_empty() {
        f.recommended(
            "canonical",
            "No Canonical field",
            "Add `Canonical: https://example.com/.well-known/security.txt`",
        );
    } else {
        f.passed("canonical", "Canonical field present");
        if ctx.source.https.is_some() && !canonical.iter().any(|c| c.value == ctx.source.label) {
            f.push(
                Issue::new(
                    Severity::Recommended,
                    "canonical-mismatch",
                    "None of the Canonical URIs match where the file was served",
                    "List the URL this file is served from as a Canonical value",
                )
                .with_url(ctx.source.label.clone()),
            );
        }
    }

    match ctx.source.https {
        Some(true) => f.passed("https", "Served over HTTPS"),
        Some(false) => f.push(
            Issue::new(
                Severity::Recommended,
                "https",
                "security.txt is served over plain HTTP",
                "Serve the file over HTTPS so it cannot be tampered with in transit",
            )
            .with_url(ctx.source.label.clone()),
        ),
        None => {}
    }

    if ctx.source.well_known {
        f.passed("location", "Served from /.well-known/security.txt");
    } else {
        f.push(
            Issue::new(
                Severity::Recommended,
                "location",
                "security.txt is only at the legacy site-root path",
                "Move it to /.well-known/security.txt (the root path may redirect there)",
            )
            .with_value(ctx.source.location.clone()),
        );
    }

    let mut map: Map<String, Json> = Map::new();
    for fl in &fields {
        let entry = map
            .entry(fl.name.clone())
            .or_insert_with(|| Json::Array(Vec::new()));
        if let Json::Array(items) = entry {
            items.push(Json::String(fl.value.clone()));
        }
    }
    f.stat("fields", fields.len() as u64);
    f.stat("signed", signed_body.is_some());
    f.fields = Some(map);
    f
}

fn named<'a>(fields: &'a [Field], name: &str) -> Vec<&'a Field> {
    fields.iter().filter(|fl| fl.name == name).collect()
}

fn check_expiry(f: &mut Findings, e: &Field, now: DateTime<Utc>) {
    let Some(at) = parse_expires(&e.value) else {
        f.push(
            Issue::new(
                Severity::Critical,
                "expires-format",
                "Expires is not a valid ISO 8601 timestamp",
                "Use RFC 3339 form, e.g. `Expires: 2026-12-31T23:59:59Z`",
            )
            .with_line(e.line)
            .with_value(e.value.clone()),
        );
        return;
    };
    let remaining = at - now;
    let days = remaining.num_days();
    if at <= now {
        f.push(
            Issue::new(
                Severity::Critical,
                "expired",
                "Expires is in the past: the file has expired, crawlers and researchers should disregard it",
                "Update Expires to a date less than a year in the future",
            )
            .with_line(e.line)
            .with_value(e.value.clone())
            .with_days_until_expiry(days),
        );
    } else if remaining < Duration::days(EXPIRY_WARNING_DAYS) {
        f.push(
            Issue::new(
                Severity::Important,
                "expiry-soon",
                format!("security.txt expires in {} day(s)", days),
                "Renew Expires before it lapses",
            )
            .with_line(e.line)
            .with_value(e.value.clone())
            .with_days_until_expiry(days),
        );
    } else if remaining > Duration::days(EXPIRY_MAX_DAYS) {
        f.push(
            Issue::new(
                Severity::Recommended,
                "expires-too-far",
                format!("Expires is {} days away; keep it under a year", days),
                "Set Expires less than a year ahead so stale contact data ages out",
            )
            .with_line(e.line)
            .with_days_until_expiry(days),
        );
    } else {
        f.pass(
            PassedCheck::new("expires", format!("Valid for {} more day(s)", days))
                .with_value(e.value.clone())
                .with_days_until_expiry(days),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::tests::{fixed_now, local_source, local_target};
    use crate::locate::{Source, Target};

    fn run_at(text: &str, source: &Source) -> Findings {
        let target = local_target();
        check(
            text,
            &CheckContext {
                target: &target,
                source,
                now: fixed_now(),
            },
        )
    }

    fn run(text: &str) -> Findings {
        run_at(text, &local_source(".well-known/security.txt"))
    }

    fn find<'a>(f: &'a Findings, check: &str) -> Option<&'a Issue> {
        f.issues.iter().find(|i| i.check == check)
    }

    #[test]
    fn test_expired_file_is_critical() {
        let f = run("Contact: mailto:a@b.com\nExpires: 2000-01-01T00:00:00.000Z");
        let crit: Vec<_> = f
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .collect();
        assert_eq!(crit.len(), 1);
        assert_eq!(crit[0].check, "expired");
        assert!(crit[0].message.contains("in the past"));
    }

    #[test]
    fn test_missing_required_fields() {
        let f = run("Canonical: https://e.com/.well-known/security.txt");
        assert_eq!(find(&f, "contact").unwrap().severity, Severity::Critical);
        assert_eq!(find(&f, "expires").unwrap().severity, Severity::Critical);
    }

    #[test]
    fn test_unparsable_expires_is_critical() {
        let f = run("Contact: mailto:a@b.com\nExpires: next tuesday");
        let is = find(&f, "expires-format").unwrap();
        assert_eq!(is.severity, Severity::Critical);
        assert_eq!(is.context.line, Some(2));
    }

    #[test]
    fn test_expiry_soon_reports_days() {
        let f = run("Contact: mailto:a@b.com\nExpires: 2025-06-11T12:00:00Z");
        let is = find(&f, "expiry-soon").unwrap();
        assert_eq!(is.severity, Severity::Important);
        assert_eq!(is.context.days_until_expiry, Some(10));
    }

    #[test]
    fn test_valid_file() {
        let f = run(
            "# comment\nContact: mailto:security@e.com\ncontact: https://e.com/report\nExpires: 2026-01-01T00:00:00Z\nCanonical: https://e.com/.well-known/security.txt\nPreferred-Languages: en, fr\nX-Custom: ignored\n",
        );
        assert!(f.issues.is_empty(), "{:?}", f.issues);
        let fields = f.fields.unwrap();
        assert_eq!(fields["Contact"].as_array().unwrap().len(), 2);
        assert_eq!(fields["X-Custom"][0], "ignored");
        assert!(f.passed.iter().any(|p| p.check == "expires"
            && p.context.days_until_expiry.is_some()));
    }

    #[test]
    fn test_recommendations_for_canonical_and_location() {
        let f = run_at(
            "Contact: mailto:a@b.com\nExpires: 2026-01-01T00:00:00Z",
            &local_source("security.txt"),
        );
        assert_eq!(find(&f, "canonical").unwrap().severity, Severity::Recommended);
        assert_eq!(find(&f, "location").unwrap().severity, Severity::Recommended);
        assert!(find(&f, "https").is_none());
    }

    #[test]
    fn test_plain_http_source_is_recommended() {
        let source = Source {
            label: "http://e.com/.well-known/security.txt".into(),
            location: ".well-known/security.txt".into(),
            well_known: true,
            https: Some(false),
        };
        let target = Target::parse("http://e.com").unwrap();
        let f = check(
            "Contact: mailto:a@b.com\nExpires: 2026-01-01T00:00:00Z\nCanonical: http://e.com/.well-known/security.txt",
            &CheckContext {
                target: &target,
                source: &source,
                now: fixed_now(),
            },
        );
        assert_eq!(find(&f, "https").unwrap().severity, Severity::Recommended);
        assert!(find(&f, "canonical-mismatch").is_none());
    }

    #[test]
    fn test_signed_file_is_unwrapped() {
        let text = "-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA256\n\nContact: mailto:a@b.com\nExpires: 2026-01-01T00:00:00Z\nCanonical: https://e.com/.well-known/security.txt\n-----BEGIN PGP SIGNATURE-----\n\niQIzBAEBCAAdFiEE\n-----END PGP SIGNATURE-----\n";
        let f = run(text);
        assert!(f.issues.is_empty(), "{:?}", f.issues);
        assert!(f.passed.iter().any(|p| p.check == "signature"));
    }

    #[test]
    fn test_bad_contact_scheme_and_duplicates() {
        let f = run(
            "Contact: security@e.com\nExpires: 2026-01-01T00:00:00Z\nExpires: 2026-02-01T00:00:00Z\nCanonical: https://e.com/x",
        );
        assert_eq!(
            find(&f, "contact-scheme").unwrap().severity,
            Severity::Important
        );
        assert_eq!(
            find(&f, "expires-duplicate").unwrap().severity,
            Severity::Important
        );
    }

    #[test]
    fn test_far_future_expiry_is_recommended() {
        let f = run("Contact: mailto:a@b.com\nExpires: 2030-01-01T00:00:00Z\nCanonical: https://e.com/x");
        assert_eq!(
            find(&f, "expires-too-far").unwrap().severity,
            Severity::Recommended
        );
    }

    #[test]
    fn test_parse_expires_forms() {
        assert!(parse_expires("2026-01-01T00:00:00+02:00").is_some());
        assert!(parse_expires("2026-01-01").is_some());
        assert!(parse_expires("2026-01-01T10:00:00").is_some());
        assert!(parse_expires("01/01/2026").is_none());
    }
}
