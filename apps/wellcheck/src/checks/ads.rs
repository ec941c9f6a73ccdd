//! ads.txt checks per the IAB Tech Lab specification.
//!
//! Record lines are `<domain>, <publisher-id>, <relationship>[, <cert-id>]`.
//! `name=value` variable lines (contact, subdomain, ...) are also valid.

use super::content_lines;
use crate::models::{Findings, Issue, PassedCheck, Severity};

const VARIABLES: [&str; 5] = [
    "contact",
    "subdomain",
    "inventorypartnerdomain",
    "ownerdomain",
    "managerdomain",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relationship {
    Direct,
    Reseller,
}

/// Why a record line was rejected, or the relationship it declares.
fn parse_record(line: &str) -> Result<Relationship, String> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 3 || parts.len() > 4 {
        return Err(format!(
            "expected 3 or 4 comma-separated fields, found {}",
            parts.len()
        ));
    }
    let domain = parts[0];
    if domain.is_empty() || !domain.contains('.') || domain.contains(char::is_whitespace) {
        return Err(format!("'{}' is not a valid ad system domain", domain));
    }
    if parts[1].is_empty() {
        return Err("publisher account ID is empty".into());
    }
    match parts[2].to_ascii_uppercase().as_str() {
        "DIRECT" => Ok(Relationship::Direct),
        "RESELLER" => Ok(Relationship::Reseller),
        other => Err(format!(
            "relationship '{}' must be DIRECT or RESELLER",
            other
        )),
    }
}

fn is_variable(line: &str) -> bool {
    match line.split_once('=') {
        Some((name, value)) => {
            let n = name.trim().to_ascii_lowercase();
            VARIABLES.contains(&n.as_str()) && !value.trim().is_empty()
        }
        None => false,
    }
}

pub fn check(text: &str) -> Findings {
    let mut f = Findings::new();
    let mut records = 0u64;
    let mut direct = 0u64;
    let mut reseller = 0u64;
    let mut variables = 0u64;
    let mut malformed = 0u64;

    for (line_no, line) in content_lines(text) {
        if is_variable(line) {
            variables += 1;
            continue;
        }
        match parse_record(line) {
            Ok(rel) => {
                records += 1;
                match rel {
                    Relationship::Direct => direct += 1,
                    Relationship::Reseller => reseller += 1,
                }
            }
            Err(why) => {
                malformed += 1;
                f.push(
                    Issue::new(
                        Severity::Important,
                        "record-format",
                        format!("Line {}: {}", line_no, why),
                        "Use `domain, publisher-id, DIRECT|RESELLER[, cert-authority-id]`",
                    )
                    .with_line(line_no)
                    .with_value(line),
                );
            }
        }
    }

    if records == 0 && malformed == 0 {
        f.recommended(
            "records",
            "ads.txt lists no authorized sellers",
            "Add one line per authorized seller, e.g. `google.com, pub-0000000000000000, DIRECT, f08c47fec0942fa0`",
        );
    } else if records > 0 {
        f.pass(
            PassedCheck::new("records", format!("{} seller record(s)", records))
                .with_count(records, records + malformed),
        );
    }
    if malformed == 0 && records > 0 {
        f.passed("record-format", "All records are well-formed");
    }

    f.stat("records", records);
    f.stat("direct", direct);
    f.stat("reseller", reseller);
    f.stat("variables", variables);
    f.stat("malformed", malformed);
    f
}
