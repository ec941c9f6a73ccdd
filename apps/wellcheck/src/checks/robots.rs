//! robots.txt checks per RFC 9309.
//!
//! Directive names are case-insensitive. A group is one or more
//! consecutive `User-agent` lines followed by its rules; a `User-agent`
//! after a rule starts the next group.

use super::{content_lines, split_field, CheckContext};
use crate::models::{Findings, Issue, PassedCheck, Severity};
use url::Url;

/// RFC 9309 requires crawlers to parse at least this much.
pub const MAX_BYTES: u64 = 500 * 1024;

#[derive(Debug, Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

#[derive(Debug)]
struct Rule {
    allow: bool,
    path: String,
    line: usize,
}

pub fn check(text: &str, _ctx: &CheckContext) -> Findings {
    let mut f = Findings::new();
    let size = text.len() as u64;

    let mut groups: Vec<Group> = Vec::new();
    let mut in_agent_run = false;
    let mut sitemaps: Vec<String> = Vec::new();
    let mut stray = 0usize;
    let mut unknown = 0usize;

    for (line_no, line) in content_lines(text) {
        let Some((name, value)) = split_field(line) else {
            f.push(
                Issue::new(
                    Severity::Important,
                    "invalid-line",
                    format!("Line {} is not a `Directive: value` pair", line_no),
                    "Use the form `Directive: value`, or prefix the line with # to comment it out",
                )
                .with_line(line_no)
                .with_value(line),
            );
            continue;
        };
        match name.to_ascii_lowercase().as_str() {
            "user-agent" => {
                if !in_agent_run {
                    groups.push(Group::default());
                    in_agent_run = true;
                }
                if let Some(g) = groups.last_mut() {
                    g.agents.push(value.to_string());
                }
            }
            d @ ("disallow" | "allow") => {
                in_agent_run = false;
                match groups.last_mut() {
                    Some(g) => g.rules.push(Rule {
                        allow: d == "allow",
                        path: value.to_string(),
                        line: line_no,
                    }),
                    None => {
                        stray += 1;
                        f.push(
                            Issue::new(
                                Severity::Critical,
                                "directive-before-user-agent",
                                format!("{} directive before any User-agent line", name),
                                "Move the rule below a `User-agent:` line (e.g. `User-agent: *`)",
                            )
                            .with_line(line_no)
                            .with_value(line),
                        );
                    }
                }
            }
            "sitemap" => {
                if !is_absolute_http(value) {
                    f.push(
                        Issue::new(
                            Severity::Important,
                            "sitemap-url",
                            "Sitemap directive is not an absolute URL",
                            "Use a fully-qualified URL, e.g. `Sitemap: https://example.com/sitemap.xml`",
                        )
                        .with_line(line_no)
                        .with_value(value),
                    );
                }
                sitemaps.push(value.to_string());
            }
            "crawl-delay" => {
                in_agent_run = false;
                if !matches!(value.parse::<f64>(), Ok(d) if d >= 0.0 && d.is_finite()) {
                    f.push(
                        Issue::new(
                            Severity::Recommended,
                            "crawl-delay-value",
                            "Crawl-delay is not a non-negative number",
                            "Set Crawl-delay to a number of seconds, e.g. `Crawl-delay: 10`",
                        )
                        .with_line(line_no)
                        .with_value(value),
                    );
                }
            }
            _ => {
                // Extension directives are allowed; they do not end an agent run.
                unknown += 1;
            }
        }
    }

    if size > MAX_BYTES {
        f.push(
            Issue::new(
                Severity::Important,
                "file-size",
                format!("robots.txt is {} bytes; crawlers may ignore content past 500 KiB", size),
                "Consolidate rules so the file stays under 500 KiB",
            )
            .with_size(size, MAX_BYTES),
        );
    } else {
        f.passed("file-size", "robots.txt is within the 500 KiB parse limit");
    }

    if stray == 0 {
        f.passed(
            "directive-before-user-agent",
            "Every Allow/Disallow rule belongs to a User-agent group",
        );
    }

    if groups.is_empty() {
        f.recommended(
            "no-user-agent",
            "robots.txt declares no User-agent group",
            "Add at least `User-agent: *` followed by your Allow/Disallow rules",
        );
    } else {
        f.pass(
            PassedCheck::new(
                "user-agent-groups",
                format!("robots.txt declares {} User-agent group(s)", groups.len()),
            )
            .with_count(groups.len() as u64, groups.len() as u64),
        );
    }

    if sitemaps.is_empty() {
        f.recommended(
            "sitemap-directive",
            "No Sitemap directive found",
            "Add `Sitemap: https://your-site/sitemap.xml` so crawlers can discover it",
        );
    } else {
        f.passed(
            "sitemap-directive",
            format!("{} Sitemap directive(s) present", sitemaps.len()),
        );
    }

    let block_all = groups
        .iter()
        .filter(|g| g.agents.iter().any(|a| a == "*"))
        .flat_map(|g| g.rules.iter())
        .find(|r| !r.allow && r.path == "/");
    match block_all {
        Some(rule) => f.push(
            Issue::new(
                Severity::Important,
                "blocks-all-crawlers",
                "`Disallow: /` under `User-agent: *` blocks all crawling",
                "Remove it unless the site is intentionally hidden (e.g. a staging environment)",
            )
            .with_line(rule.line)
            .with_value("Disallow: /"),
        ),
        None => f.passed(
            "blocks-all-crawlers",
            "The wildcard group does not block the whole site",
        ),
    }

    let rules: Vec<&Rule> = groups.iter().flat_map(|g| g.rules.iter()).collect();
    f.stat("groups", groups.len() as u64);
    f.stat(
        "userAgents",
        groups.iter().map(|g| g.agents.len()).sum::<usize>() as u64,
    );
    f.stat(
        "disallowRules",
        rules.iter().filter(|r| !r.allow).count() as u64,
    );
    f.stat("allowRules", rules.iter().filter(|r| r.allow).count() as u64);
    f.stat("sitemaps", sitemaps.len() as u64);
    f.stat("otherDirectives", unknown as u64);
    f
}

fn is_absolute_http(value: &str) -> bool {
    matches!(Url::parse(value), Ok(u) if u.scheme() == "http" || u.scheme() == "https")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::tests::{fixed_now, local_source, local_target};

    fn run(text: &str) -> Findings {
        let target = local_target();
        let source = local_source("robots.txt");
        check(
            text,
            &CheckContext {
                target: &target,
                source: &source,
                now: fixed_now(),
            },
        )
    }

    #[test]
    fn test_orphan_directive_is_critical() {
        let f = run("Disallow: /admin\nUser-agent: *");
        let is = f
            .issues
            .iter()
            .find(|i| i.check == "directive-before-user-agent")
            .unwrap();
        assert_eq!(is.severity, Severity::Critical);
        assert_eq!(is.context.line, Some(1));
        assert!(is.message.contains("directive before any User-agent"));
    }

    #[test]
    fn test_clean_file() {
        let f = run(
            "# hi\nUser-agent: *\nDisallow: /private\nAllow: /\n\nSitemap: https://example.com/sitemap.xml\n",
        );
        assert!(f.issues.is_empty(), "{:?}", f.issues);
        let stats = f.stats.unwrap();
        assert_eq!(stats["groups"], 1);
        assert_eq!(stats["disallowRules"], 1);
        assert_eq!(stats["allowRules"], 1);
    }

    #[test]
    fn test_case_insensitive_directive_names() {
        let f = run("USER-AGENT: *\ndisallow: /tmp\nsitemap: https://e.com/s.xml");
        assert!(f.issues.is_empty(), "{:?}", f.issues);
    }

    #[test]
    fn test_missing_sitemap_is_recommended() {
        let f = run("User-agent: *\nDisallow:");
        let is = f.issues.iter().find(|i| i.check == "sitemap-directive").unwrap();
        assert_eq!(is.severity, Severity::Recommended);
    }

    #[test]
    fn test_disallow_all_under_wildcard_is_important() {
        let f = run("User-agent: googlebot\nDisallow:\n\nUser-agent: *\nDisallow: /\nSitemap: https://e.com/s.xml");
        let is = f
            .issues
            .iter()
            .find(|i| i.check == "blocks-all-crawlers")
            .unwrap();
        assert_eq!(is.severity, Severity::Important);
        assert_eq!(is.context.line, Some(5));
        assert!(!f.has_critical());
    }

    #[test]
    fn test_disallow_all_for_named_agent_is_fine() {
        let f = run("User-agent: BadBot\nDisallow: /\nSitemap: https://e.com/s.xml");
        assert!(!f.issues.iter().any(|i| i.check == "blocks-all-crawlers"));
    }

    #[test]
    fn test_grouping_multiple_agents() {
        let f = run("User-agent: a\nUser-agent: *\nDisallow: /\nUser-agent: b\nAllow: /x");
        let stats = f.stats.as_ref().unwrap();
        assert_eq!(stats["groups"], 2);
        assert_eq!(stats["userAgents"], 3);
        assert!(f.issues.iter().any(|i| i.check == "blocks-all-crawlers"));
    }

    #[test]
    fn test_invalid_lines_and_values() {
        let f = run("User-agent: *\nthis is junk\nCrawl-delay: soon\nSitemap: /sitemap.xml");
        assert!(f
            .issues
            .iter()
            .any(|i| i.check == "invalid-line" && i.context.line == Some(2)));
        assert!(f
            .issues
            .iter()
            .any(|i| i.check == "crawl-delay-value" && i.severity == Severity::Recommended));
        assert!(f
            .issues
            .iter()
            .any(|i| i.check == "sitemap-url" && i.severity == Severity::Important));
    }

    #[test]
    fn test_empty_file_has_no_groups() {
        let f = run("");
        assert!(f.issues.iter().any(|i| i.check == "no-user-agent"));
        assert!(!f.has_critical());
    }
}
