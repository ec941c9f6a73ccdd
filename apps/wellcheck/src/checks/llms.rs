//! llms.txt and llms-full.txt structure checks.
//!
//! Expected shape: an H1 title on the first non-blank line, a `>` summary
//! right after it, then `## ` sections holding markdown links. Lines inside
//! fenced code blocks are not treated as structure.

use crate::models::{Findings, Issue, PassedCheck, Severity};
use regex::Regex;
use serde_json::{json, Map, Value as Json};
use std::sync::OnceLock;

/// Context budget for llms-full.txt, in estimated tokens.
pub const MAX_ESTIMATED_TOKENS: u64 = 100_000;

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]*\]\([^)\s]+[^)]*\)").expect("static regex"))
}

/// Rough token estimate: one token per four characters. Not tied to any
/// particular tokenizer.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / 4) as u64
}

#[derive(Debug, Default)]
struct Outline {
    title: Option<(usize, String)>,
    first_line: Option<(usize, String)>,
    extra_titles: Vec<usize>,
    summary: Option<String>,
    sections: Vec<String>,
    links: usize,
}

fn outline(text: &str) -> Outline {
    let mut out = Outline::default();
    let mut in_fence = false;
    let mut after_title = false;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim_end();
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            after_title = false;
            continue;
        }
        if in_fence {
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }

        if out.first_line.is_none() {
            out.first_line = Some((line_no, trimmed.to_string()));
            if let Some(t) = h1_text(line) {
                out.title = Some((line_no, t.to_string()));
                after_title = true;
                continue;
            }
        } else if h1_text(line).is_some() {
            out.extra_titles.push(line_no);
        }

        if after_title {
            if let Some(q) = trimmed.strip_prefix('>') {
                out.summary = Some(q.trim().to_string());
            }
            after_title = false;
        }

        if let Some(s) = line.strip_prefix("## ") {
            out.sections.push(s.trim().to_string());
        }
        out.links += link_re().find_iter(line).count();
    }
    out
}

fn h1_text(line: &str) -> Option<&str> {
    let t = line.strip_prefix("# ")?.trim();
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}

/// Check llms.txt, or llms-full.txt when `full` is set.
pub fn check(text: &str, full: bool) -> Findings {
    let mut f = Findings::new();
    let name = if full { "llms-full.txt" } else { "llms.txt" };
    let o = outline(text);

    match (&o.title, &o.first_line) {
        (Some((_, t)), _) => f.pass(
            PassedCheck::new("title", "File starts with a `# ` title").with_value(t.clone()),
        ),
        (None, Some((line, first))) => f.push(
            Issue::new(
                Severity::Critical,
                "title",
                format!("{} does not start with a `# ` title", name),
                "Make the first line a single H1 with the project name, e.g. `# Example`",
            )
            .with_line(*line)
            .with_value(first.clone()),
        ),
        (None, None) => f.critical(
            "title",
            format!("{} is empty", name),
            "Start the file with `# Project name`, a `> summary`, and `## ` sections of links",
        ),
    }

    if let Some(line) = o.extra_titles.first() {
        f.push(
            Issue::new(
                Severity::Important,
                "single-title",
                format!("{} has {} top-level `# ` headings", name, o.extra_titles.len() + 1),
                "Keep exactly one H1 and use `## ` for sections",
            )
            .with_line(*line)
            .with_count(o.extra_titles.len() as u64 + 1, 1),
        );
    } else if o.title.is_some() {
        f.passed("single-title", "Exactly one top-level heading");
    }

    if o.title.is_some() {
        if o.summary.is_some() {
            f.passed("summary-blockquote", "Title is followed by a `>` summary");
        } else {
            f.recommended(
                "summary-blockquote",
                "No `>` blockquote summary after the title",
                "Add a one-line summary right after the title, e.g. `> Short description`",
            );
        }
    }

    if o.sections.is_empty() {
        f.recommended(
            "sections",
            "No `## ` sections found",
            "Group links under `## ` headings such as `## Docs`",
        );
    } else {
        f.pass(
            PassedCheck::new("sections", format!("{} `## ` section(s)", o.sections.len()))
                .with_count(o.sections.len() as u64, o.sections.len() as u64),
        );
    }

    if o.links == 0 {
        f.recommended(
            "links",
            "No markdown links found; the file offers no navigable content",
            "List key pages as `- [Title](https://example.com/page): notes`",
        );
    } else {
        f.pass(
            PassedCheck::new("links", format!("{} markdown link(s)", o.links))
                .with_count(o.links as u64, o.links as u64),
        );
    }

    let mut structure: Map<String, Json> = Map::new();
    structure.insert("title".into(), json!(o.title.as_ref().map(|(_, t)| t)));
    structure.insert("hasSummary".into(), json!(o.summary.is_some()));
    structure.insert("summary".into(), json!(o.summary));
    structure.insert("sections".into(), json!(o.sections));
    structure.insert("linkCount".into(), json!(o.links));

    if full {
        let tokens = estimate_tokens(text);
        structure.insert("estimatedTokens".into(), json!(tokens));
        if tokens > MAX_ESTIMATED_TOKENS {
            f.push(
                Issue::new(
                    Severity::Important,
                    "token-budget",
                    format!(
                        "Estimated {} tokens exceeds the ~100,000 token context budget",
                        tokens
                    ),
                    "Trim llms-full.txt or move detail into linked pages",
                )
                .with_limit(tokens, MAX_ESTIMATED_TOKENS),
            );
        } else {
            f.passed(
                "token-budget",
                format!("Estimated {} tokens, within the context budget", tokens),
            );
        }
    }

    f.stat("lines", text.lines().count() as u64);
    f.stat("sizeBytes", text.len() as u64);
    f.structure = Some(structure);
    f
}
