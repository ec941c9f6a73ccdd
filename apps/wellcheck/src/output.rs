//! Output rendering for analysis reports.
//!
//! Supports `human` (default) and `json` outputs. Rendering is pure: the
//! text form is built by `to_text` and only `print_report` touches stdout.

use crate::models::{AnalysisReport, FileReport, Issue, Severity};
use owo_colors::OwoColorize;
use std::fmt::Write as _;

fn use_colors(output: &str) -> bool {
    output != "json" && std::env::var_os("NO_COLOR").is_none()
}

/// Print `report` in the requested format.
pub fn print_report(report: &AnalysisReport, output: &str) -> serde_json::Result<()> {
    match output {
        "json" => println!("{}", to_json(report)?),
        _ => print!("{}", render_text(report, use_colors(output))),
    }
    Ok(())
}

/// The report verbatim as pretty-printed JSON.
pub fn to_json(report: &AnalysisReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// Grouped plain-text report: files with issues first, issues ordered
/// critical, important, recommended.
pub fn to_text(report: &AnalysisReport) -> String {
    render_text(report, false)
}

fn render_text(report: &AnalysisReport, color: bool) -> String {
    let mut out = String::new();
    let title = format!("# Well-known files: {}", report.target);
    let _ = writeln!(out, "{}", paint_bold(&title, color));
    let _ = writeln!(out, "Checked at {}", report.timestamp);

    let mut files: Vec<&FileReport> = report.files.values().collect();
    // Stable: ties keep the fixed key order.
    files.sort_by_key(|f| f.issues.is_empty());

    for f in files {
        out.push('\n');
        render_file(&mut out, f, color);
    }

    let s = &report.summary;
    let line = format!(
        "— Summary — files={} found={} valid={} critical={} important={} recommended={} passed={}",
        s.total_files,
        s.found,
        s.valid,
        s.issues.critical,
        s.issues.important,
        s.issues.recommended,
        s.passed
    );
    out.push('\n');
    let _ = writeln!(out, "{}", paint_bold(&line, color));
    out
}

fn render_file(out: &mut String, f: &FileReport, color: bool) {
    let heading = format!("## {}", f.file.file_name());
    let _ = writeln!(out, "{}", paint_bold(&heading, color));
    let _ = writeln!(out, "Source: {}", f.source);
    let _ = writeln!(out, "Status: {}", status_line(f, color));

    if f.issues.is_empty() {
        let ok = format!("✔ all {} check(s) passed", f.summary.passed);
        if color {
            let _ = writeln!(out, "{}", ok.green());
        } else {
            let _ = writeln!(out, "{}", ok);
        }
        return;
    }

    let mut issues: Vec<&Issue> = f.issues.iter().collect();
    issues.sort_by_key(|i| i.severity);
    for is in issues {
        let mut msg = is.message.clone();
        if let Some(line) = is.context.line {
            let _ = write!(msg, " (line {})", line);
        }
        let _ = writeln!(out, "- {} {}", severity_tag(is.severity, color), msg);
        let _ = writeln!(out, "  fix: {}", is.fix);
    }
    let _ = writeln!(
        out,
        "Counts: critical={} important={} recommended={} passed={}",
        f.summary.critical, f.summary.important, f.summary.recommended, f.summary.passed
    );
}

fn status_line(f: &FileReport, color: bool) -> String {
    let found = if f.found { "found" } else { "not found" };
    let valid = if f.valid { "valid" } else { "invalid" };
    let mut s = format!("{}, {}", found, valid);
    if let Some(err) = &f.error {
        let _ = write!(s, " ({})", err);
    }
    match (color, f.valid) {
        (false, _) => s,
        (true, true) => s.green().to_string(),
        (true, false) => s.red().to_string(),
    }
}

fn severity_tag(sev: Severity, color: bool) -> String {
    let tag = format!("⟦{}⟧", sev.as_str());
    if !color {
        return tag;
    }
    match sev {
        Severity::Critical => tag.red().bold().to_string(),
        Severity::Important => tag.yellow().bold().to_string(),
        Severity::Recommended => tag.blue().bold().to_string(),
    }
}

fn paint_bold(s: &str, color: bool) -> String {
    if color {
        s.bold().to_string()
    } else {
        s.to_string()
    }
}
