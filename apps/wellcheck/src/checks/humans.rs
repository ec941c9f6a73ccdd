//! humans.txt checks. The format is informal, so the only rule is that
//! the file carries some text; `/* SECTION */` headings are recorded.

use crate::models::{Findings, PassedCheck};
use serde_json::{json, Map, Value as Json};

pub fn check(text: &str) -> Findings {
    let mut f = Findings::new();
    let non_blank = text.lines().filter(|l| !l.trim().is_empty()).count();

    if non_blank == 0 {
        f.recommended(
            "content",
            "humans.txt is empty",
            "Add the people and tools behind the site, e.g. a /* TEAM */ section",
        );
    } else {
        f.pass(
            PassedCheck::new("content", "humans.txt has content")
                .with_count(non_blank as u64, text.lines().count() as u64),
        );
    }

    let sections: Vec<String> = text
        .lines()
        .filter_map(|l| {
            let t = l.trim();
            let inner = t.strip_prefix("/*")?.strip_suffix("*/")?.trim();
            if inner.is_empty() {
                None
            } else {
                Some(inner.to_string())
            }
        })
        .collect();

    let mut structure: Map<String, Json> = Map::new();
    structure.insert("sections".into(), json!(sections));
    f.structure = Some(structure);
    f.stat("lines", non_blank as u64);
    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    #[test]
    fn test_non_empty_passes_and_records_sections() {
        let f = check("/* TEAM */\nDeveloper: Ada\n\n/* SITE */\nStandards: HTML5\n");
        assert!(f.issues.is_empty());
        assert_eq!(f.structure.unwrap()["sections"], json!(["TEAM", "SITE"]));
    }

    #[test]
    fn test_empty_is_recommended() {
        let f = check("  \n\n");
        assert_eq!(f.issues.len(), 1);
        assert_eq!(f.issues[0].severity, Severity::Recommended);
    }
}
