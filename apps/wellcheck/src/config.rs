//! Configuration discovery and effective settings resolution.
//!
//! Wellcheck reads `wellcheck.toml|yaml|yml` from the working directory (or
//! closest ancestor) and merges it with CLI flags to produce an `Effective`
//! config.
//! Defaults:
//! - `only`: all seven files
//! - `output`: `human`
//! - `timeout`: 10 seconds
//! - `user_agent`: `wellcheck/<version>`
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::analyze::{default_user_agent, CheckOptions, DEFAULT_TIMEOUT_SECS};
use crate::error::ConfigError;
use crate::models::file_key::parse_only_list;
use crate::models::FileKey;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_NAMES: [&str; 3] = ["wellcheck.toml", "wellcheck.yaml", "wellcheck.yml"];

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `wellcheck.toml|yaml`.
pub struct WellcheckConfig {
    pub only: Option<Vec<String>>,
    pub output: Option<String>,
    /// Per-fetch timeout in seconds.
    pub timeout: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by `check` after applying precedence.
pub struct Effective {
    pub root: PathBuf,
    pub config_found: bool,
    pub only: Option<BTreeSet<FileKey>>,
    pub output: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Effective {
    pub fn check_options(&self) -> CheckOptions {
        CheckOptions {
            only: self.only.clone(),
            timeout: self.timeout,
            user_agent: self.user_agent.clone(),
            ..CheckOptions::default()
        }
    }
}

/// Walk upward from `start` to the directory holding the config.
///
/// Stops when a `wellcheck.toml|yaml|yml` or a `.git` directory is found.
pub fn detect_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if CONFIG_NAMES.iter().any(|n| cur.join(n).exists()) {
            return cur.to_path_buf();
        }
        if cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// Load `WellcheckConfig` from `wellcheck.toml` or `wellcheck.yaml|yml` if
/// present. A file that exists but does not parse is an error.
pub fn load_config(root: &Path) -> Result<Option<WellcheckConfig>, ConfigError> {
    for name in CONFIG_NAMES {
        let path = root.join(name);
        if !path.exists() {
            continue;
        }
        let s = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let cfg = if name.ends_with(".toml") {
            toml::from_str::<WellcheckConfig>(&s).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str::<WellcheckConfig>(&s).map_err(|e| e.to_string())
        }
        .map_err(|message| ConfigError::Parse { path, message })?;
        return Ok(Some(cfg));
    }
    Ok(None)
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(
    cli_root: Option<&str>,
    cli_only: Option<&str>,
    cli_output: Option<&str>,
    cli_timeout: Option<u64>,
    cli_user_agent: Option<&str>,
) -> Result<Effective, ConfigError> {
    let start = PathBuf::from(cli_root.unwrap_or("."));
    let root = detect_root(&start);
    let loaded = load_config(&root)?;
    let config_found = loaded.is_some();
    let cfg = loaded.unwrap_or_default();

    let only = match (cli_only, cfg.only) {
        (Some(s), _) => Some(parse_only_list(s).map_err(ConfigError::Only)?),
        (None, Some(list)) => Some(parse_only_list(&list.join(",")).map_err(ConfigError::Only)?),
        (None, None) => None,
    }
    .map(|keys| keys.into_iter().collect::<BTreeSet<_>>())
    .filter(|set| !set.is_empty());

    let output = cli_output
        .map(|s| s.to_string())
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());
    if output != "human" && output != "json" {
        return Err(ConfigError::Output(output));
    }

    let secs = cli_timeout.or(cfg.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS);
    if secs == 0 {
        return Err(ConfigError::Timeout);
    }

    let user_agent = cli_user_agent
        .map(|s| s.to_string())
        .or(cfg.user_agent)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(default_user_agent);

    Ok(Effective {
        root,
        config_found,
        only,
        output,
        timeout: Duration::from_secs(secs),
        user_agent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_detect_and_load_toml() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut f = fs::File::create(root.join("wellcheck.toml")).unwrap();
        writeln!(
            f,
            "{}",
            r#"
only = ["security", "robots.txt"]
output = "json"
timeout = 3
    "#
        )
        .unwrap();

        // Resolve using explicit root to avoid global CWD races
        let eff = resolve_effective(root.to_str(), None, None, None, None).unwrap();
        assert!(eff.config_found);
        assert_eq!(eff.root, root.to_path_buf());
        assert_eq!(eff.output, "json");
        assert_eq!(eff.timeout, Duration::from_secs(3));
        let only = eff.only.unwrap();
        assert!(only.contains(&FileKey::Security) && only.contains(&FileKey::Robots));
        assert_eq!(only.len(), 2);
    }

    #[test]
    fn test_load_yaml_and_defaults() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("wellcheck.yaml"), "user_agent: audit-bot/1.0\n").unwrap();

        let eff = resolve_effective(root.to_str(), None, None, None, None).unwrap();
        assert_eq!(eff.user_agent, "audit-bot/1.0");
        assert_eq!(eff.output, "human");
        assert_eq!(eff.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(eff.only.is_none());
    }

    #[test]
    fn test_cli_takes_precedence() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("wellcheck.toml"),
            "only = [\"ads\"]\noutput = \"json\"\ntimeout = 30\n",
        )
        .unwrap();

        let eff = resolve_effective(
            root.to_str(),
            Some("sitemap"),
            Some("human"),
            Some(5),
            Some("ci"),
        )
        .unwrap();
        assert_eq!(eff.only, Some([FileKey::Sitemap].into_iter().collect()));
        assert_eq!(eff.output, "human");
        assert_eq!(eff.timeout, Duration::from_secs(5));
        assert_eq!(eff.user_agent, "ci");
        assert_eq!(eff.check_options().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_no_config_uses_defaults() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let eff = resolve_effective(dir.path().to_str(), None, None, None, None).unwrap();
        assert!(!eff.config_found);
        assert!(eff.user_agent.starts_with("wellcheck/"));
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_str();
        assert!(matches!(
            resolve_effective(root, Some("favicon"), None, None, None),
            Err(ConfigError::Only(_))
        ));
        assert!(matches!(
            resolve_effective(root, None, Some("xml"), None, None),
            Err(ConfigError::Output(_))
        ));
        assert!(matches!(
            resolve_effective(root, None, None, Some(0), None),
            Err(ConfigError::Timeout)
        ));
    }

    #[test]
    fn test_malformed_config_is_reported() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("wellcheck.toml"), "only = [").unwrap();
        let err = resolve_effective(dir.path().to_str(), None, None, None, None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
