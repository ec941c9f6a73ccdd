//! CLI argument parsing via `clap`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "wellcheck",
    version,
    about = "Audit a site's well-known files",
    long_about = "Wellcheck validates sitemap.xml, robots.txt, llms.txt, llms-full.txt, security.txt, humans.txt and ads.txt for a local directory or a live site, and reports severity-ranked findings with suggested fixes.\n\nConfiguration precedence: CLI > wellcheck.toml > defaults.",
    after_help = "Examples:\n  wellcheck check ./public\n  wellcheck check https://example.com --json\n  wellcheck check https://example.com --only security,robots --timeout 5",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show version
    #[command(
        about = "Show version",
        long_about = "Print the current wellcheck version."
    )]
    Version,
    /// List checked files
    #[command(
        about = "List checked files",
        long_about = "Print each file key with the well-known paths tried for it, in report order."
    )]
    Files,
    /// Analyze a directory or URL
    #[command(
        about = "Run checks",
        long_about = "Locate and validate the well-known files under TARGET. Exit code is 1 when any file has a critical issue and 2 when the target itself cannot be read.",
        after_help = "Examples:\n  wellcheck check ./dist\n  wellcheck check https://example.com --output json"
    )]
    Check {
        #[arg(help = "Directory path or http(s) URL of the site root")]
        target: String,
        #[arg(long, help = "Comma-separated file keys to check (e.g. security,robots)")]
        only: Option<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Shorthand for --output json")]
        json: bool,
        #[arg(long, conflicts_with = "json", help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, help = "Per-file fetch timeout in seconds (default: 10)")]
        timeout: Option<u64>,
        #[arg(long, help = "User-Agent header for remote fetches")]
        user_agent: Option<String>,
        #[arg(long, help = "Directory to start config discovery from (default: current dir)")]
        config_root: Option<String>,
        #[arg(short, long, action = clap::ArgAction::SetTrue, help = "Log fetch and check progress to stderr")]
        verbose: bool,
    },
}
