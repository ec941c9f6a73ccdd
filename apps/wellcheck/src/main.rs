//! Wellcheck CLI binary entry point.
//! Resolves configuration, runs the analysis and prints the report.

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wellcheck::cli::{Cli, Commands};
use wellcheck::models::FileKey;
use wellcheck::utils::{error_prefix, info_prefix, note_prefix};
use wellcheck::{analyze, config, output, Target};

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("wellcheck=debug,warn")
    } else {
        EnvFilter::try_from_env("WELLCHECK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", error_prefix(), message);
    std::process::exit(2);
}

fn main() {
    let cli = Cli::parse();
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Files => {
            for key in FileKey::ALL {
                println!("{:<10} {}", key.as_str(), key.well_known_paths().join(", "));
            }
        }
        Commands::Check {
            target,
            only,
            json,
            output,
            timeout,
            user_agent,
            config_root,
            verbose,
        } => {
            init_tracing(verbose);
            let output = if json { Some("json") } else { output.as_deref() };
            let eff = config::resolve_effective(
                config_root.as_deref(),
                only.as_deref(),
                output,
                timeout,
                user_agent.as_deref(),
            )
            .unwrap_or_else(|e| fail(e));
            if !eff.config_found && eff.output != "json" && verbose {
                eprintln!(
                    "{} No wellcheck.toml found from {}; using defaults.",
                    note_prefix(),
                    eff.root.display()
                );
            }
            let target = Target::parse(&target).unwrap_or_else(|e| fail(e));
            if let (Some(only), "human") = (&eff.only, eff.output.as_str()) {
                let keys: Vec<&str> = only.iter().map(|k| k.as_str()).collect();
                eprintln!("{} Checking only: [{}]", info_prefix(), keys.join(", "));
            }
            let report = analyze(&target, &eff.check_options()).unwrap_or_else(|e| fail(e));
            if let Err(e) = output::print_report(&report, &eff.output) {
                fail(e);
            }
            if report.has_critical() {
                std::process::exit(1);
            }
        }
    }
}
