use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pevfind::config::ScanConfiguration;
use pevfind::output::print_matches;
use pevfind::query::parse_with_config;
use pevfind::scan::Scanner;
use pevfind::scan::watchdog::Watchdog;
use pevfind::utils::app_data::{AppConfig, get_config_path};
use std::io::{self, IsTerminal};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "PEVFIND_LOG";

#[derive(Parser)]
#[command(name = "pevfind")]
#[command(about = "Find files by name, attributes, dates, PE headers, hashes and content")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Criteria expression, e.g. `*.dll -t2 AND -s+1M --sort#-size#`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    expression: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the parsed and reordered criteria tree without scanning
    Tree {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        expression: Vec<String>,
    },
    /// List the loadlines stored in the config file
    Loadlines,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let app_config = load_app_config();

    match cli.command {
        Some(Commands::Tree { expression }) => {
            let config = ScanConfiguration::default();
            let resolver = app_config.loadline_resolver(&config.base_dir);
            let parsed = parse_with_config(&join_expression(&expression), &resolver, config)?;
            let mut tree = parsed.tree;
            tree.reorder_tree();
            if !parsed.config.recursive {
                tree.make_non_recursive();
            }
            print!("{}", tree.describe());
        }
        Some(Commands::Loadlines) => {
            if app_config.loadlines.is_empty() {
                println!("No loadlines configured");
                if let Ok(path) = get_config_path() {
                    println!("Add a \"loadlines\" map to {}", path.display());
                }
            }
            for (name, line) in &app_config.loadlines {
                println!("{}: {}", name, line);
            }
        }
        None => search(&app_config, &cli.expression)?,
    }

    Ok(())
}

fn search(app_config: &AppConfig, words: &[String]) -> Result<()> {
    let config = ScanConfiguration::default();
    let resolver = app_config.loadline_resolver(&config.base_dir);
    let parsed = parse_with_config(&join_expression(words), &resolver, config)?;
    let config = parsed.config;
    let mut tree = parsed.tree;

    tree.reorder_tree();
    if !config.recursive {
        tree.make_non_recursive();
    }

    let watchdog = config.timeout.map(Watchdog::arm);

    if config.debug {
        eprintln!("{}", tree.describe());
    }

    let outcome = Scanner::new(&tree, &config)
        .threads(app_config.effective_scan_threads())
        .run()
        .context("Scan failed")?;

    print_matches(
        &outcome.matches,
        &config.format,
        config.encoding,
        io::stdout().is_terminal(),
    )
    .context("Failed to write results")?;

    if config.debug {
        eprintln!(
            "{} matched, {} visited, {} directories pruned",
            outcome.stats.matched, outcome.stats.visited, outcome.stats.pruned
        );
    }

    if let Some(watchdog) = watchdog {
        watchdog.disarm();
    }
    Ok(())
}

/// Log to stderr so stdout carries only results
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn load_app_config() -> AppConfig {
    match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("using default config: {:#}", e);
            AppConfig::default()
        }
    }
}

/// Rebuild a command line from shell words. Words the shell unquoted are
/// quoted again unless they are modifiers, whose payloads may hold spaces.
fn join_expression(words: &[String]) -> String {
    words
        .iter()
        .map(|word| {
            if word.chars().any(char::is_whitespace) && !word.starts_with('-') {
                format!("\"{}\"", word)
            } else {
                word.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_join_expression_quotes_spaced_patterns() {
        assert_eq!(
            join_expression(&words(&["C:\\Program Files\\*.exe", "-tF"])),
            "\"C:\\Program Files\\*.exe\" -tF"
        );
    }

    #[test]
    fn test_join_expression_keeps_modifier_payloads() {
        assert_eq!(
            join_expression(&words(&["--contains#hello world#", "OR", "*.txt"])),
            "--contains#hello world# OR *.txt"
        );
    }

    #[test]
    fn test_cli_accepts_hyphenated_expression() {
        let cli = Cli::try_parse_from(["pevfind", "-tF", "--sort#size#", "*.log"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.expression, words(&["-tF", "--sort#size#", "*.log"]));
    }

    #[test]
    fn test_cli_tree_subcommand() {
        let cli = Cli::try_parse_from(["pevfind", "tree", "*.exe", "-t2"]).unwrap();
        match cli.command {
            Some(Commands::Tree { expression }) => {
                assert_eq!(expression, words(&["*.exe", "-t2"]))
            }
            _ => panic!("expected tree subcommand"),
        }
    }
}
