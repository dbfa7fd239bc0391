//! CLI argument parsing and config file support.
//!
//! The daemon reads an optional JSON file into [`AppConfig`] and then
//! applies command-line overrides on top (CLI wins).

use std::path::{Path, PathBuf};

use lanchat_types::config::AppConfig;
use lanchat_types::{LanChatError, Result};

// ---------------------------------------------------------------------------
// CLI arguments (manual parsing, no clap dependency)
// ---------------------------------------------------------------------------

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub session_timeout_secs: Option<u64>,
    pub replay_window_secs: Option<u64>,
    pub max_login_attempts: Option<usize>,
    pub maintenance_interval_secs: Option<u64>,
}

/// Outcome of parsing the argument list.
#[derive(Debug)]
pub enum ParsedArgs {
    Run(CliArgs),
    Help,
}

impl CliArgs {
    /// Parses CLI arguments from `std::env::args`.
    pub fn parse_from_env() -> Result<ParsedArgs> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self::parse(&args)
    }

    /// Parses an argument list that excludes the program name.
    pub fn parse(args: &[String]) -> Result<ParsedArgs> {
        let mut cli = Self::default();

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => {
                    cli.config_path = Some(PathBuf::from(value_for(arg, iter.next())?));
                }
                "--session-timeout" => {
                    cli.session_timeout_secs = Some(number_for(arg, iter.next())?);
                }
                "--replay-window" => {
                    cli.replay_window_secs = Some(number_for(arg, iter.next())?);
                }
                "--max-login-attempts" => {
                    cli.max_login_attempts = Some(number_for(arg, iter.next())?);
                }
                "--maintenance-interval" => {
                    cli.maintenance_interval_secs = Some(number_for(arg, iter.next())?);
                }
                "--help" | "-h" => return Ok(ParsedArgs::Help),
                other => {
                    return Err(LanChatError::ConfigError {
                        reason: format!("unknown argument: {other}"),
                    })
                }
            }
        }

        Ok(ParsedArgs::Run(cli))
    }
}

fn value_for<'a>(flag: &str, value: Option<&'a String>) -> Result<&'a str> {
    value
        .map(String::as_str)
        .ok_or_else(|| LanChatError::ConfigError {
            reason: format!("{flag} requires a value"),
        })
}

fn number_for<N: std::str::FromStr>(flag: &str, value: Option<&String>) -> Result<N> {
    let raw = value_for(flag, value)?;
    raw.parse().map_err(|_| LanChatError::ConfigError {
        reason: format!("{flag} expects a number, got '{raw}'"),
    })
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Loads an [`AppConfig`] from a JSON file. Omitted fields keep their
/// defaults.
pub fn load_file(path: &Path) -> Result<AppConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| LanChatError::ConfigError {
        reason: format!("failed to read config file {}: {e}", path.display()),
    })?;

    serde_json::from_str(&text).map_err(|e| LanChatError::ConfigError {
        reason: format!("invalid config JSON: {e}"),
    })
}

/// Applies CLI overrides onto a base configuration.
pub fn merge_cli(mut config: AppConfig, cli: &CliArgs) -> AppConfig {
    if let Some(secs) = cli.session_timeout_secs {
        config.session_timeout_secs = secs;
    }
    if let Some(secs) = cli.replay_window_secs {
        config.replay_window_secs = secs;
    }
    if let Some(n) = cli.max_login_attempts {
        config.max_login_attempts = n;
    }
    if let Some(secs) = cli.maintenance_interval_secs {
        config.maintenance_interval_secs = secs;
    }
    config
}

/// Builds the final, validated configuration.
pub fn resolve(cli: &CliArgs) -> Result<AppConfig> {
    let base = match &cli.config_path {
        Some(path) => load_file(path)?,
        None => AppConfig::default(),
    };
    let config = merge_cli(base, cli);
    config.validate()?;
    Ok(config)
}

pub fn print_help() {
    println!(
        r#"LanChat Daemon - secure LAN chat session engine

USAGE:
    lanchat-daemon [OPTIONS]

OPTIONS:
    --config <PATH>                 Load settings from JSON config file
    --session-timeout <SECS>        Idle session lifetime (default: 1800)
    --replay-window <SECS>          Accepted message clock skew (default: 30)
    --max-login-attempts <N>        Attempts per address per window (default: 5)
    --maintenance-interval <SECS>   Expiry sweep interval (default: 60)
    -h, --help                      Show this help

ENVIRONMENT:
    RUST_LOG                        Log level filter (default: info)
"#
    );
}
