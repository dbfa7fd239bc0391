//! LanChat Daemon -- hosts the session engine for a LAN chat server.
//!
//! Usage:
//!
//!   lanchat-daemon [OPTIONS]
//!
//! Options:
//!
//!   --config <PATH>                JSON config file (see `AppConfig`)
//!   --session-timeout <SECS>       Idle session lifetime
//!   --replay-window <SECS>         Accepted message clock skew
//!   --max-login-attempts <N>       Attempts per address per window
//!   --maintenance-interval <SECS>  Expiry sweep interval
//!
//! The daemon runs until interrupted with Ctrl+C.

use std::sync::Arc;

use lanchat_node::auth::AuthGate;
use lanchat_node::engine::ChatEngine;
use lanchat_node::maintenance::run_maintenance;
use lanchat_node::session::SessionManager;
use lanchat_node::transport::LoggingTransport;
use lanchat_protocol::validation::MessageValidator;
use lanchat_types::config::AppConfig;
use lanchat_types::Result;

mod config;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = match config::CliArgs::parse_from_env() {
        Ok(config::ParsedArgs::Run(cli)) => cli,
        Ok(config::ParsedArgs::Help) => {
            config::print_help();
            return;
        }
        Err(e) => {
            eprintln!("{e}");
            eprintln!("use --help for usage information");
            std::process::exit(2);
        }
    };

    let app_config = match config::resolve(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_daemon(app_config).await {
        tracing::error!(error = %e, "daemon error");
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Daemon main logic
// ---------------------------------------------------------------------------

async fn run_daemon(cfg: AppConfig) -> Result<()> {
    let engine = ChatEngine::new(
        Arc::new(AuthGate::from_config(&cfg)),
        Arc::new(SessionManager::from_config(&cfg)),
        Arc::new(MessageValidator::from_config(&cfg)),
        LoggingTransport,
    );

    tracing::info!(
        session_timeout_secs = cfg.session_timeout_secs,
        replay_window_secs = cfg.replay_window_secs,
        nonce_cache_size = cfg.nonce_cache_size,
        max_login_attempts = cfg.max_login_attempts,
        login_window_secs = cfg.login_window_secs,
        "session engine ready"
    );

    let mut ticker = tokio::time::interval(cfg.maintenance_interval());
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received Ctrl+C, shutting down");
                break;
            }
            _ = ticker.tick() => {
                let report = run_maintenance(engine.sessions(), engine.gate())?;
                if report.sessions_expired > 0 || report.sources_pruned > 0 {
                    tracing::info!(
                        sessions_expired = report.sessions_expired,
                        sources_pruned = report.sources_pruned,
                        "maintenance sweep"
                    );
                }
            }
        }
    }

    let remaining = engine.sessions().len();
    tracing::info!(remaining, "daemon stopped");
    Ok(())
}
