//! Dashboard server
//!
//! Serves a small dashboard behind HTTP Basic authentication, with
//! per-client lockout after repeated failed sign-ins.

mod auth;
mod web;

use anyhow::{bail, Context, Result};
use clap::Parser;
use dashguard_core::{AttemptTracker, AuthGuard, CredentialSource, LockoutPolicy};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Dashboard server with Basic auth and failed-login lockout
#[derive(Parser)]
#[command(name = "dashboard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Password-protected dashboard server", long_about = None)]
struct Args {
    /// Bind address for the HTTP server
    #[arg(short, long, env = "DASHBOARD_BIND", default_value = "127.0.0.1:3000")]
    bind: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "DASHBOARD_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Dashboard username
    #[arg(long, env = "DASHBOARD_USERNAME")]
    username: Option<String>,

    /// Dashboard password
    #[arg(long, env = "DASHBOARD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Legacy password setting, used when --password is not set
    #[arg(long, env = "ADMIN_PASSWORD", hide = true, hide_env_values = true)]
    legacy_password: Option<String>,

    /// Realm advertised in the Basic challenge
    #[arg(long, env = "DASHBOARD_REALM", default_value = "Dashboard")]
    realm: String,

    /// Failed attempts before a client is locked out
    #[arg(long, env = "DASHBOARD_MAX_ATTEMPTS", default_value_t = 5)]
    max_attempts: u32,

    /// Lockout duration in minutes
    #[arg(long, env = "DASHBOARD_LOCKOUT_MINUTES", default_value_t = 15)]
    lockout_minutes: u64,

    /// Seconds between sweeps of stale attempt records (0 disables)
    #[arg(long, env = "DASHBOARD_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    sweep_interval_secs: u64,

    /// Hours an unlocked client's failures are kept without new attempts
    #[arg(long, env = "DASHBOARD_RETENTION_HOURS", default_value_t = 24)]
    retention_hours: u64,

    /// Refuse to start with built-in default credentials
    #[arg(long, env = "DASHBOARD_REQUIRE_CREDENTIALS")]
    require_credentials: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level)?;

    info!("Starting dashboard v{}", env!("CARGO_PKG_VERSION"));

    let bind_addr: SocketAddr = args
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", args.bind))?;

    let source = CredentialSource::resolve(args.username, args.password, args.legacy_password);
    check_credentials(&source, args.require_credentials)?;

    let policy = LockoutPolicy::new(
        args.max_attempts,
        Duration::from_secs(args.lockout_minutes.saturating_mul(60)),
    )
    .context("Invalid lockout policy")?;
    info!(
        "Lockout after {} failed attempts for {} minutes",
        policy.max_attempts(),
        args.lockout_minutes
    );

    let tracker = Arc::new(AttemptTracker::new(policy));

    let sweeper = if args.sweep_interval_secs > 0 {
        let retention = Duration::from_secs(args.retention_hours.saturating_mul(3600));
        Some(
            Arc::clone(&tracker)
                .spawn_sweeper(Duration::from_secs(args.sweep_interval_secs), retention),
        )
    } else {
        info!("Attempt record sweeping disabled");
        None
    };

    let guard = AuthGuard::new(&source, tracker).with_realm(&args.realm);
    let server = web::WebServer::new(web::DashboardState::new(guard));

    server.run(bind_addr, shutdown_signal()).await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}

/// Setup logging with tracing
fn setup_logging(level: &str) -> Result<()> {
    let log_level = level.parse::<Level>().unwrap_or(Level::INFO);

    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Report built-in default credentials, or refuse them when required
fn check_credentials(source: &CredentialSource, require_configured: bool) -> Result<()> {
    let defaults = source.insecure_defaults();
    if defaults.is_empty() {
        return Ok(());
    }

    if require_configured {
        let reasons: Vec<_> = defaults.iter().map(|d| d.describe()).collect();
        bail!(
            "Refusing to start with default credentials: {}",
            reasons.join("; ")
        );
    }

    for default in &defaults {
        error!("INSECURE: dashboard {}", default.describe());
    }
    error!("INSECURE: set DASHBOARD_USERNAME and DASHBOARD_PASSWORD before exposing this server");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to setup SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(username: Option<&str>, password: Option<&str>) -> CredentialSource {
        CredentialSource::resolve(
            username.map(str::to_string),
            password.map(str::to_string),
            None,
        )
    }

    #[test]
    fn test_configured_credentials_accepted() {
        assert!(check_credentials(&source(Some("ops"), Some("pw")), true).is_ok());
    }

    #[test]
    fn test_defaults_allowed_with_warning() {
        assert!(check_credentials(&source(None, None), false).is_ok());
    }

    #[test]
    fn test_defaults_refused_when_required() {
        let err = check_credentials(&source(Some("ops"), None), true).unwrap_err();
        assert!(err.to_string().contains("password is not configured"));
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["dashboard"]).unwrap();
        assert_eq!(args.bind, "127.0.0.1:3000");
        assert_eq!(args.realm, "Dashboard");
        assert_eq!(args.max_attempts, 5);
        assert_eq!(args.lockout_minutes, 15);
        assert!(!args.require_credentials);
    }
}
