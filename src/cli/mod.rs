//! CLI module for sessionguard.
//!
//! Provides subcommands:
//! - `watch` - Track a session: renew, warn, and log out on expiry or idleness
//! - `inspect <token>` - Show the expiry and role carried by a token
//! - `config check` - Validate configuration file

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::auth::{decode_session, HttpAuthClient};
use crate::config::Config;
use crate::metrics::init_metrics;
use crate::notify::{LoggingNavigator, TracingNotifier};
use crate::session::{ActivityEvent, AuthContext, SessionTimeout};
use crate::storage::FileStore;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "sessionguard")]
#[command(author, version, about = "Session timeout and renewal tracking", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sessionguard.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Track a session until it ends or Ctrl+C is pressed.
    ///
    /// Each line read from stdin counts as user activity (`click`,
    /// `keypress`, `scroll`, ...). `extend` renews the session and
    /// `status` prints the time left.
    Watch {
        /// Access token (JWT)
        #[arg(long, env = "SESSIONGUARD_TOKEN")]
        token: String,
        /// Print Prometheus metrics on exit
        #[arg(long)]
        print_metrics: bool,
    },

    /// Show the session carried by a token
    Inspect {
        /// Access token (JWT)
        token: String,
    },

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate the configuration file
    Check,
}

/// Run the `inspect` command
pub fn run_inspect(token: &str) -> Result<()> {
    let session = decode_session(token).context("Failed to decode token")?;
    let expires_at = session
        .expires_at()
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| session.exp.to_string());
    let minutes = session.minutes_until_expiry(Utc::now());

    println!("Expires:  {}", expires_at);
    println!("Role:     {}", session.role.as_deref().unwrap_or("-"));
    if minutes > 0.0 {
        println!("Status:   active ({:.1} minutes left)", minutes);
    } else {
        println!("Status:   expired ({:.1} minutes ago)", -minutes);
    }
    Ok(())
}

/// Run the `config check` command
pub fn run_config_check(path: &Path) -> Result<()> {
    let config = Config::load(path)?;
    config.validate()?;

    println!("Configuration OK: {}", path.display());
    println!(
        "  warning {}m, renewal {}m, idle {}m, check every {}s",
        config.session.warning_time_minutes,
        config.session.renewal_threshold_minutes,
        config.session.max_idle_minutes,
        config.session.check_interval_seconds
    );
    println!("  auth API: {}", config.auth.api_url);
    if config.storage.enabled {
        println!("  state file: {}", config.storage.path.display());
    } else {
        println!("  state file: disabled");
    }
    Ok(())
}

/// Run the `watch` command
pub async fn run_watch(config: Config, token: String, print_metrics: bool) -> Result<()> {
    let metrics = if print_metrics {
        Some(init_metrics()?)
    } else {
        None
    };

    let auth = Arc::new(HttpAuthClient::new(&config.auth)?);
    let session = auth.set_token(token).context("Invalid access token")?;
    info!(
        exp = session.exp,
        role = session.role.as_deref().unwrap_or("-"),
        "Watching session"
    );

    let mut builder = SessionTimeout::builder(
        config.session.timeout_settings(),
        auth.clone(),
        Arc::new(TracingNotifier::new()),
        Arc::new(LoggingNavigator),
    );
    if config.storage.enabled {
        builder = builder.with_store(Arc::new(FileStore::new(&config.storage.path)));
    }
    let timeout = builder.build();
    timeout.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut session_poll = tokio::time::interval(Duration::from_secs(1));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_input(&timeout, &line).await,
                Ok(None) => {
                    debug!("stdin closed, no further activity will be recorded");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    stdin_open = false;
                }
            },
            _ = session_poll.tick() => {
                if auth.current_session().is_none() {
                    info!("Session ended");
                    break;
                }
            }
            _ = &mut shutdown => break,
        }
    }

    timeout.stop();
    if let Some(handle) = metrics {
        println!("{}", handle.render());
    }
    Ok(())
}

async fn handle_input(timeout: &SessionTimeout, line: &str) {
    match line.trim() {
        "" => {}
        "extend" => {
            if let Some(session) = timeout.extend_session().await {
                println!("Session extended until {}", session.exp);
            }
        }
        "status" => match timeout.minutes_until_expiry() {
            Some(minutes) => println!(
                "{:.1} minutes until expiry, idle for {}s",
                minutes,
                timeout.idle_for().as_secs()
            ),
            None => println!("No active session"),
        },
        other => {
            let event = other.parse().unwrap_or(ActivityEvent::KeyPress);
            timeout.handle_event(event);
        }
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
