//! Giveaway claimer: binary entrypoint.
//! Loads config and session cookies, wires the platform client, notifiers and
//! interest sources into a `CycleController`, then polls until interrupted.
//!
//! See `README.md` for configuration and `DESIGN.md` for architecture notes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use giveaway_claimer::config::cookies::load_cookies;
use giveaway_claimer::config::BotConfig;
use giveaway_claimer::cycle::CycleController;
use giveaway_claimer::notify::{Notifier, NotifierMux};
use giveaway_claimer::platform::{ClaimApi, HttpPlatform, PageFetcher, PlatformSettings};

#[derive(Debug, Parser)]
#[command(name = "giveaway-claimer", version, about)]
struct Cli {
    /// Config file (default: $GIVEAWAY_CONFIG_PATH, then config/claimer.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Run a single cycle, send the digest and exit
    #[arg(long)]
    once: bool,
}

/// Tracing setup: `RUST_LOG` filter (default `giveaway_claimer=info,warn`),
/// JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("giveaway_claimer=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

/// Cancel on Ctrl-C, or SIGTERM on unix.
fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {e}");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::info!("shutdown signal received");
        token.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; SMTP_PASS and RUST_LOG usually live there.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = BotConfig::load_default(cli.config.as_deref())?;

    let cookies = match load_cookies(&cfg.cookies_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("no session cookies loaded: {e:#}");
            Vec::new()
        }
    };

    if let Some(addr) = cfg.metrics_addr {
        giveaway_claimer::metrics::install_exporter(addr)?;
    }

    let base_url = Url::parse(&cfg.base_url).context("base_url")?;
    let platform = Arc::new(HttpPlatform::new(PlatformSettings::new(base_url), &cookies)?);
    let api: Arc<dyn ClaimApi> = platform.clone();
    let pages: Arc<dyn PageFetcher> = platform;
    let notifier: Arc<dyn Notifier> = Arc::new(NotifierMux::from_config(&cfg));

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let mut controller =
        CycleController::from_config(&cfg, api, pages, notifier).with_cancel(cancel);

    tracing::info!(
        base_url = %cfg.base_url,
        feeds = cfg.feeds.len(),
        interval_secs = cfg.interval_secs,
        "claimer started"
    );

    if cli.once {
        let report = controller.run_once().await?;
        tracing::info!(entered = report.entered, aborts = report.aborts, "single cycle done");
        return Ok(());
    }

    controller.run().await?;
    Ok(())
}
