// src/metrics.rs
use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("cycles_total", "Discovery/claim cycles started.");
        describe_counter!(
            "candidates_extracted_total",
            "Unique candidates extracted from listing pages."
        );
        describe_counter!("claims_entered_total", "Successful claim submissions.");
        describe_counter!(
            "claims_rejected_total",
            "Claims refused by the platform (budget exhausted)."
        );
        describe_counter!(
            "claims_skipped_total",
            "Candidates already entered or without an entry control."
        );
        describe_counter!(
            "claim_transport_errors_total",
            "Status checks or submits that failed in transport."
        );
        describe_gauge!("session_budget", "Spendable points after the last refresh or claim.");
        describe_histogram!("cycle_duration_ms", "Cycle wall time in milliseconds.");
    });
}

/// In-process Prometheus recorder; `render()` yields the exposition text.
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global recorder. Fails if another recorder is already set.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Serve Prometheus exposition on `addr`. Must run inside a tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("prometheus exporter on {addr}"))?;
    ensure_described();
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}
