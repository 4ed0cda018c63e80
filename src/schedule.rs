// src/schedule.rs
//! # Claim scheduler
//! Orders eligible candidates by draw time, walks them up to a horizon and
//! attempts each one with a randomized pause in between.
//!
//! Policy:
//! - the scan stops at the first candidate drawn after `now + horizon`;
//! - an exhausted budget (status page error or a declined claim) stops the
//!   scan and raises the abort signal, since points are global;
//! - a claim that leaves the budget at zero also stops the scan with an abort;
//! - a giveaway already attempted earlier in the cycle is not checked again;
//! - a failed status check or submit only skips that candidate, unless the
//!   platform no longer accepts the session. That ends the scan and is
//!   reported in `ScanReport::fatal` next to what was already entered.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use metrics::{counter, gauge};
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::extract::GiveawayCandidate;
use crate::page::ClaimStatus;
use crate::platform::ClaimApi;

/// Result of attempting one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Entered,
    AlreadyEntered,
    /// No entry mechanism on the detail page.
    Ineligible,
    /// Platform declined: budget exhausted.
    Rejected,
    TransportFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRecord {
    pub id: String,
    pub subject_id: String,
    pub outcome: ClaimOutcome,
}

/// Account token and spendable budget for the current cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: String,
    pub token: String,
    /// `None` when the page did not show a readable balance.
    pub budget: Option<u32>,
    /// Giveaway ids already status-checked this cycle, across all feeds.
    pub attempted: HashSet<String>,
}

impl SessionState {
    pub fn new(user: impl Into<String>, token: impl Into<String>, budget: Option<u32>) -> Self {
        Self {
            user: user.into(),
            token: token.into(),
            budget,
            attempted: HashSet::new(),
        }
    }
}

/// Uniform random pause before each claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(Duration::from_secs(3), Duration::from_secs(6))
    }
}

impl Pacing {
    /// Bounds are swapped if given in the wrong order.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn sample(&self) -> Duration {
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        if lo == hi {
            return Duration::from_millis(lo);
        }
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// 0 or 1: the scan stops at the first budget exhaustion.
    pub aborts: u32,
    pub digest: Vec<String>,
    pub records: Vec<ClaimRecord>,
    /// Set when the platform rejected the session mid-scan.
    pub fatal: Option<TransportError>,
}

impl ScanReport {
    pub fn entered(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome == ClaimOutcome::Entered)
            .count()
    }

    fn record(&mut self, c: &GiveawayCandidate, outcome: ClaimOutcome) {
        self.records.push(ClaimRecord {
            id: c.id.clone(),
            subject_id: c.subject_id.clone(),
            outcome,
        });
    }
}

/// "Draw in N minutes" under one hour, "Draw in N hour(s)" otherwise.
pub fn remaining_phrase(remaining: TimeDelta) -> String {
    let minutes = remaining.num_seconds().max(0) as f64 / 60.0;
    if minutes < 60.0 {
        format!("Draw in {minutes:.0} minutes")
    } else {
        format!("Draw in {:.0} hour(s)", minutes / 60.0)
    }
}

pub fn digest_line(now: DateTime<Utc>, c: &GiveawayCandidate) -> String {
    format!(
        "{}. Apply for {} : {}. {}. Reference {}",
        now.format("%Y-%m-%d %H:%M:%S"),
        c.subject_id,
        c.subject_name,
        remaining_phrase(c.draw_at - now),
        c.detail_ref
    )
}

pub struct ClaimScheduler<'a> {
    api: &'a dyn ClaimApi,
    pacing: Pacing,
    cancel: Option<CancellationToken>,
}

impl<'a> ClaimScheduler<'a> {
    pub fn new(api: &'a dyn ClaimApi, pacing: Pacing) -> Self {
        Self {
            api,
            pacing,
            cancel: None,
        }
    }

    /// Checked between candidates.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    pub async fn run(
        &self,
        mut eligible: Vec<GiveawayCandidate>,
        horizon: Duration,
        session: &mut SessionState,
    ) -> ScanReport {
        // stable: equal draw times keep input order
        eligible.sort_by_key(|c| c.draw_at);

        let mut report = ScanReport::default();
        let now = Utc::now();
        let deadline = TimeDelta::from_std(horizon)
            .ok()
            .and_then(|h| now.checked_add_signed(h))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        for c in &eligible {
            if self.cancelled() {
                tracing::info!("scan cancelled");
                break;
            }
            if c.draw_at > deadline {
                tracing::debug!(id = %c.id, draw_at = %c.draw_at, "beyond horizon, scan done");
                break;
            }
            if !session.attempted.insert(c.id.clone()) {
                tracing::debug!(id = %c.id, "already attempted this cycle");
                continue;
            }

            let status = match self.api.fetch_page(&c.detail_ref).await {
                Ok(page) => page.claim_status(),
                Err(e) if e.is_fatal() => {
                    report.fatal = Some(e);
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, id = %c.id, "status check failed");
                    counter!("claim_transport_errors_total").increment(1);
                    report.record(c, ClaimOutcome::TransportFailure);
                    continue;
                }
            };

            match status {
                ClaimStatus::Open => {}
                ClaimStatus::AlreadyEntered => {
                    counter!("claims_skipped_total").increment(1);
                    report.record(c, ClaimOutcome::AlreadyEntered);
                    continue;
                }
                ClaimStatus::NoEntry => {
                    counter!("claims_skipped_total").increment(1);
                    report.record(c, ClaimOutcome::Ineligible);
                    continue;
                }
                ClaimStatus::BudgetExhausted => {
                    tracing::info!(id = %c.id, "not enough points, stopping scan");
                    counter!("claims_rejected_total").increment(1);
                    report.record(c, ClaimOutcome::Rejected);
                    report.aborts = 1;
                    break;
                }
                ClaimStatus::Unrecognized => {
                    tracing::warn!(id = %c.id, detail = %c.detail_ref, "strange detail page");
                    counter!("claim_transport_errors_total").increment(1);
                    report.record(c, ClaimOutcome::TransportFailure);
                    continue;
                }
            }

            // never sleep past a draw that is about to happen
            let pause = self.pacing.sample();
            if !pause.is_zero() {
                let wake = TimeDelta::from_std(pause)
                    .ok()
                    .and_then(|p| Utc::now().checked_add_signed(p));
                if wake.is_some_and(|w| c.draw_at > w) {
                    tokio::time::sleep(pause).await;
                }
            }

            let answer = match self
                .api
                .submit_claim(&c.detail_ref, &session.token, &c.id)
                .await
            {
                Ok(a) => a,
                Err(e) if e.is_fatal() => {
                    report.fatal = Some(e);
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, id = %c.id, "claim submit failed");
                    counter!("claim_transport_errors_total").increment(1);
                    report.record(c, ClaimOutcome::TransportFailure);
                    continue;
                }
            };

            if let Some(budget) = answer.remaining_budget {
                session.budget = Some(budget);
                gauge!("session_budget").set(f64::from(budget));
            }

            if !answer.success {
                tracing::info!(id = %c.id, subject = %c.subject_id, "claim declined, stopping scan");
                counter!("claims_rejected_total").increment(1);
                report.record(c, ClaimOutcome::Rejected);
                report.aborts = 1;
                break;
            }

            let line = digest_line(Utc::now(), c);
            tracing::info!(
                id = %c.id,
                subject = %c.subject_id,
                name = %c.subject_name,
                budget = ?session.budget,
                "entered giveaway"
            );
            counter!("claims_entered_total").increment(1);
            report.record(c, ClaimOutcome::Entered);
            report.digest.push(line);

            if session.budget == Some(0) {
                tracing::info!("budget spent, stopping scan");
                report.aborts = 1;
                break;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn minutes_under_an_hour_hours_above() {
        assert_eq!(remaining_phrase(TimeDelta::minutes(45)), "Draw in 45 minutes");
        // {:.0} rounds half to even: 2.5h prints as 2
        assert_eq!(remaining_phrase(TimeDelta::minutes(150)), "Draw in 2 hour(s)");
        assert_eq!(remaining_phrase(TimeDelta::minutes(200)), "Draw in 3 hour(s)");
        assert_eq!(remaining_phrase(TimeDelta::minutes(-5)), "Draw in 0 minutes");
    }

    #[test]
    fn digest_line_mentions_subject() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let c = GiveawayCandidate {
            id: "AbC".into(),
            subject_id: "570".into(),
            subject_name: "Example Game".into(),
            detail_ref: "/giveaway/AbC/example-game".into(),
            draw_at: now + TimeDelta::minutes(45),
        };
        let line = digest_line(now, &c);
        assert_eq!(
            line,
            "2026-03-01 12:00:00. Apply for 570 : Example Game. Draw in 45 minutes. Reference /giveaway/AbC/example-game"
        );
    }

    #[test]
    fn pacing_stays_in_window() {
        let p = Pacing::new(Duration::from_millis(30), Duration::from_millis(10));
        for _ in 0..50 {
            let d = p.sample();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(30));
        }
        assert_eq!(Pacing::none().sample(), Duration::ZERO);
    }
}
