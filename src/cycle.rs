// src/cycle.rs
//! # Cycle controller
//! One cycle: refresh session and won set, refresh the interest set, then
//! extract → filter → claim on every configured feed. The number of budget
//! aborts stretches the delay before the next cycle.
//!
//! The controller owns all per-cycle state and the digest; everything it
//! hands to the other components is borrowed read-only.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeDelta, TimeZone, Timelike, Utc};
use metrics::{counter, gauge, histogram};
use tokio_util::sync::CancellationToken;

use crate::config::{BotConfig, FeedConfig};
use crate::digest::Digest;
use crate::error::{CycleError, TransportError};
use crate::extract::{extract, BundlePolicy};
use crate::filter::{filter, Eligibility, InterestSet, WonSet};
use crate::interest::{FileInterestList, InterestProvider, ProfileInterest};
use crate::notify::Notifier;
use crate::page::AccountSnapshot;
use crate::platform::{ClaimApi, PageFetcher};
use crate::schedule::{ClaimScheduler, Pacing, SessionState};

const ALERT_SUBJECT: &str = "Panic Message!";
const DIGEST_SUBJECT: &str = "Daily digest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    RefreshingSession,
    RefreshingInterest,
    Scanning { feed: usize },
    Sleeping,
    Terminated,
}

/// `base * (1 + aborts)`: exhausted budget does not refill faster by polling sooner.
pub fn next_delay(base: Duration, aborts: u32) -> Duration {
    base.saturating_mul(aborts.saturating_add(1))
}

/// When the accumulated digest goes out: at a fixed local hour (at most once
/// per hour) or when the last flush is older than `max_age`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestSchedule {
    flush_hour: Option<u32>,
    max_age: TimeDelta,
    last_flush: DateTime<Utc>,
}

impl DigestSchedule {
    pub fn new(flush_hour: Option<u32>, last_flush: DateTime<Utc>) -> Self {
        Self {
            flush_hour,
            max_age: TimeDelta::hours(24),
            last_flush,
        }
    }

    pub fn is_due<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        let elapsed = now.with_timezone(&Utc) - self.last_flush;
        if elapsed >= self.max_age {
            return true;
        }
        self.flush_hour == Some(now.hour()) && elapsed >= TimeDelta::hours(1)
    }

    pub fn mark_flushed(&mut self, at: DateTime<Utc>) {
        self.last_flush = at;
    }
}

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub base_interval: Duration,
    pub feeds: Vec<FeedConfig>,
    pub pacing: Pacing,
    pub alert_after_failures: u32,
    pub digest_enabled: bool,
    pub flush_hour: Option<u32>,
}

impl CycleSettings {
    pub fn from_config(cfg: &BotConfig) -> Self {
        Self {
            base_interval: cfg.interval(),
            feeds: cfg.feeds.clone(),
            pacing: cfg.pacing.pacing(),
            alert_after_failures: cfg.alert_after_failures,
            digest_enabled: cfg.digest.enabled,
            flush_hour: cfg.digest.flush_hour,
        }
    }
}

/// Summary of one successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub next_delay: Duration,
    pub aborts: u32,
    pub entered: usize,
    pub feeds_scanned: usize,
}

pub struct CycleController {
    api: Arc<dyn ClaimApi>,
    interest: Vec<Box<dyn InterestProvider>>,
    notifier: Arc<dyn Notifier>,
    settings: CycleSettings,
    digest: Digest,
    schedule: DigestSchedule,
    phase: CyclePhase,
    consecutive_failures: u32,
    cancel: CancellationToken,
}

impl CycleController {
    pub fn new(
        api: Arc<dyn ClaimApi>,
        interest: Vec<Box<dyn InterestProvider>>,
        notifier: Arc<dyn Notifier>,
        settings: CycleSettings,
    ) -> Self {
        crate::metrics::ensure_described();
        let schedule = DigestSchedule::new(settings.flush_hour, Utc::now());
        Self {
            api,
            interest,
            notifier,
            settings,
            digest: Digest::new(),
            schedule,
            phase: CyclePhase::Idle,
            consecutive_failures: 0,
            cancel: CancellationToken::new(),
        }
    }

    /// Operator list from `interest_path`, plus the profile lists when a profile is set.
    pub fn from_config(
        cfg: &BotConfig,
        api: Arc<dyn ClaimApi>,
        pages: Arc<dyn PageFetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let mut interest: Vec<Box<dyn InterestProvider>> =
            vec![Box::new(FileInterestList::new(cfg.interest_path.clone()))];
        if let Some(profile) = &cfg.profile {
            interest.push(Box::new(ProfileInterest::new(
                pages,
                &cfg.profile_base_url,
                profile,
            )));
        }
        Self::new(api, interest, notifier, CycleSettings::from_config(cfg))
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// One discovery → claim pass over all feeds.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let started = Instant::now();
        counter!("cycles_total").increment(1);

        self.phase = CyclePhase::RefreshingSession;
        let snapshot = self.api.fetch_account_status().await?;
        let (mut session, won) = session_from(snapshot)?;
        if let Some(b) = session.budget {
            gauge!("session_budget").set(f64::from(b));
        }
        tracing::info!(user = %session.user, budget = ?session.budget, won = won.len(), "session refreshed");

        self.phase = CyclePhase::RefreshingInterest;
        let interest = self.refresh_interest().await?;
        if interest.is_empty() {
            return Err(CycleError::configuration(
                "there is no subject to win: add some to the interest list or the profile",
            ));
        }
        tracing::info!(subjects = interest.len(), "interest set loaded");

        let api = Arc::clone(&self.api);
        let scheduler = ClaimScheduler::new(api.as_ref(), self.settings.pacing)
            .with_cancel(self.cancel.clone());
        let feeds = self.settings.feeds.clone();

        let mut aborts = 0u32;
        let mut entered = 0usize;
        let mut feeds_scanned = 0usize;
        for (idx, feed) in feeds.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            if aborts > 0 {
                tracing::info!(feed = %feed.name, "budget exhausted, remaining feeds skipped");
                break;
            }
            if session.budget == Some(0) {
                tracing::info!(feed = %feed.name, "no points left, skipping scan");
                aborts += 1;
                break;
            }

            self.phase = CyclePhase::Scanning { feed: idx };
            let page = match api.fetch_page(&feed.path).await {
                Ok(p) => p,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(error = %e, feed = %feed.name, "feed unavailable, skipped");
                    continue;
                }
            };

            let gate = Eligibility::new(&interest, &won);
            let policy = if feed.resolve_bundles {
                BundlePolicy::FirstEligible(gate)
            } else {
                BundlePolicy::Skip
            };
            let candidates = extract(&page, api.as_ref(), policy).await;
            let found = candidates.len();
            let eligible = filter(candidates, &interest, &won);
            tracing::info!(feed = %feed.name, found, eligible = eligible.len(), "feed scanned");

            let report = scheduler
                .run(eligible, feed.horizon(), &mut session)
                .await;
            feeds_scanned += 1;
            aborts += report.aborts;
            entered += report.entered();
            if self.settings.digest_enabled {
                self.digest.extend(report.digest);
            }
            if let Some(e) = report.fatal {
                return Err(e.into());
            }
        }

        let delay = next_delay(self.settings.base_interval, aborts);
        self.maybe_flush_digest(&Local::now()).await;
        self.phase = CyclePhase::Idle;

        histogram!("cycle_duration_ms").record(started.elapsed().as_secs_f64() * 1_000.0);
        tracing::info!(entered, aborts, delay_secs = delay.as_secs(), "cycle finished");

        Ok(CycleReport {
            next_delay: delay,
            aborts,
            entered,
            feeds_scanned,
        })
    }

    async fn refresh_interest(&self) -> Result<InterestSet, CycleError> {
        let mut combined = InterestSet::new();
        for provider in &self.interest {
            match provider.load().await {
                Ok(set) => {
                    tracing::debug!(source = provider.name(), subjects = set.len(), "interest source loaded");
                    combined.union_with(&set);
                }
                Err(e) if provider.required() => {
                    return Err(match e.downcast::<TransportError>() {
                        Ok(t) => CycleError::Transport(t),
                        Err(e) => CycleError::configuration(format!(
                            "{} interest source: {e:#}",
                            provider.name()
                        )),
                    });
                }
                Err(e) => {
                    tracing::warn!(source = provider.name(), "interest source skipped: {e:#}");
                }
            }
        }
        Ok(combined)
    }

    async fn maybe_flush_digest<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) {
        if !self.settings.digest_enabled || !self.schedule.is_due(now) {
            return;
        }
        self.schedule.mark_flushed(now.with_timezone(&Utc));
        if let Err(e) = self.flush_digest().await {
            tracing::warn!("digest not sent, kept for next time: {e:#}");
        }
    }

    /// Send the digest now; lines are cleared only once delivered.
    pub async fn flush_digest(&mut self) -> anyhow::Result<usize> {
        if self.digest.is_empty() {
            return Ok(0);
        }
        tracing::info!(lines = self.digest.len(), "sending digest");
        self.notifier
            .notify(DIGEST_SUBJECT, &self.digest.render())
            .await?;
        Ok(self.digest.take().len())
    }

    /// Best-effort alert carrying the unflushed digest.
    pub async fn alert(&mut self, message: &str) {
        let body = if self.settings.digest_enabled && !self.digest.is_empty() {
            format!("{message}\n\n{}", self.digest.render())
        } else {
            message.to_string()
        };
        match self.notifier.notify(ALERT_SUBJECT, &body).await {
            Ok(()) => {
                self.digest.take();
            }
            Err(e) => tracing::error!("alert not delivered: {e:#}"),
        }
    }

    /// A single cycle followed by a digest flush. A configuration fault sends
    /// the same alert the polling loop would before it is returned.
    pub async fn run_once(&mut self) -> Result<CycleReport, CycleError> {
        let result = self.run_cycle().await;
        if let Err(e) = &result {
            if e.is_fatal() {
                tracing::error!(error = %e, "fatal error during check");
                self.phase = CyclePhase::Terminated;
                self.alert(&format!("error during check.\n{e}")).await;
                return result;
            }
        }
        if let Err(e) = self.flush_digest().await {
            tracing::warn!("digest not sent: {e:#}");
        }
        result
    }

    /// Cycle, sleep, repeat until cancelled or a configuration fault.
    pub async fn run(&mut self) -> Result<(), CycleError> {
        let cancel = self.cancel.clone();
        loop {
            if cancel.is_cancelled() {
                return self.stop().await;
            }

            let delay = match self.run_cycle().await {
                Ok(report) => {
                    self.consecutive_failures = 0;
                    report.next_delay
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, "fatal error during check, stopping");
                    self.phase = CyclePhase::Terminated;
                    self.alert(&format!("error during check.\n{e}")).await;
                    return Err(e);
                }
                Err(e) => {
                    self.consecutive_failures += 1;
                    tracing::warn!(error = %e, failures = self.consecutive_failures, "cycle failed, retrying after backoff");
                    if self.consecutive_failures == self.settings.alert_after_failures {
                        self.alert(&format!(
                            "{} consecutive cycles failed.\n{e}",
                            self.consecutive_failures
                        ))
                        .await;
                    }
                    self.settings.base_interval
                }
            };

            self.phase = CyclePhase::Sleeping;
            tracing::info!(delay_secs = delay.as_secs(), "waiting for next cycle");
            tokio::select! {
                _ = cancel.cancelled() => return self.stop().await,
                _ = tokio::time::sleep(delay) => {}
            }
            self.phase = CyclePhase::Idle;
        }
    }

    async fn stop(&mut self) -> Result<(), CycleError> {
        tracing::info!("cancelled, stopping");
        self.alert("Daemon was interrupted by system signal").await;
        self.phase = CyclePhase::Terminated;
        Ok(())
    }
}

fn session_from(snapshot: AccountSnapshot) -> Result<(SessionState, WonSet), CycleError> {
    let AccountSnapshot {
        user,
        token,
        points,
        won,
    } = snapshot;
    let (Some(user), Some(token)) = (user, token) else {
        return Err(CycleError::configuration(
            "no user information, please refresh cookies",
        ));
    };
    let won: WonSet = won.into_iter().collect();
    Ok((SessionState::new(user, token, points), won))
}
