// src/lib.rs
// Public library surface for the binary and the integration tests.

pub mod config;
pub mod cycle;
pub mod digest;
pub mod error;
pub mod extract;
pub mod filter;
pub mod interest;
pub mod metrics;
pub mod notify;
pub mod page;
pub mod platform;
pub mod schedule;

// ---- Re-exports for stable public API ----
pub use crate::cycle::{next_delay, CycleController, CyclePhase, CycleReport, CycleSettings};
pub use crate::error::{CycleError, TransportError};
pub use crate::extract::{extract, BundlePolicy, GiveawayCandidate};
pub use crate::filter::{filter, Eligibility, InterestSet, WonSet};
pub use crate::notify::{Notifier, NotifierMux};
pub use crate::platform::{ClaimApi, ClaimResponse, HttpPlatform, PageFetcher};
pub use crate::schedule::{ClaimOutcome, ClaimScheduler, Pacing, ScanReport, SessionState};
