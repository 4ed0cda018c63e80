// tests/common/mod.rs
//
// In-memory platform for integration tests: canned pages keyed by reference,
// a scripted account snapshot and per-candidate claim answers. Every call is
// recorded so tests can assert on ordering and on what was never touched.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use giveaway_claimer::page::{AccountSnapshot, PageModel};
use giveaway_claimer::platform::{ClaimApi, ClaimResponse, PageFetcher};
use giveaway_claimer::{GiveawayCandidate, TransportError};

pub fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("fixture {}: {e}", path.display()))
}

pub fn fixture_page(reference: &str, name: &str) -> PageModel {
    PageModel::new(reference, fixture(name))
}

pub fn candidate(id: &str, subject: &str, draw_at: DateTime<Utc>) -> GiveawayCandidate {
    GiveawayCandidate {
        id: id.into(),
        subject_id: subject.into(),
        subject_name: format!("Game {subject}"),
        detail_ref: format!("/giveaway/{id}/game-{subject}"),
        draw_at,
    }
}

pub fn logged_in(points: u32, won: &[&str]) -> AccountSnapshot {
    AccountSnapshot {
        user: Some("/user/tester".into()),
        token: Some("0123456789abcdef0123456789abcdef".into()),
        points: Some(points),
        won: won.iter().map(|s| s.to_string()).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Account,
    Fetch(String),
    Submit(String),
}

#[derive(Default)]
pub struct MockPlatform {
    pages: Mutex<HashMap<String, Result<PageModel, TransportError>>>,
    account: Mutex<Option<Result<AccountSnapshot, TransportError>>>,
    claims: Mutex<HashMap<String, Result<ClaimResponse, TransportError>>>,
    calls: Mutex<Vec<Call>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, reference: &str, page: PageModel) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(reference.to_string(), Ok(page));
        self
    }

    pub fn with_fixture(self, reference: &str, fixture_name: &str) -> Self {
        let page = fixture_page(reference, fixture_name);
        self.with_page(reference, page)
    }

    pub fn with_page_error(self, reference: &str, err: TransportError) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(reference.to_string(), Err(err));
        self
    }

    pub fn with_account(self, snapshot: AccountSnapshot) -> Self {
        *self.account.lock().unwrap() = Some(Ok(snapshot));
        self
    }

    pub fn with_account_error(self, err: TransportError) -> Self {
        *self.account.lock().unwrap() = Some(Err(err));
        self
    }

    pub fn with_claim(self, candidate_id: &str, answer: Result<ClaimResponse, TransportError>) -> Self {
        self.claims
            .lock()
            .unwrap()
            .insert(candidate_id.to_string(), answer);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Fetch(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn submitted(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Submit(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl PageFetcher for MockPlatform {
    async fn fetch_page(&self, reference: &str) -> Result<PageModel, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Fetch(reference.to_string()));
        self.pages
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .unwrap_or_else(|| {
                Err(TransportError::Status {
                    url: reference.to_string(),
                    status: 404,
                })
            })
    }
}

#[async_trait]
impl ClaimApi for MockPlatform {
    async fn fetch_account_status(&self) -> Result<AccountSnapshot, TransportError> {
        self.calls.lock().unwrap().push(Call::Account);
        self.account
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(AccountSnapshot::default()))
    }

    async fn submit_claim(
        &self,
        _detail_ref: &str,
        _token: &str,
        candidate_id: &str,
    ) -> Result<ClaimResponse, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Submit(candidate_id.to_string()));
        self.claims
            .lock()
            .unwrap()
            .get(candidate_id)
            .cloned()
            .unwrap_or(Ok(ClaimResponse {
                success: true,
                remaining_budget: None,
            }))
    }
}

/// Notifier that keeps every (subject, body) it was handed.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl giveaway_claimer::notify::Notifier for RecordingNotifier {
    async fn notify(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("mail relay down");
        }
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
