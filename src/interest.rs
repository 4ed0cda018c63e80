// src/interest.rs
//! Sources of the interest set, refreshed at the start of every cycle and unioned.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::interest::load_interest_list;
use crate::filter::InterestSet;
use crate::platform::PageFetcher;

#[async_trait]
pub trait InterestProvider: Send + Sync {
    async fn load(&self) -> Result<InterestSet>;
    fn name(&self) -> &'static str;
    /// A failing required provider fails the cycle; optional ones are logged and skipped.
    fn required(&self) -> bool {
        false
    }
}

/// Operator-curated list on disk, re-read every cycle so edits apply without a restart.
pub struct FileInterestList {
    path: PathBuf,
}

impl FileInterestList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl InterestProvider for FileInterestList {
    async fn load(&self) -> Result<InterestSet> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || load_interest_list(&path)).await?
    }

    fn name(&self) -> &'static str {
        "operator-list"
    }

    fn required(&self) -> bool {
        true
    }
}

/// Fixed set, e.g. passed on the command line or in tests.
pub struct StaticInterest(pub InterestSet);

#[async_trait]
impl InterestProvider for StaticInterest {
    async fn load(&self) -> Result<InterestSet> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Wishlist and followed items of an external store profile.
pub struct ProfileInterest {
    fetcher: Arc<dyn PageFetcher>,
    profile_url: String,
}

impl ProfileInterest {
    /// `profile_base` like `https://steamcommunity.com/id/`.
    pub fn new(fetcher: Arc<dyn PageFetcher>, profile_base: &str, profile: &str) -> Self {
        Self {
            fetcher,
            profile_url: format!("{}/{}", profile_base.trim_end_matches('/'), profile),
        }
    }
}

#[async_trait]
impl InterestProvider for ProfileInterest {
    async fn load(&self) -> Result<InterestSet> {
        let mut set = InterestSet::new();
        let mut failures = Vec::new();

        match self
            .fetcher
            .fetch_page(&format!("{}/wishlist/", self.profile_url))
            .await
        {
            Ok(page) => {
                let ids = page.wishlist_subjects();
                tracing::debug!(entries = ids.len(), "wishlist parsed");
                ids.into_iter().for_each(|id| {
                    set.insert(id);
                });
            }
            Err(e) => failures.push(e),
        }

        match self
            .fetcher
            .fetch_page(&format!("{}/followedgames/", self.profile_url))
            .await
        {
            Ok(page) => {
                let ids = page.followed_subjects();
                tracing::debug!(entries = ids.len(), "followed list parsed");
                ids.into_iter().for_each(|id| {
                    set.insert(id);
                });
            }
            Err(e) => failures.push(e),
        }

        match failures.len() {
            0 => Ok(set),
            1 => {
                tracing::warn!(error = %failures[0], "profile list partially unavailable");
                Ok(set)
            }
            _ => Err(anyhow!(failures.swap_remove(0))),
        }
    }

    fn name(&self) -> &'static str {
        "profile"
    }
}
