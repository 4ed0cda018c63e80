// src/config/bot.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::platform::DEFAULT_BASE_URL;
use crate::schedule::Pacing;

pub const ENV_CONFIG_PATH: &str = "GIVEAWAY_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/claimer.toml";

const WISHLIST_FEED_PATH: &str = "/giveaways/search?type=wishlist";
const FIVE_WEEKS_SECS: u64 = 5 * 7 * 24 * 3600;

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_interval_secs() -> u64 {
    3600
}
fn default_alert_after() -> u32 {
    3
}
fn default_profile_base_url() -> String {
    "https://steamcommunity.com/id/".to_string()
}
fn default_interest_path() -> PathBuf {
    PathBuf::from("config/interest.toml")
}
fn default_cookies_path() -> PathBuf {
    PathBuf::from("config/cookies.json")
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Base poll interval; multiplied by `1 + aborts` after each cycle.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Consecutive failed cycles before an alert goes out.
    #[serde(default = "default_alert_after")]
    pub alert_after_failures: u32,
    /// External profile whose wishlist/followed lists extend the interest set.
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default = "default_profile_base_url")]
    pub profile_base_url: String,
    #[serde(default = "default_interest_path")]
    pub interest_path: PathBuf,
    #[serde(default = "default_cookies_path")]
    pub cookies_path: PathBuf,
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub mail: Option<MailConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct PacingConfig {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_secs: 3,
            max_secs: 6,
        }
    }
}

impl PacingConfig {
    pub fn pacing(&self) -> Pacing {
        Pacing::new(
            Duration::from_secs(self.min_secs),
            Duration::from_secs(self.max_secs),
        )
    }
}

/// One listing page scanned every cycle.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FeedConfig {
    pub name: String,
    pub path: String,
    pub horizon_secs: u64,
    #[serde(default = "default_true")]
    pub resolve_bundles: bool,
}

impl FeedConfig {
    pub fn horizon(&self) -> Duration {
        Duration::from_secs(self.horizon_secs)
    }

    /// Near-term main feed, then the long-horizon wishlist feed.
    pub fn defaults() -> Vec<FeedConfig> {
        vec![
            FeedConfig {
                name: "main".into(),
                path: "/".into(),
                horizon_secs: 3600,
                resolve_bundles: true,
            },
            FeedConfig {
                name: "wishlist".into(),
                path: WISHLIST_FEED_PATH.into(),
                horizon_secs: FIVE_WEEKS_SECS,
                resolve_bundles: true,
            },
        ]
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DigestConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Local hour (0-23) at which the digest goes out; a 24h age limit applies regardless.
    #[serde(default)]
    pub flush_hour: Option<u32>,
    #[serde(default)]
    pub subject_tag: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flush_hour: Some(0),
            subject_tag: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MailConfig {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub username: String,
    /// "ENV" means: read from SMTP_PASS
    #[serde(default)]
    pub password: String,
    /// Defaults to `username`.
    #[serde(default)]
    pub from: Option<String>,
    pub recipient: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WebhookConfig {
    pub url: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            interval_secs: default_interval_secs(),
            alert_after_failures: default_alert_after(),
            profile: None,
            profile_base_url: default_profile_base_url(),
            interest_path: default_interest_path(),
            cookies_path: default_cookies_path(),
            metrics_addr: None,
            pacing: PacingConfig::default(),
            feeds: FeedConfig::defaults(),
            digest: DigestConfig::default(),
            mail: None,
            webhook: None,
        }
    }
}

impl BotConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: BotConfig = toml::from_str(s).context("parsing claimer config")?;
        cfg.normalize()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&data)?;

        // Relative list/cookie paths are relative to the config file.
        if let Some(dir) = path.parent() {
            for p in [&mut cfg.interest_path, &mut cfg.cookies_path] {
                if p.is_relative() && !p.exists() {
                    let candidate = dir.join(&*p);
                    if candidate.exists() {
                        *p = candidate;
                    }
                }
            }
        }
        Ok(cfg)
    }

    /// Resolve the config path:
    /// 1) explicit path (CLI)
    /// 2) $GIVEAWAY_CONFIG_PATH
    /// 3) config/claimer.toml
    ///
    /// Falls back to defaults when none of them exists.
    pub fn load_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load_from_file(p);
        }
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from_file(&default);
        }
        tracing::warn!("no config file found, using defaults");
        Self::default().normalize()
    }

    fn normalize(mut self) -> Result<Self> {
        if self.interval_secs == 0 {
            bail!("interval_secs must be positive");
        }
        url::Url::parse(&self.base_url)
            .with_context(|| format!("invalid base_url {}", self.base_url))?;

        if self.feeds.is_empty() {
            self.feeds = FeedConfig::defaults();
        }
        if self.digest.flush_hour.is_some_and(|h| h > 23) {
            tracing::warn!(hour = ?self.digest.flush_hour, "flush_hour out of range, ignored");
            self.digest.flush_hour = None;
        }
        self.profile = self
            .profile
            .take()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        if let Some(mail) = self.mail.as_mut() {
            if mail.password.trim().eq_ignore_ascii_case("env") {
                mail.password = env::var("SMTP_PASS")
                    .map_err(|_| anyhow!("Missing SMTP_PASS env var"))?;
            }
        }
        Ok(self)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gets_defaults() {
        let cfg = BotConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.interval_secs, 3600);
        assert_eq!(cfg.feeds, FeedConfig::defaults());
        assert_eq!(cfg.feeds[1].horizon(), Duration::from_secs(FIVE_WEEKS_SECS));
        assert_eq!(cfg.pacing, PacingConfig::default());
        assert!(cfg.digest.enabled);
    }

    #[test]
    fn zero_interval_rejected() {
        assert!(BotConfig::from_toml_str("interval_secs = 0").is_err());
    }

    #[test]
    fn feeds_and_digest_parse() {
        let cfg = BotConfig::from_toml_str(
            r#"
interval_secs = 600
profile = "  someone "

[pacing]
min_secs = 1
max_secs = 2

[[feeds]]
name = "wishlist"
path = "/giveaways/search?type=wishlist"
horizon_secs = 86400
resolve_bundles = false

[digest]
enabled = false
flush_hour = 42
"#,
        )
        .unwrap();
        assert_eq!(cfg.interval(), Duration::from_secs(600));
        assert_eq!(cfg.profile.as_deref(), Some("someone"));
        assert_eq!(cfg.feeds.len(), 1);
        assert!(!cfg.feeds[0].resolve_bundles);
        assert!(!cfg.digest.enabled);
        assert_eq!(cfg.digest.flush_hour, None);
        assert_eq!(
            cfg.pacing.pacing(),
            Pacing::new(Duration::from_secs(1), Duration::from_secs(2))
        );
    }
}
