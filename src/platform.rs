// src/platform.rs
//! Capabilities the engine consumes from the platform, plus the reqwest-backed
//! implementation used by the binary. Tests substitute in-memory mocks.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER};
use serde::Deserialize;
use url::Url;

use crate::config::cookies::SessionCookie;
use crate::error::TransportError;
use crate::page::{AccountSnapshot, PageModel};

/// Idempotent GET of a listing, detail, bundle or profile page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, reference: &str) -> Result<PageModel, TransportError>;
}

/// Answer to a claim submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimResponse {
    pub success: bool,
    pub remaining_budget: Option<u32>,
}

/// Account-bound calls. Detail status checks go through `fetch_page`.
#[async_trait]
pub trait ClaimApi: PageFetcher {
    async fn fetch_account_status(&self) -> Result<AccountSnapshot, TransportError>;

    /// Not idempotent: every call is a visible entry attempt.
    async fn submit_claim(
        &self,
        detail_ref: &str,
        token: &str,
        candidate_id: &str,
    ) -> Result<ClaimResponse, TransportError>;
}

pub const DEFAULT_BASE_URL: &str = "https://www.steamgifts.com";
const ACCOUNT_PATH: &str = "/giveaways/won";
const CLAIM_PATH: &str = "/ajax.php";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_4) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/59.0.3071.115 Safari/537.36";

#[derive(Debug, Clone)]
pub struct PlatformSettings {
    pub base_url: Url,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl PlatformSettings {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpPlatform {
    settings: PlatformSettings,
    client: reqwest::Client,
}

impl HttpPlatform {
    pub fn new(settings: PlatformSettings, cookies: &[SessionCookie]) -> anyhow::Result<Self> {
        let jar = reqwest::cookie::Jar::default();
        for c in cookies {
            let path = c.path.as_deref().unwrap_or("/");
            // no domain: host-only cookie for the platform itself
            let (raw, origin) = match c.domain.as_deref() {
                Some(domain) => {
                    let host = domain.trim_start_matches('.');
                    let origin = Url::parse(&format!("{}://{}/", settings.base_url.scheme(), host))
                        .unwrap_or_else(|_| settings.base_url.clone());
                    (
                        format!("{}={}; Domain={}; Path={}", c.name, c.value, domain, path),
                        origin,
                    )
                }
                None => (
                    format!("{}={}; Path={}", c.name, c.value, path),
                    settings.base_url.clone(),
                ),
            };
            jar.add_cookie_str(&raw, &origin);
        }
        tracing::debug!(cookies = cookies.len(), "session cookies loaded");

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
        );
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

        let client = reqwest::Client::builder()
            .cookie_provider(std::sync::Arc::new(jar))
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self { settings, client })
    }

    /// Relative references resolve against the platform; absolute ones
    /// (bundle pages, external profiles) pass through.
    fn resolve(&self, reference: &str) -> Result<Url, TransportError> {
        self.settings
            .base_url
            .join(reference)
            .map_err(|e| TransportError::decode(reference, e.to_string()))
    }

    async fn read_body(&self, url: &Url, response: reqwest::Response) -> Result<String, TransportError> {
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(|e| map_reqwest_error(url, e))
    }
}

#[async_trait]
impl PageFetcher for HttpPlatform {
    async fn fetch_page(&self, reference: &str) -> Result<PageModel, TransportError> {
        let url = self.resolve(reference)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| map_reqwest_error(&url, e))?;
        let body = self.read_body(&url, response).await?;
        tracing::debug!(url = %url, bytes = body.len(), "page fetched");
        Ok(PageModel::new(url.to_string(), body))
    }
}

#[async_trait]
impl ClaimApi for HttpPlatform {
    async fn fetch_account_status(&self) -> Result<AccountSnapshot, TransportError> {
        Ok(self.fetch_page(ACCOUNT_PATH).await?.account_snapshot())
    }

    async fn submit_claim(
        &self,
        detail_ref: &str,
        token: &str,
        candidate_id: &str,
    ) -> Result<ClaimResponse, TransportError> {
        let url = self.resolve(CLAIM_PATH)?;
        let referer = self.resolve(detail_ref)?;
        let params = [
            ("xsrf_token", token),
            ("code", candidate_id),
            ("do", "entry_insert"),
        ];
        let response = self
            .client
            .post(url.clone())
            .header(REFERER, referer.as_str())
            .form(&params)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&url, e))?;
        let body = self.read_body(&url, response).await?;
        tracing::debug!(id = candidate_id, answer = %body, "claim answer");
        parse_claim_answer(url.as_str(), &body)
    }
}

fn map_reqwest_error(url: &Url, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_decode() {
        TransportError::decode(url.as_str(), err.to_string())
    } else {
        TransportError::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

// {"type":"success","entry_count":"108","points":"147"}
#[derive(Debug, Deserialize)]
struct ClaimAnswer {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    points: Option<serde_json::Value>,
    #[serde(default)]
    msg: Option<String>,
}

pub(crate) fn parse_claim_answer(url: &str, body: &str) -> Result<ClaimResponse, TransportError> {
    let answer: ClaimAnswer = serde_json::from_str(body.trim())
        .map_err(|e| TransportError::decode(url, format!("claim answer: {e}")))?;

    let remaining_budget = match answer.points {
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        _ => None,
    };
    let success = answer.kind.eq_ignore_ascii_case("success");
    if !success {
        tracing::debug!(kind = %answer.kind, msg = ?answer.msg, "claim declined");
    }

    Ok(ClaimResponse {
        success,
        remaining_budget,
    })
}
