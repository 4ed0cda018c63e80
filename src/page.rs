// src/page.rs
//! # Page model
//! A fetched page kept as raw markup plus the typed views the engine needs.
//!
//! This is the only module that knows about the HTML library. Every view
//! parses the document on demand and returns owned values, so a `PageModel`
//! can be held across `.await` points without pinning a DOM to the task.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css}: {e:?}"))
}

static ROW: Lazy<Selector> = Lazy::new(|| selector("div.giveaway__row-outer-wrap"));
static ROW_HEADING: Lazy<Selector> = Lazy::new(|| selector("a.giveaway__heading__name"));
static ROW_ICON: Lazy<Selector> = Lazy::new(|| selector("a.giveaway__icon"));
static ROW_TIMESTAMP: Lazy<Selector> = Lazy::new(|| selector("span[data-timestamp]"));

static BUNDLE_MEMBER: Lazy<Selector> = Lazy::new(|| selector("div.tab_item[data-ds-appid]"));

static DETAIL_FRAME: Lazy<Selector> =
    Lazy::new(|| selector("div.widget-container, div.sidebar--wide"));
static DETAIL_ERROR: Lazy<Selector> = Lazy::new(|| selector("div.sidebar__error"));
static DETAIL_INSERT: Lazy<Selector> = Lazy::new(|| selector("div.sidebar__entry-insert"));

static NAV_USER: Lazy<Selector> = Lazy::new(|| selector("a.nav__avatar-outer-wrap"));
static NAV_LOGOUT: Lazy<Selector> = Lazy::new(|| selector("div.js__logout[data-form]"));
static NAV_XSRF: Lazy<Selector> = Lazy::new(|| selector("input[name='xsrf_token']"));
static NAV_POINTS: Lazy<Selector> = Lazy::new(|| selector("span.nav__points"));
static WON_ROW: Lazy<Selector> = Lazy::new(|| selector("div.table__row-inner-wrap"));
static WON_RECEIVED: Lazy<Selector> = Lazy::new(|| {
    selector("div[class='table__gift-feedback-received is-hidden']")
});
static WON_THUMB: Lazy<Selector> = Lazy::new(|| selector("a.table_image_thumbnail[style]"));

static SCRIPT: Lazy<Selector> = Lazy::new(|| selector("script"));
static WISHLIST_ROW: Lazy<Selector> = Lazy::new(|| selector("div[id^='game_']"));
static FOLLOWED_ROW: Lazy<Selector> = Lazy::new(|| selector("div[data-appid]"));

static RE_APP_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/apps/(\d+)/").expect("static regex"));

/// One listing row as found on the page. Fields stay optional: rows that are
/// ads or placeholders simply miss some of them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingRow {
    /// `/giveaway/<code>/<slug>`
    pub heading_href: Option<String>,
    pub name: String,
    /// Store link of the item or bundle being given away.
    pub subject_href: Option<String>,
    /// Unix seconds, still textual.
    pub timestamp: Option<String>,
}

/// What the detail page says about entering right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
    /// Entry control present and visible.
    Open,
    /// Entry control present but hidden: the account is already in.
    AlreadyEntered,
    /// No entry control at all (own giveaway, region locked, ended...).
    NoEntry,
    /// Sidebar error: not enough points.
    BudgetExhausted,
    /// Not a giveaway detail page (login wall, maintenance).
    Unrecognized,
}

/// Raw account header values from the "won" page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountSnapshot {
    pub user: Option<String>,
    pub token: Option<String>,
    pub points: Option<u32>,
    pub won: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageModel {
    url: String,
    html: String,
}

impl PageModel {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }

    /// Listing rows in document order.
    pub fn listing_rows(&self) -> Vec<ListingRow> {
        let doc = self.document();
        doc.select(&ROW)
            .map(|row| {
                let heading = row.select(&ROW_HEADING).next();
                ListingRow {
                    heading_href: heading.and_then(|a| attr(a, "href")),
                    name: heading.map(text_of).unwrap_or_default(),
                    subject_href: row.select(&ROW_ICON).find_map(|a| {
                        attr(a, "href").filter(|h| h.contains("/app/") || h.contains("/sub/"))
                    }),
                    timestamp: row
                        .select(&ROW_TIMESTAMP)
                        .next()
                        .and_then(|s| attr(s, "data-timestamp")),
                }
            })
            .collect()
    }

    /// Member subject ids of a bundle page, in document order.
    pub fn bundle_members(&self) -> Vec<String> {
        let doc = self.document();
        doc.select(&BUNDLE_MEMBER)
            .filter_map(|el| attr(el, "data-ds-appid"))
            .filter(|id| is_subject_id(id))
            .collect()
    }

    pub fn claim_status(&self) -> ClaimStatus {
        let doc = self.document();
        if doc.select(&DETAIL_FRAME).next().is_none() {
            return ClaimStatus::Unrecognized;
        }
        if doc.select(&DETAIL_ERROR).next().is_some() {
            return ClaimStatus::BudgetExhausted;
        }
        let mut inserts = doc.select(&DETAIL_INSERT).peekable();
        if inserts.peek().is_none() {
            return ClaimStatus::NoEntry;
        }
        let hidden = inserts.any(|el| {
            el.value()
                .attr("class")
                .is_some_and(|c| c.split_whitespace().any(|k| k == "is-hidden"))
        });
        if hidden {
            ClaimStatus::AlreadyEntered
        } else {
            ClaimStatus::Open
        }
    }

    pub fn account_snapshot(&self) -> AccountSnapshot {
        let doc = self.document();

        let user = doc
            .select(&NAV_USER)
            .next()
            .and_then(|a| attr(a, "href"));

        let token = doc
            .select(&NAV_LOGOUT)
            .next()
            .and_then(|el| el.value().attr("data-form"))
            .and_then(token_from_form)
            .or_else(|| {
                doc.select(&NAV_XSRF)
                    .next()
                    .and_then(|el| attr(el, "value"))
            });

        let points = doc.select(&NAV_POINTS).next().and_then(|el| {
            let digits: String = text_of(el).chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()
        });

        let won = doc
            .select(&WON_ROW)
            .filter(|row| row.select(&WON_RECEIVED).next().is_some())
            .filter_map(|row| {
                let style = row.select(&WON_THUMB).next()?.value().attr("style")?;
                RE_APP_IMAGE
                    .captures(style)
                    .map(|c| c[1].to_string())
            })
            .collect();

        AccountSnapshot {
            user,
            token,
            points,
            won,
        }
    }

    /// Subject ids from an external wishlist page. Newer pages embed the list
    /// as JSON in a script; older ones render one `game_<id>` row per entry.
    pub fn wishlist_subjects(&self) -> Vec<String> {
        #[derive(Deserialize)]
        struct WishlistEntry {
            appid: u64,
        }

        let doc = self.document();
        let mut out: Vec<String> = Vec::new();
        for script in doc.select(&SCRIPT) {
            let text: String = script.text().collect();
            let Some(start) = text.find("g_rgWishlistData") else {
                continue;
            };
            let tail = &text[start..];
            let (Some(open), Some(close)) = (tail.find("[{"), tail.find("}];")) else {
                tracing::debug!(url = %self.url, "wishlist script without data array");
                continue;
            };
            if close < open {
                continue;
            }
            match serde_json::from_str::<Vec<WishlistEntry>>(&tail[open..close + 2]) {
                Ok(entries) => out.extend(entries.into_iter().map(|e| e.appid.to_string())),
                Err(e) => tracing::debug!(error = %e, url = %self.url, "wishlist data unreadable"),
            }
        }

        out.extend(doc.select(&WISHLIST_ROW).filter_map(|el| {
            let id = el.value().attr("id")?;
            let (_, num) = id.split_once('_')?;
            is_subject_id(num).then(|| num.to_string())
        }));
        out
    }

    pub fn followed_subjects(&self) -> Vec<String> {
        let doc = self.document();
        doc.select(&FOLLOWED_ROW)
            .filter_map(|el| attr(el, "data-appid"))
            .filter(|id| is_subject_id(id))
            .collect()
    }
}

/// Subject ids are the platform's decimal item ids.
pub fn is_subject_id(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn attr(el: ElementRef<'_>, name: &str) -> Option<String> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// `data-form` carries the logout form as a query string; the xsrf token is
/// its last 32 characters when the field name is missing.
fn token_from_form(form: &str) -> Option<String> {
    url::form_urlencoded::parse(form.as_bytes())
        .find(|(k, _)| k == "xsrf_token")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            let chars: Vec<char> = form.chars().collect();
            (chars.len() >= 32).then(|| chars[chars.len() - 32..].iter().collect())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_page_states() {
        let frame = |inner: &str| {
            PageModel::new(
                "/giveaway/x/",
                format!(r#"<html><body><div class="widget-container">{inner}</div></body></html>"#),
            )
        };

        assert_eq!(
            frame(r#"<div class="sidebar__entry-insert">Enter</div>"#).claim_status(),
            ClaimStatus::Open
        );
        assert_eq!(
            frame(r#"<div class="sidebar__entry-insert is-hidden">Enter</div>"#).claim_status(),
            ClaimStatus::AlreadyEntered
        );
        assert_eq!(
            frame(r#"<div class="sidebar__error">Not Enough Points</div>"#).claim_status(),
            ClaimStatus::BudgetExhausted
        );
        assert_eq!(frame("").claim_status(), ClaimStatus::NoEntry);
        assert_eq!(
            PageModel::new("/", "<html><body>login</body></html>").claim_status(),
            ClaimStatus::Unrecognized
        );
    }

    #[test]
    fn token_prefers_named_field() {
        assert_eq!(
            token_from_form("do=logout&xsrf_token=abc123").as_deref(),
            Some("abc123")
        );
        let tail = "0123456789abcdef0123456789abcdef";
        assert_eq!(
            token_from_form(&format!("junk{tail}")).as_deref(),
            Some(tail)
        );
        assert_eq!(token_from_form("short"), None);
    }

    #[test]
    fn subject_ids_are_decimal() {
        assert!(is_subject_id("440"));
        assert!(!is_subject_id(""));
        assert!(!is_subject_id("44a"));
    }
}
