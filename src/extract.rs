// src/extract.rs
//! # Candidate extraction
//! Turns a listing page into deduplicated `GiveawayCandidate`s.
//!
//! Rows without a giveaway code, a subject link or a draw timestamp are
//! skipped silently (ads and placeholders are normal). Bundle rows are
//! resolved through one extra page fetch and collapse to their first
//! eligible member.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::filter::Eligibility;
use crate::page::{ListingRow, PageModel};
use crate::platform::PageFetcher;

static RE_SUBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(app|sub)/(\d+)").expect("static regex"));

/// One discovered giveaway. Lives for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GiveawayCandidate {
    /// Platform giveaway code, unique per extraction pass.
    pub id: String,
    pub subject_id: String,
    pub subject_name: String,
    /// Detail page path; used for status checks and as claim referer.
    pub detail_ref: String,
    pub draw_at: DateTime<Utc>,
}

/// What a row's store link points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectRef {
    Item(String),
    Bundle { id: String, href: String },
}

impl SubjectRef {
    pub fn parse(href: &str) -> Option<Self> {
        let caps = RE_SUBJECT.captures(href)?;
        let id = caps[2].to_string();
        Some(match &caps[1] {
            "sub" => SubjectRef::Bundle {
                id,
                href: href.to_string(),
            },
            _ => SubjectRef::Item(id),
        })
    }
}

/// How bundle rows are treated by one extraction.
#[derive(Debug, Clone, Copy)]
pub enum BundlePolicy<'a> {
    /// Drop bundle rows.
    Skip,
    /// Fetch the bundle page and keep the first member the gate admits.
    FirstEligible(Eligibility<'a>),
}

#[derive(Debug)]
struct ParsedRow {
    id: String,
    detail_ref: String,
    name: String,
    subject: SubjectRef,
    draw_at: DateTime<Utc>,
}

/// Giveaway code from `/giveaway/<code>/<slug>` (relative or absolute).
fn giveaway_code(href: &str) -> Option<String> {
    let path = match href.find("://") {
        Some(_) => url::Url::parse(href).ok()?.path().to_string(),
        None => href.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    segments
        .by_ref()
        .find(|s| *s == "giveaway")
        .and_then(|_| segments.next())
        .map(str::to_string)
}

fn parse_row(row: ListingRow) -> Option<ParsedRow> {
    let detail_ref = row.heading_href?;
    let id = giveaway_code(&detail_ref)?;
    let subject = SubjectRef::parse(row.subject_href.as_deref()?)?;
    let secs: i64 = row.timestamp?.trim().parse().ok()?;
    let draw_at = Utc.timestamp_opt(secs, 0).single()?;
    Some(ParsedRow {
        id,
        detail_ref,
        name: row.name,
        subject,
        draw_at,
    })
}

/// Extract candidates from one listing page. Never fails: unreadable rows and
/// unreachable bundle pages are skipped.
pub async fn extract<F>(
    page: &PageModel,
    fetcher: &F,
    bundles: BundlePolicy<'_>,
) -> Vec<GiveawayCandidate>
where
    F: PageFetcher + ?Sized,
{
    let rows = page.listing_rows();
    let total = rows.len();

    let mut seen: HashSet<String> = HashSet::new();
    let mut parsed = Vec::with_capacity(total);
    for row in rows {
        let Some(p) = parse_row(row) else {
            continue;
        };
        if seen.insert(p.id.clone()) {
            parsed.push(p);
        }
    }

    let mut members_by_bundle: HashMap<String, Vec<String>> = HashMap::new();
    let mut out = Vec::with_capacity(parsed.len());
    for p in parsed {
        let subject_id = match p.subject {
            SubjectRef::Item(id) => id,
            SubjectRef::Bundle { id: bundle_id, href } => {
                let BundlePolicy::FirstEligible(gate) = bundles else {
                    tracing::debug!(id = %p.id, bundle = %bundle_id, "bundle row skipped");
                    continue;
                };
                if !members_by_bundle.contains_key(&href) {
                    let members = match fetcher.fetch_page(&href).await {
                        Ok(sub) => sub.bundle_members(),
                        Err(e) => {
                            tracing::warn!(error = %e, bundle = %bundle_id, "bundle page unavailable");
                            Vec::new()
                        }
                    };
                    members_by_bundle.insert(href.clone(), members);
                }
                let chosen = members_by_bundle
                    .get(&href)
                    .and_then(|m| m.iter().find(|s| gate.admits(s)).cloned());
                match chosen {
                    Some(member) => {
                        tracing::debug!(id = %p.id, bundle = %bundle_id, member = %member, "bundle resolved");
                        member
                    }
                    None => continue,
                }
            }
        };

        out.push(GiveawayCandidate {
            id: p.id,
            subject_id,
            subject_name: p.name,
            detail_ref: p.detail_ref,
            draw_at: p.draw_at,
        });
    }

    counter!("candidates_extracted_total").increment(out.len() as u64);
    tracing::debug!(url = %page.url(), rows = total, candidates = out.len(), "listing extracted");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_from_relative_and_absolute_refs() {
        assert_eq!(giveaway_code("/giveaway/AbCdE/some-game").as_deref(), Some("AbCdE"));
        assert_eq!(
            giveaway_code("https://www.steamgifts.com/giveaway/Zz9/x?y=1").as_deref(),
            Some("Zz9")
        );
        assert_eq!(giveaway_code("/user/someone"), None);
    }

    #[test]
    fn subject_ref_kinds() {
        assert_eq!(
            SubjectRef::parse("https://store.steampowered.com/app/440/"),
            Some(SubjectRef::Item("440".into()))
        );
        assert!(matches!(
            SubjectRef::parse("https://store.steampowered.com/sub/1234/"),
            Some(SubjectRef::Bundle { ref id, .. }) if id == "1234"
        ));
        assert_eq!(SubjectRef::parse("https://example.test/"), None);
    }

    #[test]
    fn row_missing_timestamp_is_skipped() {
        let row = ListingRow {
            heading_href: Some("/giveaway/a/x".into()),
            name: "X".into(),
            subject_href: Some("/app/1/".into()),
            timestamp: None,
        };
        assert!(parse_row(row).is_none());
    }
}
