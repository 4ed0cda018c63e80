// tests/extract_listing.rs
//
// Listing extraction against recorded pages:
// - dedup by giveaway code (first seen wins)
// - malformed rows and ads are skipped
// - bundle rows resolve to their first eligible member, one bundle fetch per page
// - extraction feeding the filter (interest {440, 570}, nothing won)

mod common;

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

use common::{fixture_page, MockPlatform};
use giveaway_claimer::{extract, filter, BundlePolicy, Eligibility, InterestSet, WonSet};

const BUNDLE_HREF: &str = "https://store.steampowered.com/sub/1234/";

#[tokio::test]
async fn main_listing_collapses_duplicate_codes() {
    let page = fixture_page("/", "listing_main.html");
    let fetcher = MockPlatform::new();

    let out = extract(&page, &fetcher, BundlePolicy::Skip).await;

    let ids: Vec<&str> = out.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["AAAAA", "BBBBB", "CCCCC", "DDDDD"]);

    // first occurrence kept, not the later "again" row
    assert_eq!(out[0].subject_name, "Portal 2");
    assert_eq!(out[0].subject_id, "440");
    assert_eq!(out[0].detail_ref, "/giveaway/AAAAA/portal-2");
    assert_eq!(out[0].draw_at, Utc.timestamp_opt(1_893_456_000, 0).unwrap());

    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(unique.len(), out.len());
    assert!(fetcher.calls().is_empty(), "no bundle rows, no extra fetch");
}

#[tokio::test]
async fn extracted_then_filtered_keeps_wanted_subjects() {
    let page = fixture_page("/", "listing_main.html");
    let fetcher = MockPlatform::new();
    let interest: InterestSet = ["440", "570"].into_iter().collect();
    let won = WonSet::default();

    let extracted = extract(&page, &fetcher, BundlePolicy::Skip).await;
    assert_eq!(extracted.len(), 4);

    let eligible = filter(extracted, &interest, &won);
    let subjects: Vec<&str> = eligible.iter().map(|c| c.subject_id.as_str()).collect();
    assert_eq!(subjects, vec!["440", "570"]);
}

#[tokio::test]
async fn bundle_rows_take_first_eligible_member() {
    let page = fixture_page("/", "listing_mixed.html");
    let fetcher = MockPlatform::new().with_fixture(BUNDLE_HREF, "bundle_1234.html");

    // 111 not wanted, 620 already won → 570 is the first eligible member
    let interest: InterestSet = ["620", "570", "70"].into_iter().collect();
    let won: WonSet = ["620"].into_iter().collect();
    let gate = Eligibility::new(&interest, &won);

    let out = extract(&page, &fetcher, BundlePolicy::FirstEligible(gate)).await;

    let pairs: Vec<(&str, &str)> = out
        .iter()
        .map(|c| (c.id.as_str(), c.subject_id.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![("EEEEE", "570"), ("HHHHH", "570"), ("JJJJJ", "70")]
    );
    // both rows point at the same bundle page
    assert_eq!(fetcher.fetched(), vec![BUNDLE_HREF.to_string()]);
}

#[tokio::test]
async fn bundle_without_eligible_member_is_dropped() {
    let page = fixture_page("/", "listing_mixed.html");
    let fetcher = MockPlatform::new().with_fixture(BUNDLE_HREF, "bundle_1234.html");
    let interest: InterestSet = ["70"].into_iter().collect();
    let won = WonSet::default();

    let out = extract(
        &page,
        &fetcher,
        BundlePolicy::FirstEligible(Eligibility::new(&interest, &won)),
    )
    .await;

    let ids: Vec<&str> = out.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["JJJJJ"]);
}

#[tokio::test]
async fn unreachable_bundle_page_skips_only_bundle_rows() {
    let page = fixture_page("/", "listing_mixed.html");
    // no page registered for the bundle href → 404
    let fetcher = MockPlatform::new();
    let interest: InterestSet = ["570", "70"].into_iter().collect();
    let won = WonSet::default();

    let out = extract(
        &page,
        &fetcher,
        BundlePolicy::FirstEligible(Eligibility::new(&interest, &won)),
    )
    .await;

    let ids: Vec<&str> = out.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["JJJJJ"]);
    assert_eq!(fetcher.fetched().len(), 1, "failed bundle fetch is not retried");
}

#[tokio::test]
async fn skip_policy_never_fetches_bundles() {
    let page = fixture_page("/", "listing_mixed.html");
    let fetcher = MockPlatform::new().with_fixture(BUNDLE_HREF, "bundle_1234.html");

    let out = extract(&page, &fetcher, BundlePolicy::Skip).await;

    let ids: Vec<&str> = out.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["JJJJJ"]);
    assert!(fetcher.fetched().is_empty());
}
