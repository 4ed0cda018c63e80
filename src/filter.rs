// src/filter.rs
//! # Eligibility
//! Interest and won sets, and the pure filter that keeps only candidates the
//! operator wants and has not already obtained.

use std::collections::BTreeSet;

use crate::extract::GiveawayCandidate;

/// Subject ids the operator wants to win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterestSet {
    subjects: BTreeSet<String>,
}

impl InterestSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, subject_id: impl Into<String>) -> bool {
        self.subjects.insert(subject_id.into())
    }

    pub fn contains(&self, subject_id: &str) -> bool {
        self.subjects.contains(subject_id)
    }

    pub fn union_with(&mut self, other: &InterestSet) {
        self.subjects.extend(other.subjects.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.subjects.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for InterestSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            subjects: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Subject ids the account already obtained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WonSet {
    subjects: BTreeSet<String>,
}

impl WonSet {
    pub fn contains(&self, subject_id: &str) -> bool {
        self.subjects.contains(subject_id)
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for WonSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            subjects: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Borrowed view over both sets; also used by the extractor to pick a bundle member.
#[derive(Debug, Clone, Copy)]
pub struct Eligibility<'a> {
    pub interest: &'a InterestSet,
    pub won: &'a WonSet,
}

impl<'a> Eligibility<'a> {
    pub fn new(interest: &'a InterestSet, won: &'a WonSet) -> Self {
        Self { interest, won }
    }

    pub fn admits(&self, subject_id: &str) -> bool {
        self.interest.contains(subject_id) && !self.won.contains(subject_id)
    }
}

/// Keeps candidates whose subject is wanted and not yet won. Input order is preserved.
pub fn filter(
    candidates: Vec<GiveawayCandidate>,
    interest: &InterestSet,
    won: &WonSet,
) -> Vec<GiveawayCandidate> {
    let gate = Eligibility::new(interest, won);
    candidates
        .into_iter()
        .filter(|c| gate.admits(&c.subject_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn cand(id: &str, subject: &str) -> GiveawayCandidate {
        GiveawayCandidate {
            id: id.into(),
            subject_id: subject.into(),
            subject_name: format!("Game {subject}"),
            detail_ref: format!("/giveaway/{id}/"),
            draw_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn keeps_wanted_and_not_won() {
        let interest: InterestSet = ["440", "570", "10"].into_iter().collect();
        let won: WonSet = ["10"].into_iter().collect();
        let input = vec![cand("a", "440"), cand("b", "12"), cand("c", "10"), cand("d", "570")];

        let out = filter(input.clone(), &interest, &won);
        let ids: Vec<&str> = out.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
        assert!(out.iter().all(|c| input.contains(c)));
    }

    #[test]
    fn empty_interest_yields_nothing() {
        let out = filter(vec![cand("a", "440")], &InterestSet::new(), &WonSet::default());
        assert!(out.is_empty());
    }

    #[test]
    fn union_merges_sources() {
        let mut a: InterestSet = ["1"].into_iter().collect();
        let b: InterestSet = ["2", "1"].into_iter().collect();
        a.union_with(&b);
        assert_eq!(a.len(), 2);
        assert!(a.contains("2"));
    }
}
