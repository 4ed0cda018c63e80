// src/config/interest.rs
//! Operator interest list file. Accepted shapes:
//! - TOML: `subjects = ["440", 570]` or a `[subjects]` table of `id = "name" | true`
//! - JSON: `["440", 570]` or `{"440": "Team Fortress 2", "570": true}`
//!
//! Entries that are not decimal subject ids are dropped.

use anyhow::{anyhow, Context, Result};
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::filter::InterestSet;
use crate::page::is_subject_id;

#[derive(Deserialize)]
#[serde(untagged)]
enum Entry {
    Number(u64),
    Text(String),
    Other(IgnoredAny),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MapValue {
    Flag(bool),
    Name(String),
    Other(IgnoredAny),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Entries {
    List(Vec<Entry>),
    Map(BTreeMap<String, MapValue>),
}

/// Missing file is an empty list; unreadable or malformed file is an error.
pub fn load_interest_list(path: &Path) -> Result<InterestSet> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no interest list file");
        return Ok(InterestSet::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading interest list from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_interest_list(&content, &ext)
        .with_context(|| format!("parsing interest list {}", path.display()))
}

pub fn parse_interest_list(s: &str, hint_ext: &str) -> Result<InterestSet> {
    let try_toml = hint_ext == "toml" || s.contains("subjects");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported interest list format"))
}

fn parse_toml(s: &str) -> Result<InterestSet> {
    #[derive(Deserialize)]
    struct TomlInterest {
        subjects: Entries,
    }
    let v: TomlInterest = toml::from_str(s)?;
    Ok(collect(v.subjects))
}

fn parse_json(s: &str) -> Result<InterestSet> {
    let v: Entries = serde_json::from_str(s)?;
    Ok(collect(v))
}

fn collect(entries: Entries) -> InterestSet {
    let ids: Vec<String> = match entries {
        Entries::List(items) => items
            .into_iter()
            .filter_map(|e| match e {
                Entry::Number(n) => Some(n.to_string()),
                Entry::Text(t) => Some(t.trim().to_string()),
                Entry::Other(_) => None,
            })
            .collect(),
        Entries::Map(map) => map
            .into_iter()
            .filter_map(|(k, v)| match v {
                MapValue::Flag(false) | MapValue::Other(_) => None,
                MapValue::Flag(true) | MapValue::Name(_) => Some(k.trim().to_string()),
            })
            .collect(),
    };

    let mut set = InterestSet::new();
    for id in ids {
        if is_subject_id(&id) {
            set.insert(id);
        } else {
            tracing::debug!(entry = %id, "skipping malformed interest entry");
        }
    }
    set
}
