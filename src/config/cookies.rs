// src/config/cookies.rs
//! Session cookies for the platform client: either a `name -> value` map or a
//! list of `{name, value, domain?, path?}` records, in JSON or TOML (`cookies = ...`).

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CookieFile {
    List(Vec<SessionCookie>),
    Map(BTreeMap<String, String>),
}

pub fn load_cookies(path: &Path) -> Result<Vec<SessionCookie>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading cookies from {}", path.display()))?;
    parse_cookies(&content)
}

pub fn parse_cookies(s: &str) -> Result<Vec<SessionCookie>> {
    if let Ok(file) = serde_json::from_str::<CookieFile>(s) {
        return Ok(clean(file));
    }

    #[derive(Deserialize)]
    struct TomlCookies {
        cookies: CookieFile,
    }
    toml::from_str::<TomlCookies>(s)
        .map(|t| clean(t.cookies))
        .map_err(|e| anyhow!("unsupported cookie file format: {e}"))
}

fn clean(file: CookieFile) -> Vec<SessionCookie> {
    let cookies = match file {
        CookieFile::List(v) => v,
        CookieFile::Map(m) => m
            .into_iter()
            .map(|(name, value)| SessionCookie {
                name,
                value,
                domain: None,
                path: None,
            })
            .collect(),
    };
    cookies
        .into_iter()
        .filter(|c| !c.name.trim().is_empty())
        .map(|mut c| {
            c.name = c.name.trim().to_string();
            c.value = c.value.trim().to_string();
            c.domain = c.domain.filter(|d| !d.trim().is_empty());
            c.path = c.path.filter(|p| !p.trim().is_empty());
            c
        })
        .collect()
}
