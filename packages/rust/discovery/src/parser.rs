//! GitHub repository search response parser.
//!
//! Parses the JSON body of `GET /search/repositories` into
//! [`DiscoveredRepo`] entries, dropping items without a usable
//! `owner/name` or browser URL.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use strategy_scout_shared::{DiscoveredRepo, Result, ScoutError};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<RawRepo>,
}

/// The subset of a GitHub repository object we read.
#[derive(Debug, Deserialize)]
struct RawRepo {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    html_url: String,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    language: Option<String>,
    created_at: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
}

/// Matches `owner/name`.
static FULL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.-]+/[\w.-]+$").expect("full name regex"));

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a search response body.
pub(crate) fn parse_search_response(body: &str) -> Result<Vec<DiscoveredRepo>> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|e| ScoutError::parse(format!("invalid search response: {e}")))?;

    Ok(response.items.into_iter().filter_map(normalize).collect())
}

fn normalize(raw: RawRepo) -> Option<DiscoveredRepo> {
    if !FULL_NAME_RE.is_match(&raw.full_name) || raw.html_url.trim().is_empty() {
        return None;
    }
    Some(DiscoveredRepo {
        url: raw.html_url,
        full_name: raw.full_name,
        description: raw.description.unwrap_or_default(),
        stars: raw.stargazers_count,
        language: raw.language.filter(|l| !l.is_empty()),
        created_at: raw.created_at,
        topics: raw.topics,
    })
}
