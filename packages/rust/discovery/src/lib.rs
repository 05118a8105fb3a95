//! GitHub repository discovery.
//!
//! Searches the GitHub repository search API once per configured keyword for
//! repositories pushed within the lookback window, then de-duplicates by URL,
//! filters by preferred language, and optionally requires a README.
//!
//! A failed keyword search is logged and skipped. Discovery only fails when
//! every keyword search failed, so the caller can degrade to an empty batch.

mod parser;

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::{debug, info, instrument, warn};
use url::Url;

use strategy_scout_shared::{DiscoveredRepo, DiscoveryConfig, Result, ScoutError, secret_from_env};

/// Maximum response size we accept from the search API (10 MB).
const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

/// User-Agent string for discovery requests. GitHub rejects requests without one.
const USER_AGENT: &str = concat!("strategy-scout/", env!("CARGO_PKG_VERSION"));

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

// ---------------------------------------------------------------------------
// Query building
// ---------------------------------------------------------------------------

/// Search qualifier string for one keyword.
pub fn search_query(keyword: &str, pushed_after: NaiveDate, min_stars: u32) -> String {
    format!(
        "\"{keyword}\" pushed:>{} stars:>={min_stars}",
        pushed_after.format("%Y-%m-%d")
    )
}

/// Whether a repository passes the language filter. Unknown language passes.
pub fn language_allowed(repo: &DiscoveredRepo, preferred: Option<&str>) -> bool {
    match (preferred, repo.language.as_deref()) {
        (Some(want), Some(have)) => want.eq_ignore_ascii_case(have),
        _ => true,
    }
}

// ---------------------------------------------------------------------------
// GithubDiscovery
// ---------------------------------------------------------------------------

/// Client for the GitHub repository search API.
#[derive(Debug, Clone)]
pub struct GithubDiscovery {
    client: Client,
    api_base: Url,
    config: DiscoveryConfig,
}

impl GithubDiscovery {
    /// Build a client, reading the optional token from the configured env var.
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self> {
        let token = secret_from_env(&config.token_env);
        if token.is_none() {
            debug!(env = %config.token_env, "no GitHub token, using anonymous rate limits");
        }
        Self::new(config, token)
    }

    pub fn new(config: &DiscoveryConfig, token: Option<String>) -> Result<Self> {
        let api_base = Url::parse(&config.api_base).map_err(|e| {
            ScoutError::config(format!("discovery.api_base '{}': {e}", config.api_base))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ScoutError::config("GitHub token contains invalid characters"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScoutError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base,
            config: config.clone(),
        })
    }

    /// Run every keyword search and return the filtered, de-duplicated repos.
    #[instrument(skip_all, fields(keywords = self.config.keywords.len()))]
    pub async fn discover(&self, now: DateTime<Utc>) -> Result<Vec<DiscoveredRepo>> {
        let pushed_after = (now - chrono::Duration::hours(self.config.lookback_hours)).date_naive();
        let preferred = self.config.preferred_language.as_deref();

        let mut seen = std::collections::HashSet::new();
        let mut results = Vec::new();
        let mut failures = 0usize;

        for (i, keyword) in self.config.keywords.iter().enumerate() {
            if i > 0 {
                self.pause().await;
            }
            info!(%keyword, "searching");

            let repos = match self.search(keyword, pushed_after).await {
                Ok(repos) => repos,
                Err(e) => {
                    warn!(%keyword, error = %e, "search failed, skipping keyword");
                    failures += 1;
                    continue;
                }
            };

            for repo in repos {
                if !seen.insert(repo.url.clone()) {
                    continue;
                }
                if !language_allowed(&repo, preferred) {
                    debug!(repo = %repo.full_name, language = ?repo.language, "language filtered");
                    continue;
                }
                if self.config.require_readme {
                    self.pause().await;
                    if !self.has_readme(&repo.full_name).await {
                        debug!(repo = %repo.full_name, "no README, skipping");
                        continue;
                    }
                }
                info!(repo = %repo.full_name, stars = repo.stars, "found");
                results.push(repo);
            }
        }

        if !self.config.keywords.is_empty() && failures == self.config.keywords.len() {
            return Err(ScoutError::Network(format!(
                "all {failures} keyword searches failed"
            )));
        }

        info!(found = results.len(), failed_keywords = failures, "discovery complete");
        Ok(results)
    }

    async fn search(&self, keyword: &str, pushed_after: NaiveDate) -> Result<Vec<DiscoveredRepo>> {
        let url = self.endpoint("search/repositories")?;
        let query = search_query(keyword, pushed_after, self.config.min_stars);
        let per_page = self.config.per_page.to_string();

        let response = self
            .client
            .get(url.clone())
            .query(&[
                ("q", query.as_str()),
                ("sort", "updated"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ScoutError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::Network(format!("{url}: HTTP {status}")));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(ScoutError::validation(format!(
                    "{url}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
                )));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScoutError::Network(format!("{url}: failed to read body: {e}")))?;

        parser::parse_search_response(&body)
    }

    /// A README lookup that fails for any reason counts as absent.
    async fn has_readme(&self, full_name: &str) -> bool {
        let Ok(url) = self.endpoint(&format!("repos/{full_name}/readme")) else {
            return false;
        };
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(repo = %full_name, error = %e, "README check failed");
                false
            }
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.api_base.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{path}"))
            .map_err(|e| ScoutError::config(format!("bad endpoint {base}/{path}: {e}")))
    }

    async fn pause(&self) {
        if self.config.request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.request_delay_ms)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture() -> String {
        std::fs::read_to_string("../../../fixtures/github/search-repositories.json")
            .expect("read search fixture")
    }

    fn config(server: &MockServer, keywords: &[&str]) -> DiscoveryConfig {
        DiscoveryConfig {
            api_base: server.uri(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            request_delay_ms: 0,
            require_readme: false,
            ..DiscoveryConfig::default()
        }
    }

    fn now() -> DateTime<Utc> {
        "2026-03-07T06:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_search_query_format() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 6).unwrap();
        assert_eq!(
            search_query("mean reversion", date, 2),
            "\"mean reversion\" pushed:>2026-03-06 stars:>=2"
        );
    }

    #[test]
    fn test_language_filter_keeps_unknown() {
        let mut repo = DiscoveredRepo {
            url: "https://github.com/a/b".into(),
            full_name: "a/b".into(),
            description: String::new(),
            stars: 1,
            language: None,
            created_at: None,
            topics: vec![],
        };
        assert!(language_allowed(&repo, Some("Python")));
        repo.language = Some("python".into());
        assert!(language_allowed(&repo, Some("Python")));
        repo.language = Some("Go".into());
        assert!(!language_allowed(&repo, Some("Python")));
        assert!(language_allowed(&repo, None));
    }

    #[test]
    fn test_bad_api_base_is_config_error() {
        let config = DiscoveryConfig {
            api_base: "not a url".into(),
            ..DiscoveryConfig::default()
        };
        assert!(matches!(
            GithubDiscovery::new(&config, None),
            Err(ScoutError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn test_discover_filters_and_dedups() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("sort", "updated"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
            .expect(2)
            .mount(&server)
            .await;

        let discovery =
            GithubDiscovery::new(&config(&server, &["trading bot", "backtest"]), None).unwrap();
        let repos = discovery.discover(now()).await.unwrap();

        // Same fixture for both keywords: the URL dedup keeps one copy.
        // bob/pairs-engine is Rust and filtered; carol has no language and is kept.
        let names: Vec<&str> = repos.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, ["alice/rsi-reversal-bot", "carol/funding-notes"]);
    }

    #[tokio::test]
    async fn test_discover_sends_query_and_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param(
                "q",
                "\"momentum strategy\" pushed:>2026-03-06 stars:>=2",
            ))
            .and(header("authorization", "Bearer secret-token"))
            .and(header("accept", GITHUB_ACCEPT))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"items": []}"#))
            .expect(1)
            .mount(&server)
            .await;

        let discovery = GithubDiscovery::new(
            &config(&server, &["momentum strategy"]),
            Some("secret-token".into()),
        )
        .unwrap();
        let repos = discovery.discover(now()).await.unwrap();
        assert!(repos.is_empty());
    }

    #[tokio::test]
    async fn test_failed_keyword_is_skipped() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("q", "\"broken\" pushed:>2026-03-06 stars:>=2"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("q", "\"backtest\" pushed:>2026-03-06 stars:>=2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
            .mount(&server)
            .await;

        let discovery =
            GithubDiscovery::new(&config(&server, &["broken", "backtest"]), None).unwrap();
        let repos = discovery.discover(now()).await.unwrap();
        assert_eq!(repos.len(), 2);
    }

    #[tokio::test]
    async fn test_all_keywords_failing_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let discovery = GithubDiscovery::new(&config(&server, &["a", "b"]), None).unwrap();
        let result = discovery.discover(now()).await;
        assert!(matches!(result, Err(ScoutError::Network(_))));
    }

    #[tokio::test]
    async fn test_readme_required() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/repos/alice/rsi-reversal-bot/readme"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/repos/carol/funding-notes/readme"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut cfg = config(&server, &["backtest"]);
        cfg.require_readme = true;
        let repos = GithubDiscovery::new(&cfg, None)
            .unwrap()
            .discover(now())
            .await
            .unwrap();

        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].full_name, "alice/rsi-reversal-bot");
    }
}
