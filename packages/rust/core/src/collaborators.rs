//! Seams between the orchestrator and the outside world.
//!
//! The pipeline only talks to discovery, summarization and delivery through
//! these traits, so tests can drive it with in-memory fakes.

use std::future::Future;

use chrono::{DateTime, Utc};

use strategy_scout_artifacts::DeliveryStatus;
use strategy_scout_discovery::GithubDiscovery;
use strategy_scout_shared::{DiscoveredRepo, Result, StrategySummary};

/// Finds candidate strategy repositories.
pub trait Discover: Send + Sync {
    fn discover(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<DiscoveredRepo>>> + Send;
}

/// Turns discovered repositories into strategy summaries.
pub trait Summarize: Send + Sync {
    fn summarize(
        &self,
        repos: &[DiscoveredRepo],
    ) -> impl Future<Output = Result<Vec<StrategySummary>>> + Send;
}

/// Hands the rendered chat message to a delivery channel.
///
/// `Err` means the channel was reached and refused or failed; a channel that
/// is not configured returns `Ok(DeliveryStatus::Skipped { .. })`.
pub trait Deliver: Send + Sync {
    fn deliver(&self, message: &str) -> impl Future<Output = Result<DeliveryStatus>> + Send;
}

impl Discover for GithubDiscovery {
    async fn discover(&self, now: DateTime<Utc>) -> Result<Vec<DiscoveredRepo>> {
        GithubDiscovery::discover(self, now).await
    }
}

/// The three collaborators one pipeline run uses.
#[derive(Debug, Clone)]
pub struct Collaborators<D, S, L> {
    pub discovery: D,
    pub summarizer: S,
    pub delivery: L,
}
