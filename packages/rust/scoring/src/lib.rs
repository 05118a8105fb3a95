//! Rule-based feasibility scoring.
//!
//! Scores each deduplicated strategy on five dimensions in [1,10] and flags
//! (never removes) strategies whose text contains a configured exclusion
//! keyword. Pure and deterministic: no network or store access.

pub mod rules;

use tracing::{info, instrument, warn};

use strategy_scout_shared::{
    DIMENSION_MAX, DIMENSION_MIN, DedupedStrategy, Dimension, FeasibilityScore, ScoredStrategy,
    ScoringConfig, StrategySummary,
};

use crate::rules::{MissingField, RuleResult};

/// First configured keyword found in `text`, case-insensitively.
///
/// Returns the keyword as configured, not as it appears in the text.
pub fn find_exclusion<'k>(text: &str, keywords: &'k [String]) -> Option<&'k str> {
    let haystack = text.to_lowercase();
    keywords
        .iter()
        .find(|kw| haystack.contains(&kw.to_lowercase()))
        .map(String::as_str)
}

fn clamp_dimension(raw: i32) -> u8 {
    raw.clamp(i32::from(DIMENSION_MIN), i32::from(DIMENSION_MAX)) as u8
}

/// Feasibility scorer over a fixed rule set.
#[derive(Debug, Clone)]
pub struct FeasibilityScorer {
    config: ScoringConfig,
}

impl FeasibilityScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score a single summary.
    pub fn score(&self, summary: &StrategySummary) -> FeasibilityScore {
        let mut defaulted = Vec::new();
        let mut values = [0u8; 5];

        for (slot, dimension) in values.iter_mut().zip(Dimension::ALL) {
            *slot = match self.evaluate(dimension, summary) {
                Ok(raw) => clamp_dimension(raw),
                Err(MissingField(field)) => {
                    warn!(
                        id = %summary.id,
                        dimension = dimension.label(),
                        field,
                        default = self.config.missing_field_default,
                        "rule input missing, using default"
                    );
                    defaulted.push(dimension);
                    self.config.missing_field_default
                }
            };
        }

        let [
            data_availability,
            computational_complexity,
            capital_requirement,
            exchange_compatibility,
            track_record,
        ] = values;
        let total = values.iter().map(|v| u16::from(*v)).sum::<u16>() as u8;

        let matched_keyword =
            find_exclusion(&summary.full_text(), &self.config.exclusion_keywords).map(String::from);

        FeasibilityScore {
            data_availability,
            computational_complexity,
            capital_requirement,
            exchange_compatibility,
            track_record,
            total,
            exclusion_flag: matched_keyword.is_some(),
            matched_keyword,
            defaulted,
        }
    }

    /// Score every strategy, preserving order. Output length equals input length.
    #[instrument(skip_all, fields(batch = batch.len()))]
    pub fn score_batch(&self, batch: Vec<DedupedStrategy>) -> Vec<ScoredStrategy> {
        let scored: Vec<ScoredStrategy> = batch
            .into_iter()
            .map(|deduped| {
                let feasibility = self.score(&deduped.summary);
                info!(
                    id = %deduped.summary.id,
                    total = feasibility.total,
                    excluded = feasibility.exclusion_flag,
                    "scored"
                );
                ScoredStrategy {
                    deduped,
                    feasibility,
                }
            })
            .collect();

        let excluded = scored
            .iter()
            .filter(|s| s.feasibility.exclusion_flag)
            .count();
        info!(scored = scored.len(), excluded, "scoring complete");
        scored
    }

    fn evaluate(&self, dimension: Dimension, summary: &StrategySummary) -> RuleResult {
        let c = &self.config;
        match dimension {
            Dimension::DataAvailability => rules::data_availability(summary, &c.data_availability),
            Dimension::ComputationalComplexity => {
                rules::computational_complexity(summary, &c.computational_complexity)
            }
            Dimension::CapitalRequirement => {
                rules::capital_requirement(summary, &c.capital_requirement)
            }
            Dimension::ExchangeCompatibility => {
                rules::exchange_compatibility(summary, &c.exchange_compatibility)
            }
            Dimension::TrackRecord => rules::track_record(summary, &c.track_record),
        }
    }
}
