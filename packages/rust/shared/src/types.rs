//! Core domain types and stage artifact schemas.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoutError};

/// Current schema version for the persisted strategy store.
pub const STORE_SCHEMA_VERSION: u32 = 1;

/// Inclusive bounds for a single feasibility dimension.
pub const DIMENSION_MIN: u8 = 1;
pub const DIMENSION_MAX: u8 = 10;

// ---------------------------------------------------------------------------
// RunDate
// ---------------------------------------------------------------------------

/// Date key naming every artifact produced by one pipeline run (`YYYY-MM-DD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunDate(pub NaiveDate);

impl RunDate {
    /// Today's date in UTC.
    pub fn today() -> Self {
        Self(Utc::now().date_naive())
    }
}

impl std::fmt::Display for RunDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl std::str::FromStr for RunDate {
    type Err = ScoutError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self)
            .map_err(|e| ScoutError::validation(format!("invalid run date '{s}': {e}")))
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// A named pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discover,
    Summarize,
    Dedup,
    Score,
    Report,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Discover,
        Stage::Summarize,
        Stage::Dedup,
        Stage::Score,
        Stage::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::Summarize => "summarize",
            Self::Dedup => "dedup",
            Self::Score => "score",
            Self::Report => "report",
        }
    }

    /// The stage whose artifact this stage consumes.
    pub fn previous(&self) -> Option<Stage> {
        match self {
            Self::Discover => None,
            Self::Summarize => Some(Self::Discover),
            Self::Dedup => Some(Self::Summarize),
            Self::Score => Some(Self::Dedup),
            Self::Report => Some(Self::Score),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = ScoutError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ScoutError::validation(format!("unknown stage '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Discovery output
// ---------------------------------------------------------------------------

/// A candidate repository found by discovery, before summarization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredRepo {
    /// Browser URL of the repository.
    pub url: String,
    /// `owner/name`.
    pub full_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stars: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
}

impl DiscoveredRepo {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() || self.full_name.trim().is_empty() {
            return Err(ScoutError::validation(
                "discovered repo without url or full_name",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StrategySummary
// ---------------------------------------------------------------------------

/// Natural-language summary of one discovered strategy repository.
///
/// Only `id` and `concept` are required. The remaining fields are optional so
/// that a field the summarizer never produced can be told apart from an empty
/// one; the feasibility rules rely on that distinction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    /// Source repository reference (unique key in the store).
    pub id: String,
    /// Core trading concept.
    pub concept: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_logic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_logic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicators: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_requirements: Option<String>,
    /// Exchange/venue compatibility tag assigned by the summarizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_at: Option<DateTime<Utc>>,
}

impl StrategySummary {
    /// Minimal summary with only the required fields set.
    pub fn new(id: impl Into<String>, concept: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            concept: concept.into(),
            entry_logic: None,
            exit_logic: None,
            indicators: None,
            timeframe: None,
            asset_class: None,
            data_requirements: None,
            compatibility: None,
            discovered_at: None,
        }
    }

    /// Text used for similarity comparison.
    ///
    /// Field order is fixed: concept, entry logic, exit logic, indicators.
    pub fn corpus_text(&self) -> String {
        let indicators = self
            .indicators
            .as_deref()
            .map(|list| list.join(" "))
            .unwrap_or_default();

        [
            self.concept.as_str(),
            self.entry_logic.as_deref().unwrap_or_default(),
            self.exit_logic.as_deref().unwrap_or_default(),
            indicators.as_str(),
        ]
        .iter()
        .filter(|part| !part.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Every textual field concatenated, for keyword scanning.
    pub fn full_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.concept.as_str()];
        for field in [
            &self.entry_logic,
            &self.exit_logic,
            &self.timeframe,
            &self.asset_class,
            &self.data_requirements,
            &self.compatibility,
        ] {
            if let Some(value) = field.as_deref() {
                parts.push(value);
            }
        }
        let indicators = self
            .indicators
            .as_deref()
            .map(|list| list.join(" "))
            .unwrap_or_default();
        parts.push(&indicators);
        parts.join(" ")
    }

    /// Check the required fields are present.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ScoutError::validation("strategy summary has an empty id"));
        }
        if self.concept.trim().is_empty() {
            return Err(ScoutError::validation(format!(
                "strategy summary '{}' has an empty concept",
                self.id
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StrategyRecord
// ---------------------------------------------------------------------------

/// A persisted strategy, keyed by its summary id in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecord {
    /// Latest summary seen for this identifier.
    pub summary: StrategySummary,
    /// Earliest sighting. Never moves forward.
    pub first_seen: DateTime<Utc>,
    /// Most recent sighting.
    pub last_seen: DateTime<Utc>,
    /// Identifier this record was matched against as duplicate/similar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
}

impl StrategyRecord {
    /// Record for a strategy seen at `seen_at`.
    pub fn sighted(
        summary: StrategySummary,
        seen_at: DateTime<Utc>,
        duplicate_of: Option<String>,
    ) -> Self {
        Self {
            summary,
            first_seen: seen_at,
            last_seen: seen_at,
            duplicate_of,
        }
    }

    /// Store key.
    pub fn id(&self) -> &str {
        &self.summary.id
    }
}

// ---------------------------------------------------------------------------
// Similarity
// ---------------------------------------------------------------------------

/// Novelty class derived from the best similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Duplicate,
    Similar,
    Novel,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Similar => "similar",
            Self::Novel => "novel",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of comparing one strategy against the comparison corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// Identifier of the strategy being classified.
    pub target: String,
    /// Identifier of the closest corpus entry, if any candidate existed.
    pub best_match: Option<String>,
    /// Best cosine similarity, in [0,1].
    pub score: f64,
    pub classification: Classification,
}

/// Dedup stage artifact entry: a summary annotated with its similarity result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupedStrategy {
    #[serde(flatten)]
    pub summary: StrategySummary,
    pub similarity_score: f64,
    #[serde(default)]
    pub duplicate_of: Option<String>,
    pub classification: Classification,
}

impl DedupedStrategy {
    /// Annotate `summary` with `result`.
    ///
    /// `duplicate_of` is only carried for duplicate/similar classifications.
    pub fn annotate(summary: StrategySummary, result: &SimilarityResult) -> Self {
        let duplicate_of = match result.classification {
            Classification::Novel => None,
            Classification::Duplicate | Classification::Similar => result.best_match.clone(),
        };
        Self {
            summary,
            similarity_score: result.score,
            duplicate_of,
            classification: result.classification,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.summary.validate()?;
        if !self.similarity_score.is_finite() || !(0.0..=1.0).contains(&self.similarity_score) {
            return Err(ScoutError::validation(format!(
                "'{}': similarity_score {} outside [0,1]",
                self.summary.id, self.similarity_score
            )));
        }
        if self.classification != Classification::Novel && self.duplicate_of.is_none() {
            return Err(ScoutError::validation(format!(
                "'{}': {} without duplicate_of",
                self.summary.id, self.classification
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Feasibility
// ---------------------------------------------------------------------------

/// One of the five feasibility dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    DataAvailability,
    ComputationalComplexity,
    CapitalRequirement,
    ExchangeCompatibility,
    TrackRecord,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::DataAvailability,
        Dimension::ComputationalComplexity,
        Dimension::CapitalRequirement,
        Dimension::ExchangeCompatibility,
        Dimension::TrackRecord,
    ];

    /// Human-readable label used in digests.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DataAvailability => "Data availability",
            Self::ComputationalComplexity => "Computational complexity",
            Self::CapitalRequirement => "Capital requirement",
            Self::ExchangeCompatibility => "Exchange/regulatory compatibility",
            Self::TrackRecord => "Evidentiary track record",
        }
    }
}

/// Rule-based feasibility assessment of one strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeasibilityScore {
    pub data_availability: u8,
    pub computational_complexity: u8,
    pub capital_requirement: u8,
    pub exchange_compatibility: u8,
    pub track_record: u8,
    /// Sum of the five dimensions, in [5,50].
    pub total: u8,
    pub exclusion_flag: bool,
    #[serde(default)]
    pub matched_keyword: Option<String>,
    /// Dimensions scored at the configured default because a rule input was missing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defaulted: Vec<Dimension>,
}

impl FeasibilityScore {
    pub fn get(&self, dimension: Dimension) -> u8 {
        match dimension {
            Dimension::DataAvailability => self.data_availability,
            Dimension::ComputationalComplexity => self.computational_complexity,
            Dimension::CapitalRequirement => self.capital_requirement,
            Dimension::ExchangeCompatibility => self.exchange_compatibility,
            Dimension::TrackRecord => self.track_record,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut sum: u16 = 0;
        for dimension in Dimension::ALL {
            let value = self.get(dimension);
            if !(DIMENSION_MIN..=DIMENSION_MAX).contains(&value) {
                return Err(ScoutError::validation(format!(
                    "{} score {value} outside [{DIMENSION_MIN},{DIMENSION_MAX}]",
                    dimension.label()
                )));
            }
            sum += u16::from(value);
        }
        if sum != u16::from(self.total) {
            return Err(ScoutError::validation(format!(
                "total {} does not match dimension sum {sum}",
                self.total
            )));
        }
        if self.exclusion_flag != self.matched_keyword.is_some() {
            return Err(ScoutError::validation(
                "exclusion_flag and matched_keyword disagree",
            ));
        }
        Ok(())
    }
}

/// Score stage artifact entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredStrategy {
    #[serde(flatten)]
    pub deduped: DedupedStrategy,
    #[serde(flatten)]
    pub feasibility: FeasibilityScore,
}

impl ScoredStrategy {
    pub fn validate(&self) -> Result<()> {
        self.deduped.validate()?;
        self.feasibility
            .validate()
            .map_err(|e| ScoutError::validation(format!("'{}': {e}", self.deduped.summary.id)))
    }
}
