//! Per-dimension heuristics.
//!
//! Each rule starts from its configured baseline, applies adjustments, and
//! returns the unclamped value. A rule that needs a summary field which was
//! never produced returns [`MissingField`] instead of guessing.

use std::sync::LazyLock;

use regex::Regex;

use strategy_scout_shared::{
    CapitalRules, ComplexityRules, DataAvailabilityRules, ExchangeRules, StrategySummary,
    TrackRecordRules,
};

/// A rule input the summarizer did not provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingField(pub &'static str);

pub type RuleResult = std::result::Result<i32, MissingField>;

// ---------------------------------------------------------------------------
// Timeframe parsing
// ---------------------------------------------------------------------------

static MINUTES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:m|min|mins|minute|minutes)\b").expect("valid regex")
});

static HOURS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:h|hr|hrs|hour|hours)\b").expect("valid regex")
});

/// Coarse reading of a free-text timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    Tick,
    Minutes(u32),
    /// Anything an hour or longer, or text we cannot read.
    Longer,
}

impl Timeframe {
    pub fn parse(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("tick") {
            return Self::Tick;
        }
        if let Some(minutes) = MINUTES_RE
            .captures(&lower)
            .and_then(|c| c[1].parse::<u32>().ok())
        {
            return if minutes < 60 {
                Self::Minutes(minutes)
            } else {
                Self::Longer
            };
        }
        if HOURS_RE.is_match(&lower) {
            return Self::Longer;
        }
        // "minute bars" with no number still counts as sub-hour
        if lower.contains("minute") {
            return Self::Minutes(1);
        }
        Self::Longer
    }

    pub fn is_sub_hour(&self) -> bool {
        matches!(self, Self::Tick | Self::Minutes(_))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|kw| haystack.contains(&kw.to_lowercase()))
}

fn count_matches(haystack: &str, keywords: &[String]) -> i32 {
    keywords
        .iter()
        .filter(|kw| haystack.contains(&kw.to_lowercase()))
        .count() as i32
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn asset_class(summary: &StrategySummary) -> Result<String, MissingField> {
    non_empty(summary.asset_class.as_deref())
        .map(|a| a.trim().to_lowercase())
        .ok_or(MissingField("asset_class"))
}

fn indicators(summary: &StrategySummary) -> Result<&[String], MissingField> {
    summary
        .indicators
        .as_deref()
        .ok_or(MissingField("indicators"))
}

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// Higher when the strategy runs on freely available data.
///
/// Never defaults: absent data requirements are themselves a signal.
pub fn data_availability(summary: &StrategySummary, rules: &DataAvailabilityRules) -> RuleResult {
    let mut score = rules.baseline;
    let requirements = non_empty(summary.data_requirements.as_deref()).map(str::to_lowercase);
    let scanned = format!(
        "{} {}",
        summary.concept.to_lowercase(),
        requirements.as_deref().unwrap_or_default()
    );

    let expensive = count_matches(&scanned, &rules.expensive_data_keywords);
    score -= expensive * rules.expensive_data_penalty;

    match requirements.as_deref() {
        None => score -= rules.unspecified_penalty,
        Some(text) if expensive == 0 && contains_any(text, &rules.commodity_data_keywords) => {
            score += rules.commodity_data_bonus;
        }
        Some(_) => {}
    }

    Ok(score)
}

/// Higher when the strategy is simpler to implement and run.
pub fn computational_complexity(summary: &StrategySummary, rules: &ComplexityRules) -> RuleResult {
    let count = indicators(summary)?.len();
    let mut score = rules.baseline;

    if count <= rules.few_indicators_max {
        score += rules.few_indicators_bonus;
    } else if count <= rules.moderate_indicators_max {
        score += rules.moderate_indicators_bonus;
    } else if count > rules.many_indicators_over {
        score -= rules.many_indicators_penalty;
    }

    let logic_text = format!(
        "{} {} {}",
        summary.concept,
        summary.entry_logic.as_deref().unwrap_or_default(),
        summary.exit_logic.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    if contains_any(&logic_text, &rules.ml_keywords) {
        score -= rules.ml_penalty;
    }

    for logic in [&summary.entry_logic, &summary.exit_logic] {
        let explicit = non_empty(logic.as_deref())
            .is_some_and(|text| !text.to_lowercase().contains("no explicit"));
        if explicit {
            score += rules.explicit_logic_bonus;
        }
    }

    Ok(score)
}

/// Higher when the strategy works with a small account.
pub fn capital_requirement(summary: &StrategySummary, rules: &CapitalRules) -> RuleResult {
    let asset = asset_class(summary)?;
    let mut score = rules.baseline + rules.asset_adjustments.get(&asset).copied().unwrap_or(0);

    let concept = summary.concept.to_lowercase();
    for (keyword, adjustment) in &rules.concept_adjustments {
        if concept.contains(&keyword.to_lowercase()) {
            score += adjustment;
        }
    }

    let sub_hour = non_empty(summary.timeframe.as_deref())
        .is_some_and(|tf| Timeframe::parse(tf).is_sub_hour());
    if sub_hour {
        score -= rules.sub_hour_penalty;
    }

    Ok(score)
}

/// Higher when the strategy is easy to run on retail venues.
pub fn exchange_compatibility(summary: &StrategySummary, rules: &ExchangeRules) -> RuleResult {
    let asset = asset_class(summary)?;
    let mut score = rules.baseline + rules.asset_adjustments.get(&asset).copied().unwrap_or(0);

    if contains_any(&summary.concept.to_lowercase(), &rules.derivatives_keywords) {
        score += rules.derivatives_bonus;
    }

    match non_empty(summary.timeframe.as_deref()).map(Timeframe::parse) {
        Some(Timeframe::Tick) => score -= rules.tick_penalty,
        Some(Timeframe::Minutes(m)) if m < rules.short_minutes_under => {
            score -= rules.short_minutes_penalty;
        }
        _ => {}
    }

    if let Some(tag) = non_empty(summary.compatibility.as_deref()) {
        score += rules
            .compatibility_adjustments
            .get(&tag.trim().to_lowercase())
            .copied()
            .unwrap_or(0);
    }

    Ok(score)
}

/// Higher when there is evidence the edge is real and not crowded.
pub fn track_record(summary: &StrategySummary, rules: &TrackRecordRules) -> RuleResult {
    let listed = indicators(summary)?;
    let mut score = rules.baseline;

    let text = summary.full_text().to_lowercase();
    let evidence = count_matches(&text, &rules.evidence_keywords) * rules.evidence_bonus;
    score += evidence.min(rules.max_evidence_bonus);

    let crowded = rules
        .crowded_indicators
        .iter()
        .filter(|c| listed.iter().any(|i| i.trim().eq_ignore_ascii_case(c)))
        .count();
    if crowded >= 3 {
        score -= rules.crowded_three_penalty;
    } else if crowded >= 2 {
        score -= rules.crowded_two_penalty;
    }

    score -= rules.public_source_penalty;
    Ok(score)
}
