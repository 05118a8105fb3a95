//! Application configuration for Strategy Scout.
//!
//! User config lives at `~/.strategy-scout/strategy-scout.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never stored in the file, only the names of the env vars
//! that hold them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoutError};
use crate::types::{DIMENSION_MAX, DIMENSION_MIN};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "strategy-scout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".strategy-scout";

// ---------------------------------------------------------------------------
// Config structs (matching strategy-scout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub similarity: SimilarityConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub summarizer: SummarizerConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,
}

impl AppConfig {
    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.similarity.validate()?;
        self.scoring.validate()?;
        Ok(())
    }
}

/// `[paths]` section. Relative paths resolve against the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the persistent strategy store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory for date-keyed stage artifacts.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// Directory for rendered digests.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// Store file name inside `data_dir`.
    #[serde(default = "default_store_file")]
    pub store_file: String,
}

impl PathsConfig {
    /// Full path to the strategy store file.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_file)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            artifacts_dir: default_artifacts_dir(),
            reports_dir: default_reports_dir(),
            store_file: default_store_file(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("data/daily_scans")
}
fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_store_file() -> String {
    "strategy_db.json".into()
}

/// Upper bound for `similarity.score_decimals`.
pub const MAX_SCORE_DECIMALS: u32 = 10;

/// `[similarity]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Scores at or above this classify as duplicate.
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f64,

    /// Scores at or above this (and below `duplicate_threshold`) classify as similar.
    #[serde(default = "default_similar_threshold")]
    pub similar_threshold: f64,

    /// Drop English stop words before vectorizing.
    #[serde(default = "default_true")]
    pub remove_stop_words: bool,

    /// Decimal places scores are rounded to before classification.
    #[serde(default = "default_score_decimals")]
    pub score_decimals: u32,
}

impl SimilarityConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("duplicate_threshold", self.duplicate_threshold),
            ("similar_threshold", self.similar_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScoutError::config(format!(
                    "similarity.{name} = {value} is outside [0,1]"
                )));
            }
        }
        if self.similar_threshold > self.duplicate_threshold {
            return Err(ScoutError::config(format!(
                "similarity.similar_threshold ({}) exceeds duplicate_threshold ({})",
                self.similar_threshold, self.duplicate_threshold
            )));
        }
        if self.score_decimals > MAX_SCORE_DECIMALS {
            return Err(ScoutError::config(format!(
                "similarity.score_decimals = {} exceeds {MAX_SCORE_DECIMALS}",
                self.score_decimals
            )));
        }
        Ok(())
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: default_duplicate_threshold(),
            similar_threshold: default_similar_threshold(),
            remove_stop_words: true,
            score_decimals: default_score_decimals(),
        }
    }
}

fn default_duplicate_threshold() -> f64 {
    0.8
}
fn default_similar_threshold() -> f64 {
    0.5
}
fn default_score_decimals() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Scoring rules
// ---------------------------------------------------------------------------

/// `[scoring]` section: exclusion keywords plus per-dimension rule weights.
///
/// Every dimension starts from its `baseline`, applies its adjustments, and is
/// clamped to [1,10].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Score assigned to a dimension whose required input field is missing.
    pub missing_field_default: u8,

    /// Case-insensitive substrings that flag (never remove) a strategy.
    pub exclusion_keywords: Vec<String>,

    pub data_availability: DataAvailabilityRules,
    pub computational_complexity: ComplexityRules,
    pub capital_requirement: CapitalRules,
    pub exchange_compatibility: ExchangeRules,
    pub track_record: TrackRecordRules,
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        if !(DIMENSION_MIN..=DIMENSION_MAX).contains(&self.missing_field_default) {
            return Err(ScoutError::config(format!(
                "scoring.missing_field_default = {} is outside [{DIMENSION_MIN},{DIMENSION_MAX}]",
                self.missing_field_default
            )));
        }
        if self.exclusion_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ScoutError::config(
                "scoring.exclusion_keywords contains an empty keyword",
            ));
        }
        Ok(())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            missing_field_default: 5,
            exclusion_keywords: vec!["arbitrage".into()],
            data_availability: DataAvailabilityRules::default(),
            computational_complexity: ComplexityRules::default(),
            capital_requirement: CapitalRules::default(),
            exchange_compatibility: ExchangeRules::default(),
            track_record: TrackRecordRules::default(),
        }
    }
}

/// Data availability: higher means the strategy runs on freely available data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataAvailabilityRules {
    pub baseline: i32,
    /// Bonus when explicit data-requirements text names only commodity data.
    pub commodity_data_bonus: i32,
    pub commodity_data_keywords: Vec<String>,
    /// Penalty per expensive-data keyword found.
    pub expensive_data_penalty: i32,
    pub expensive_data_keywords: Vec<String>,
    /// Penalty when no data-requirements text was provided at all.
    pub unspecified_penalty: i32,
}

impl Default for DataAvailabilityRules {
    fn default() -> Self {
        Self {
            baseline: 7,
            commodity_data_bonus: 1,
            commodity_data_keywords: strings(&["ohlcv", "price", "volume", "candle"]),
            expensive_data_penalty: 2,
            expensive_data_keywords: strings(&[
                "alternative data",
                "satellite",
                "sentiment",
                "news feed",
                "order flow",
                "level 2",
                "options chain",
                "dark pool",
            ]),
            unspecified_penalty: 1,
        }
    }
}

/// Computational complexity: higher means simpler to implement and run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityRules {
    pub baseline: i32,
    pub few_indicators_max: usize,
    pub few_indicators_bonus: i32,
    pub moderate_indicators_max: usize,
    pub moderate_indicators_bonus: i32,
    /// Indicator counts strictly above this are penalized.
    pub many_indicators_over: usize,
    pub many_indicators_penalty: i32,
    pub ml_keywords: Vec<String>,
    pub ml_penalty: i32,
    /// Bonus for each of entry/exit logic that is explicitly described.
    pub explicit_logic_bonus: i32,
}

impl Default for ComplexityRules {
    fn default() -> Self {
        Self {
            baseline: 5,
            few_indicators_max: 2,
            few_indicators_bonus: 2,
            moderate_indicators_max: 4,
            moderate_indicators_bonus: 1,
            many_indicators_over: 6,
            many_indicators_penalty: 2,
            ml_keywords: strings(&[
                "machine learning",
                "neural network",
                "deep learning",
                "reinforcement learning",
                "lstm",
                "transformer",
            ]),
            ml_penalty: 3,
            explicit_logic_bonus: 1,
        }
    }
}

/// Capital requirement: higher means the strategy works with a small account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapitalRules {
    pub baseline: i32,
    /// Adjustment keyed by lowercase asset class.
    pub asset_adjustments: BTreeMap<String, i32>,
    /// Adjustment applied once per keyword found in the concept.
    pub concept_adjustments: BTreeMap<String, i32>,
    /// Penalty for timeframes shorter than one hour (fees dominate small accounts).
    pub sub_hour_penalty: i32,
}

impl Default for CapitalRules {
    fn default() -> Self {
        Self {
            baseline: 5,
            asset_adjustments: adjustments(&[
                ("crypto", 3),
                ("forex", 1),
                ("futures", -1),
                ("options", -1),
                ("equities", -1),
            ]),
            concept_adjustments: adjustments(&[("arbitrage", -2), ("market making", -2)]),
            sub_hour_penalty: 1,
        }
    }
}

/// Exchange/regulatory compatibility: higher means easier to run on retail venues.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeRules {
    pub baseline: i32,
    pub asset_adjustments: BTreeMap<String, i32>,
    /// Bonus when the concept mentions any derivatives keyword.
    pub derivatives_bonus: i32,
    pub derivatives_keywords: Vec<String>,
    pub tick_penalty: i32,
    /// Penalty for minute timeframes below `short_minutes_under`.
    pub short_minutes_penalty: i32,
    pub short_minutes_under: u32,
    /// Adjustment keyed by lowercase compatibility tag.
    pub compatibility_adjustments: BTreeMap<String, i32>,
}

impl Default for ExchangeRules {
    fn default() -> Self {
        Self {
            baseline: 5,
            asset_adjustments: adjustments(&[
                ("crypto", 3),
                ("equities", -1),
                ("forex", -1),
                ("not specified", 1),
            ]),
            derivatives_bonus: 1,
            derivatives_keywords: strings(&["perpetual", "perp", "leverage", "futures"]),
            tick_penalty: 2,
            short_minutes_penalty: 1,
            short_minutes_under: 5,
            compatibility_adjustments: adjustments(&[
                ("compatible", 1),
                ("partial", 0),
                ("incompatible", -2),
            ]),
        }
    }
}

/// Evidentiary track record: higher means stronger evidence the edge is real.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackRecordRules {
    pub baseline: i32,
    pub evidence_keywords: Vec<String>,
    pub evidence_bonus: i32,
    pub max_evidence_bonus: i32,
    /// Widely used indicators whose combination suggests a crowded edge.
    pub crowded_indicators: Vec<String>,
    pub crowded_two_penalty: i32,
    pub crowded_three_penalty: i32,
    /// Flat penalty: the idea is already public.
    pub public_source_penalty: i32,
}

impl Default for TrackRecordRules {
    fn default() -> Self {
        Self {
            baseline: 5,
            evidence_keywords: strings(&[
                "backtest",
                "sharpe",
                "drawdown",
                "live trading",
                "paper trading",
                "win rate",
            ]),
            evidence_bonus: 1,
            max_evidence_bonus: 3,
            crowded_indicators: strings(&["SMA", "EMA", "MACD", "RSI"]),
            crowded_two_penalty: 1,
            crowded_three_penalty: 2,
            public_source_penalty: 1,
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

fn adjustments(values: &[(&str, i32)]) -> BTreeMap<String, i32> {
    values.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// `[discovery]` section (GitHub repository search).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_github_api")]
    pub api_base: String,

    #[serde(default = "default_search_keywords")]
    pub keywords: Vec<String>,

    #[serde(default = "default_min_stars")]
    pub min_stars: u32,

    /// Repositories in another language are skipped; unknown language is kept.
    #[serde(default = "default_language")]
    pub preferred_language: Option<String>,

    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,

    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Skip repositories without a README (one extra request per candidate).
    #[serde(default = "default_true")]
    pub require_readme: bool,

    /// Name of the env var holding an optional GitHub token.
    #[serde(default = "default_github_token_env")]
    pub token_env: String,

    #[serde(default = "default_discovery_timeout")]
    pub timeout_secs: u64,

    /// Pause between search requests, to stay under rate limits.
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            api_base: default_github_api(),
            keywords: default_search_keywords(),
            min_stars: default_min_stars(),
            preferred_language: default_language(),
            lookback_hours: default_lookback_hours(),
            per_page: default_per_page(),
            require_readme: true,
            token_env: default_github_token_env(),
            timeout_secs: default_discovery_timeout(),
            request_delay_ms: default_request_delay(),
        }
    }
}

fn default_github_api() -> String {
    "https://api.github.com".into()
}
fn default_search_keywords() -> Vec<String> {
    strings(&[
        "trading strategy",
        "algorithmic trading",
        "quant strategy",
        "trading bot",
        "backtest",
        "mean reversion",
        "momentum strategy",
        "crypto trading",
        "market making",
        "statistical arbitrage",
    ])
}
fn default_min_stars() -> u32 {
    2
}
fn default_language() -> Option<String> {
    Some("Python".into())
}
fn default_lookback_hours() -> i64 {
    24
}
fn default_per_page() -> u32 {
    30
}
fn default_github_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_discovery_timeout() -> u64 {
    30
}
fn default_request_delay() -> u64 {
    2000
}

/// `[summarizer]` section: external command that turns repos into summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Executable to spawn. Empty means no summarizer is configured.
    #[serde(default)]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the subprocess (defaults to the current one).
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// The subprocess is killed after this many seconds.
    #[serde(default = "default_summarizer_timeout")]
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            working_dir: None,
            timeout_secs: default_summarizer_timeout(),
        }
    }
}

fn default_summarizer_timeout() -> u64 {
    900
}

/// `[delivery]` section (Telegram Bot API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_telegram_api")]
    pub api_base: String,

    /// Name of the env var holding the bot token.
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,

    /// Name of the env var holding the destination chat id.
    #[serde(default = "default_chat_id_env")]
    pub chat_id_env: String,

    /// Messages longer than this are truncated.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    #[serde(default = "default_delivery_timeout")]
    pub timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: default_telegram_api(),
            bot_token_env: default_bot_token_env(),
            chat_id_env: default_chat_id_env(),
            max_message_chars: default_max_message_chars(),
            timeout_secs: default_delivery_timeout(),
        }
    }
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".into()
}
fn default_bot_token_env() -> String {
    "BOT_TOKEN".into()
}
fn default_chat_id_env() -> String {
    "CHAT_ID".into()
}
fn default_max_message_chars() -> usize {
    4000
}
fn default_delivery_timeout() -> u64 {
    20
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.strategy-scout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| ScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.strategy-scout/strategy-scout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ScoutError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| ScoutError::config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ScoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ScoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ScoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a secret from the named env var. Unset or empty yields `None`.
pub fn secret_from_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Some(val),
        _ => None,
    }
}
