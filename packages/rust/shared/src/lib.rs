//! Shared types, error model, and configuration for Strategy Scout.
//!
//! This crate is the foundation depended on by all other Strategy Scout crates.
//! It provides:
//! - [`ScoutError`], the unified error type
//! - Domain and artifact types ([`StrategySummary`], [`StrategyRecord`],
//!   [`DedupedStrategy`], [`ScoredStrategy`], [`RunDate`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CapitalRules, ComplexityRules, DataAvailabilityRules, DeliveryConfig,
    DiscoveryConfig, ExchangeRules, PathsConfig, ScoringConfig, SimilarityConfig,
    SummarizerConfig, TrackRecordRules, config_dir, config_file_path, init_config, load_config,
    load_config_from, secret_from_env,
};
pub use error::{Result, ScoutError};
pub use types::{
    Classification, DIMENSION_MAX, DIMENSION_MIN, DedupedStrategy, Dimension, DiscoveredRepo,
    FeasibilityScore, RunDate, STORE_SCHEMA_VERSION, ScoredStrategy, SimilarityResult,
    Stage, StrategyRecord, StrategySummary,
};
