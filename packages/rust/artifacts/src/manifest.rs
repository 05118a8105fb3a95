//! Per-date run manifest (`<date>_run.json`).
//!
//! Records what happened to each stage of a run and which artifacts were
//! written. The orchestrator saves it after every stage transition, so a run
//! that aborts still leaves an accurate record on disk.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use strategy_scout_shared::{Result, RunDate, ScoutError, Stage};

use crate::{ArtifactMeta, read_json, write_json};

/// Current schema version for the run manifest.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

/// What happened to one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    /// Produced its artifact with `items` entries.
    Completed { items: usize },
    /// Failed non-fatally; the run continued.
    Degraded { reason: String },
    /// Failed fatally; the run stopped here.
    Failed { reason: String },
    /// Not run in this invocation (resumed past it, or nothing to do).
    Skipped { reason: String },
}

impl StageOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of handing the digest to the delivery channel. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    #[serde(flatten)]
    pub outcome: StageOutcome,
    pub recorded_at: DateTime<Utc>,
}

/// Run manifest stored alongside the stage artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub run_id: Uuid,
    pub run_date: RunDate,
    pub tool_version: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    #[serde(default)]
    pub stages: Vec<StageRecord>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryStatus>,
}

impl RunManifest {
    pub fn new(run_date: RunDate, tool_version: impl Into<String>) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION,
            run_id: Uuid::now_v7(),
            run_date,
            tool_version: tool_version.into(),
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running,
            stages: Vec::new(),
            artifacts: Vec::new(),
            delivery: None,
        }
    }

    /// Record a stage outcome, replacing any earlier record for that stage.
    pub fn record(&mut self, stage: Stage, outcome: StageOutcome) {
        let record = StageRecord {
            stage,
            outcome,
            recorded_at: Utc::now(),
        };
        match self.stages.iter_mut().find(|r| r.stage == stage) {
            Some(existing) => *existing = record,
            None => self.stages.push(record),
        }
    }

    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.outcome)
    }

    /// Add or replace (by file name) an artifact entry.
    pub fn add_artifact(&mut self, meta: ArtifactMeta) {
        match self
            .artifacts
            .iter_mut()
            .find(|a| a.filename == meta.filename)
        {
            Some(existing) => *existing = meta,
            None => self.artifacts.push(meta),
        }
    }

    /// Reopen the manifest for another invocation on the same date.
    pub fn resume(&mut self) {
        self.status = RunStatus::Running;
        self.finished_at = None;
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let manifest: Self = read_json(path)?;
        if manifest.schema_version != MANIFEST_SCHEMA_VERSION {
            return Err(ScoutError::validation(format!(
                "unsupported manifest schema_version: {} (expected {MANIFEST_SCHEMA_VERSION})",
                manifest.schema_version
            )));
        }
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str, sha: &str) -> ArtifactMeta {
        ArtifactMeta {
            filename: name.into(),
            sha256: sha.into(),
            size_bytes: 10,
        }
    }

    #[test]
    fn record_replaces_by_stage() {
        let mut manifest = RunManifest::new("2026-03-07".parse().unwrap(), "0.1.0");
        manifest.record(
            Stage::Discover,
            StageOutcome::Degraded {
                reason: "rate limited".into(),
            },
        );
        manifest.record(Stage::Discover, StageOutcome::Completed { items: 4 });
        manifest.record(Stage::Summarize, StageOutcome::Completed { items: 4 });

        assert_eq!(manifest.stages.len(), 2);
        assert_eq!(
            manifest.outcome(Stage::Discover),
            Some(&StageOutcome::Completed { items: 4 })
        );
        assert!(manifest.outcome(Stage::Report).is_none());
    }

    #[test]
    fn add_artifact_replaces_by_name() {
        let mut manifest = RunManifest::new("2026-03-07".parse().unwrap(), "0.1.0");
        manifest.add_artifact(meta("a.json", "1"));
        manifest.add_artifact(meta("b.json", "2"));
        manifest.add_artifact(meta("a.json", "3"));
        assert_eq!(manifest.artifacts.len(), 2);
        assert_eq!(manifest.artifacts[0].sha256, "3");
    }

    #[test]
    fn save_and_load() {
        let dir = std::env::temp_dir().join(format!("scout-manifest-test-{}", Uuid::now_v7()));
        let path = dir.join("2026-03-07_run.json");

        let mut manifest = RunManifest::new("2026-03-07".parse().unwrap(), "0.1.0");
        manifest.record(
            Stage::Score,
            StageOutcome::Failed {
                reason: "boom".into(),
            },
        );
        manifest.finish(RunStatus::Failed);
        manifest.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"status\": \"failed\""));
        assert!(raw.contains("\"stage\": \"score\""));

        let loaded = RunManifest::load(&path).unwrap();
        assert_eq!(loaded.run_id, manifest.run_id);
        assert_eq!(loaded.status, RunStatus::Failed);
        assert!(loaded.finished_at.is_some());
        assert!(loaded.outcome(Stage::Score).is_some_and(StageOutcome::is_failure));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
