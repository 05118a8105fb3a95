//! Date-keyed stage artifacts.
//!
//! Every stage writes one JSON file named `<date>_<kind>.json` under the
//! artifacts directory; the digest is written as `<date>_digest.md` under the
//! reports directory. All writes are atomic (temp file + rename) and return an
//! [`ArtifactMeta`] carrying the SHA-256 and size of what was written.
//!
//! Reads validate every entry, so a malformed artifact fails the consuming
//! stage with a parse error instead of propagating bad data.

pub mod digest;
pub mod manifest;

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use strategy_scout_shared::{
    DedupedStrategy, DiscoveredRepo, PathsConfig, Result, RunDate, ScoredStrategy, ScoutError,
    StrategySummary,
};

pub use digest::{DigestStats, render_digest, render_message};
pub use manifest::{DeliveryStatus, RunManifest, RunStatus, StageOutcome, StageRecord};

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// The JSON artifacts a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Discovered,
    Summaries,
    Dedup,
    Scored,
    Manifest,
}

impl ArtifactKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Summaries => "summaries",
            Self::Dedup => "dedup",
            Self::Scored => "scored",
            Self::Manifest => "run",
        }
    }

    pub fn file_name(&self, date: RunDate) -> String {
        format!("{date}_{}.json", self.suffix())
    }
}

/// Resolved artifact locations for one configuration.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub artifacts_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl ArtifactPaths {
    pub fn from_config(paths: &PathsConfig) -> Self {
        Self {
            artifacts_dir: paths.artifacts_dir.clone(),
            reports_dir: paths.reports_dir.clone(),
        }
    }

    pub fn artifact(&self, date: RunDate, kind: ArtifactKind) -> PathBuf {
        self.artifacts_dir.join(kind.file_name(date))
    }

    pub fn digest(&self, date: RunDate) -> PathBuf {
        self.reports_dir.join(format!("{date}_digest.md"))
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Metadata for a single written artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Atomically replace `path` with `content`.
///
/// Writes to `.<name>.tmp` next to the target, syncs, then renames over it.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<ArtifactMeta> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| ScoutError::io(&parent, e))?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ScoutError::validation(format!("{} has no file name", path.display())))?;
    let temp = parent.join(format!(".{filename}.tmp"));

    {
        let mut file = std::fs::File::create(&temp).map_err(|e| ScoutError::io(&temp, e))?;
        file.write_all(content).map_err(|e| ScoutError::io(&temp, e))?;
        file.sync_all().map_err(|e| ScoutError::io(&temp, e))?;
    }
    std::fs::rename(&temp, path).map_err(|e| ScoutError::io(path, e))?;

    debug!(file = %filename, size = content.len(), "wrote artifact");

    Ok(ArtifactMeta {
        filename,
        sha256: sha256_hex(content),
        size_bytes: content.len(),
    })
}

/// Serialize `data` as pretty JSON and write it atomically.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<ArtifactMeta> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| ScoutError::validation(format!("JSON serialization failed: {e}")))?;
    write_atomic(path, json.as_bytes())
}

/// Validate every entry, then write the batch as a JSON array.
pub fn write_batch<T: Serialize + Validate>(path: &Path, items: &[T]) -> Result<ArtifactMeta> {
    for (index, item) in items.iter().enumerate() {
        item.validate()
            .map_err(|e| ScoutError::validation(format!("{} entry {index}: {e}", path.display())))?;
    }
    write_json(path, items)
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Artifact entries that can check their own invariants after parsing.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

impl Validate for DiscoveredRepo {
    fn validate(&self) -> Result<()> {
        DiscoveredRepo::validate(self)
    }
}

impl Validate for StrategySummary {
    fn validate(&self) -> Result<()> {
        StrategySummary::validate(self)
    }
}

impl Validate for DedupedStrategy {
    fn validate(&self) -> Result<()> {
        DedupedStrategy::validate(self)
    }
}

impl Validate for ScoredStrategy {
    fn validate(&self) -> Result<()> {
        ScoredStrategy::validate(self)
    }
}

/// Read a JSON file into `T` without further checks.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| ScoutError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| ScoutError::parse(format!("{}: {e}", path.display())))
}

/// Read an artifact holding an ordered array and validate every entry.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_batch<T: DeserializeOwned + Validate>(path: &Path) -> Result<Vec<T>> {
    let items: Vec<T> = read_json(path)?;
    for (index, item) in items.iter().enumerate() {
        item.validate().map_err(|e| {
            ScoutError::parse(format!("{} entry {index}: {e}", path.display()))
        })?;
    }
    debug!(entries = items.len(), "artifact loaded");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("scout-artifacts-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn date() -> RunDate {
        "2026-03-07".parse().unwrap()
    }

    #[test]
    fn artifact_names_are_date_keyed() {
        let paths = ArtifactPaths::from_config(&PathsConfig::default());
        assert_eq!(
            paths.artifact(date(), ArtifactKind::Dedup),
            PathBuf::from("data/daily_scans/2026-03-07_dedup.json")
        );
        assert_eq!(
            paths.artifact(date(), ArtifactKind::Manifest),
            PathBuf::from("data/daily_scans/2026-03-07_run.json")
        );
        assert_eq!(
            paths.digest(date()),
            PathBuf::from("reports/2026-03-07_digest.md")
        );
    }

    #[test]
    fn write_json_reports_checksum() {
        let tmp = temp_dir();
        let path = tmp.join("nested").join("2026-03-07_summaries.json");
        let batch = vec![StrategySummary::new("a/rsi", "RSI reversal")];

        let meta = write_json(&path, &batch).unwrap();
        assert_eq!(meta.filename, "2026-03-07_summaries.json");
        assert_eq!(meta.sha256.len(), 64);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(meta.size_bytes, bytes.len());
        assert_eq!(meta.sha256, sha256_hex(&bytes));
        assert!(!path.with_file_name(".2026-03-07_summaries.json.tmp").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rewrite_overwrites_same_date() {
        let tmp = temp_dir();
        let path = tmp.join("2026-03-07_summaries.json");
        write_json(&path, &vec![StrategySummary::new("a", "one")]).unwrap();
        write_json(&path, &Vec::<StrategySummary>::new()).unwrap();

        let loaded: Vec<StrategySummary> = read_batch(&path).unwrap();
        assert!(loaded.is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn read_batch_round_trips_order() {
        let tmp = temp_dir();
        let path = tmp.join("summaries.json");
        let batch = vec![
            StrategySummary::new("z/last", "Z"),
            StrategySummary::new("a/first", "A"),
        ];
        write_json(&path, &batch).unwrap();

        let loaded: Vec<StrategySummary> = read_batch(&path).unwrap();
        assert_eq!(loaded, batch);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn malformed_artifact_is_parse_error() {
        let tmp = temp_dir();
        let path = tmp.join("dedup.json");
        std::fs::write(&path, r#"[{"id": "a/b"}]"#).unwrap();

        let err = read_batch::<DedupedStrategy>(&path).unwrap_err();
        assert!(matches!(err, ScoutError::Parse { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn invalid_entry_is_parse_error() {
        let tmp = temp_dir();
        let path = tmp.join("dedup.json");
        // Duplicate classification without a back-reference
        std::fs::write(
            &path,
            r#"[{"id": "a/b", "concept": "x", "similarity_score": 0.9, "classification": "duplicate"}]"#,
        )
        .unwrap();

        let err = read_batch::<DedupedStrategy>(&path).unwrap_err();
        assert!(matches!(err, ScoutError::Parse { .. }));
        assert!(err.to_string().contains("entry 0"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_artifact_is_io_error() {
        let err = read_batch::<StrategySummary>(Path::new("/nonexistent/x.json")).unwrap_err();
        assert!(matches!(err, ScoutError::Io { .. }));
    }
}
