//! Daily run: discover → summarize → dedup → score → report.
//!
//! Each stage reads the previous stage's batch (in memory, or from its
//! date-keyed artifact when resuming), writes its own artifact, and records
//! its outcome in the run manifest. The manifest is saved after every
//! transition, so an aborted run leaves an accurate record on disk.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use strategy_scout_artifacts::{
    ArtifactKind, ArtifactPaths, DeliveryStatus, RunManifest, RunStatus, StageOutcome, read_batch,
    render_digest, render_message, write_atomic, write_batch,
};
use strategy_scout_scoring::FeasibilityScorer;
use strategy_scout_shared::{
    AppConfig, DedupedStrategy, DiscoveredRepo, Result, RunDate, ScoredStrategy, ScoutError,
    Stage, StrategySummary,
};
use strategy_scout_similarity::SimilarityEngine;
use strategy_scout_storage::StrategyStore;

use crate::collaborators::{Collaborators, Deliver, Discover, Summarize};
use crate::stage::{FailurePolicy, RunState, StageEvent, failure_policy, transition};

/// Version recorded in run manifests.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which stages to run and where the first one reads its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub from: Stage,
    pub to: Stage,
    /// Input artifact for `from`. Defaults to the previous stage's
    /// artifact for the run date.
    pub input: Option<PathBuf>,
}

impl RunRequest {
    /// All five stages.
    pub fn full() -> Self {
        Self {
            from: Stage::Discover,
            to: Stage::Report,
            input: None,
        }
    }

    /// Resume at `from` and run through the report.
    pub fn resume(from: Stage, input: Option<PathBuf>) -> Self {
        Self {
            from,
            to: Stage::Report,
            input,
        }
    }

    /// Exactly one stage.
    pub fn single(stage: Stage, input: Option<PathBuf>) -> Self {
        Self {
            from: stage,
            to: stage,
            input,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.from > self.to {
            return Err(ScoutError::validation(format!(
                "cannot run from {} to {}",
                self.from, self.to
            )));
        }
        if self.from == Stage::Discover && self.input.is_some() {
            return Err(ScoutError::validation("the discover stage takes no input"));
        }
        Ok(())
    }
}

/// Result of a run that did not abort.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub date: RunDate,
    pub status: RunStatus,
    pub manifest_path: PathBuf,
    /// Set when the report stage ran.
    pub digest_path: Option<PathBuf>,
    pub delivery: Option<DeliveryStatus>,
    /// Entries in the last stage's batch.
    pub items: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage starts.
    fn stage_started(&self, stage: Stage);
    /// Called with the outcome recorded for a stage.
    fn stage_finished(&self, stage: Stage, outcome: &StageOutcome);
    /// Called when the run completes without aborting.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage, _outcome: &StageOutcome) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Batch handed from one stage to the next.
enum Batch {
    Discovered(Vec<DiscoveredRepo>),
    Summaries(Vec<StrategySummary>),
    Deduped(Vec<DedupedStrategy>),
    Scored(Vec<ScoredStrategy>),
}

impl Batch {
    fn len(&self) -> usize {
        match self {
            Self::Discovered(b) => b.len(),
            Self::Summaries(b) => b.len(),
            Self::Deduped(b) => b.len(),
            Self::Scored(b) => b.len(),
        }
    }
}

type StageResult = Result<(StageOutcome, Batch)>;

/// Orchestrator for one run date.
pub struct Pipeline<'a> {
    config: &'a AppConfig,
    paths: ArtifactPaths,
    date: RunDate,
    progress: &'a dyn ProgressReporter,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a AppConfig, date: RunDate, progress: &'a dyn ProgressReporter) -> Self {
        Self {
            config,
            paths: ArtifactPaths::from_config(&config.paths),
            date,
            progress,
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Artifact `stage` reads when no input path is given.
    pub fn default_input(&self, stage: Stage) -> Option<PathBuf> {
        let kind = match stage.previous()? {
            Stage::Discover => ArtifactKind::Discovered,
            Stage::Summarize => ArtifactKind::Summaries,
            Stage::Dedup => ArtifactKind::Dedup,
            Stage::Score => ArtifactKind::Scored,
            Stage::Report => return None,
        };
        Some(self.paths.artifact(self.date, kind))
    }

    /// Run the requested stages.
    ///
    /// Returns `Err` with the stage's error when a stage aborts the run; the
    /// manifest on disk then records the failure.
    #[instrument(skip_all, fields(date = %self.date, from = %request.from, to = %request.to))]
    pub async fn run<D, S, L>(
        &self,
        request: &RunRequest,
        collaborators: &Collaborators<D, S, L>,
    ) -> Result<RunSummary>
    where
        D: Discover,
        S: Summarize,
        L: Deliver,
    {
        request.validate()?;
        let start = Instant::now();

        let manifest_path = self.paths.artifact(self.date, ArtifactKind::Manifest);
        let mut manifest = self.open_manifest(&manifest_path);
        for stage in Stage::ALL.into_iter().filter(|s| *s < request.from) {
            if manifest.outcome(stage).is_none() {
                manifest.record(
                    stage,
                    StageOutcome::Skipped {
                        reason: format!("run resumed from {}", request.from),
                    },
                );
            }
        }
        manifest.save(&manifest_path)?;
        info!(run_id = %manifest.run_id, "run started");

        let mut state = RunState::Running(request.from);
        let mut batch: Option<Batch> = None;
        let mut fatal: Option<ScoutError> = None;

        while let RunState::Running(stage) = state {
            self.progress.stage_started(stage);

            let result = self
                .execute(stage, batch.take(), request, collaborators, &mut manifest)
                .await;

            let (event, outcome) = match result {
                Ok((outcome, next)) => {
                    batch = Some(next);
                    (StageEvent::Completed, outcome)
                }
                Err(e) => match failure_policy(stage) {
                    FailurePolicy::Degrade => {
                        warn!(%stage, error = %e, "stage failed, continuing with an empty batch");
                        // Discovery is the only stage that degrades
                        batch = Some(Batch::Discovered(Vec::new()));
                        (
                            StageEvent::Failed,
                            StageOutcome::Degraded {
                                reason: e.to_string(),
                            },
                        )
                    }
                    FailurePolicy::Abort => {
                        error!(%stage, error = %e, "stage failed, aborting run");
                        let outcome = StageOutcome::Failed {
                            reason: e.to_string(),
                        };
                        fatal = Some(e);
                        (StageEvent::Failed, outcome)
                    }
                },
            };

            manifest.record(stage, outcome.clone());
            self.progress.stage_finished(stage, &outcome);

            state = transition(state, event)?;
            if stage == request.to && matches!(state, RunState::Running(_)) {
                state = RunState::Finished;
            }
            match state {
                RunState::Finished => manifest.finish(RunStatus::Succeeded),
                RunState::Aborted(_) => manifest.finish(RunStatus::Failed),
                RunState::Running(_) => {}
            }
            manifest.save(&manifest_path)?;
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        let digest_path = (request.to == Stage::Report).then(|| self.paths.digest(self.date));
        let summary = RunSummary {
            run_id: manifest.run_id,
            date: self.date,
            status: manifest.status,
            manifest_path,
            digest_path,
            delivery: manifest.delivery.clone(),
            items: batch.as_ref().map_or(0, Batch::len),
            elapsed: start.elapsed(),
        };

        info!(
            run_id = %summary.run_id,
            items = summary.items,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "run complete"
        );
        self.progress.done(&summary);
        Ok(summary)
    }

    fn open_manifest(&self, path: &Path) -> RunManifest {
        if path.exists() {
            match RunManifest::load(path) {
                Ok(mut manifest) => {
                    manifest.resume();
                    return manifest;
                }
                Err(e) => warn!(error = %e, "unreadable run manifest, starting a new one"),
            }
        }
        RunManifest::new(self.date, TOOL_VERSION)
    }

    async fn execute<D, S, L>(
        &self,
        stage: Stage,
        batch: Option<Batch>,
        request: &RunRequest,
        collaborators: &Collaborators<D, S, L>,
        manifest: &mut RunManifest,
    ) -> StageResult
    where
        D: Discover,
        S: Summarize,
        L: Deliver,
    {
        if stage == Stage::Discover {
            return self.discover(&collaborators.discovery, manifest).await;
        }

        let input = match batch {
            Some(batch) => batch,
            None => self.load_input(stage, request.input.as_deref())?,
        };

        match (stage, input) {
            (Stage::Summarize, Batch::Discovered(repos)) => {
                self.summarize(repos, &collaborators.summarizer, manifest)
                    .await
            }
            (Stage::Dedup, Batch::Summaries(summaries)) => self.dedup(summaries, manifest),
            (Stage::Score, Batch::Deduped(deduped)) => self.score(deduped, manifest),
            (Stage::Report, Batch::Scored(scored)) => {
                self.report(scored, &collaborators.delivery, manifest).await
            }
            (stage, _) => Err(ScoutError::validation(format!(
                "{stage} stage received the wrong batch"
            ))),
        }
    }

    fn load_input(&self, stage: Stage, input: Option<&Path>) -> Result<Batch> {
        let path = input
            .map(Path::to_path_buf)
            .or_else(|| self.default_input(stage))
            .ok_or_else(|| ScoutError::validation(format!("{stage} stage has no input")))?;

        info!(%stage, path = %path.display(), "loading stage input");
        Ok(match stage {
            Stage::Summarize => Batch::Discovered(read_batch(&path)?),
            Stage::Dedup => Batch::Summaries(read_batch(&path)?),
            Stage::Score => Batch::Deduped(read_batch(&path)?),
            Stage::Report => Batch::Scored(read_batch(&path)?),
            Stage::Discover => {
                return Err(ScoutError::validation("the discover stage takes no input"));
            }
        })
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    async fn discover<D: Discover>(&self, discovery: &D, manifest: &mut RunManifest) -> StageResult {
        let repos = discovery.discover(Utc::now()).await?;

        let path = self.paths.artifact(self.date, ArtifactKind::Discovered);
        manifest.add_artifact(write_batch(&path, &repos)?);

        info!(repos = repos.len(), "discover stage complete");
        Ok((
            StageOutcome::Completed { items: repos.len() },
            Batch::Discovered(repos),
        ))
    }

    async fn summarize<S: Summarize>(
        &self,
        repos: Vec<DiscoveredRepo>,
        summarizer: &S,
        manifest: &mut RunManifest,
    ) -> StageResult {
        let path = self.paths.artifact(self.date, ArtifactKind::Summaries);

        if repos.is_empty() {
            info!("nothing discovered, summarizer not run");
            let summaries: Vec<StrategySummary> = Vec::new();
            manifest.add_artifact(write_batch(&path, &summaries)?);
            return Ok((
                StageOutcome::Skipped {
                    reason: "no repositories discovered".into(),
                },
                Batch::Summaries(summaries),
            ));
        }

        let summaries = summarizer.summarize(&repos).await?;
        manifest.add_artifact(write_batch(&path, &summaries)?);

        info!(
            repos = repos.len(),
            summaries = summaries.len(),
            "summarize stage complete"
        );
        Ok((
            StageOutcome::Completed {
                items: summaries.len(),
            },
            Batch::Summaries(summaries),
        ))
    }

    fn dedup(&self, summaries: Vec<StrategySummary>, manifest: &mut RunManifest) -> StageResult {
        let engine = SimilarityEngine::new(self.config.similarity.clone());
        let store_path = self.config.paths.store_path();
        let seen_at = Utc::now();

        let path = self.paths.artifact(self.date, ArtifactKind::Dedup);

        // The artifact is validated and written before the store is saved, so
        // an aborted dedup leaves the store as it was.
        let (outcome, meta) = StrategyStore::transaction(&store_path, |store| {
            let outcome = engine.dedup_batch(store, summaries, seen_at)?;
            let meta = write_batch(&path, &outcome.strategies)?;
            Ok((outcome, meta))
        })?;
        manifest.add_artifact(meta);

        let stats = &outcome.stats;
        info!(
            novel = stats.novel,
            similar = stats.similar,
            duplicate = stats.duplicate,
            inserted = stats.inserted,
            updated = stats.updated,
            "dedup stage complete"
        );
        Ok((
            StageOutcome::Completed {
                items: outcome.strategies.len(),
            },
            Batch::Deduped(outcome.strategies),
        ))
    }

    fn score(&self, deduped: Vec<DedupedStrategy>, manifest: &mut RunManifest) -> StageResult {
        let scorer = FeasibilityScorer::new(self.config.scoring.clone());
        let scored = scorer.score_batch(deduped);

        let path = self.paths.artifact(self.date, ArtifactKind::Scored);
        manifest.add_artifact(write_batch(&path, &scored)?);

        let excluded = scored
            .iter()
            .filter(|s| s.feasibility.exclusion_flag)
            .count();
        info!(scored = scored.len(), excluded, "score stage complete");
        Ok((
            StageOutcome::Completed {
                items: scored.len(),
            },
            Batch::Scored(scored),
        ))
    }

    async fn report<L: Deliver>(
        &self,
        scored: Vec<ScoredStrategy>,
        delivery: &L,
        manifest: &mut RunManifest,
    ) -> StageResult {
        let digest = render_digest(self.date, &scored);
        let digest_path = self.paths.digest(self.date);
        manifest.add_artifact(write_atomic(&digest_path, digest.as_bytes())?);
        info!(path = %digest_path.display(), "digest written");

        let message = render_message(self.date, &scored, self.config.delivery.max_message_chars);
        let status = match delivery.deliver(&message).await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "delivery failed, digest kept on disk");
                DeliveryStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };
        manifest.delivery = Some(status);

        Ok((
            StageOutcome::Completed {
                items: scored.len(),
            },
            Batch::Scored(scored),
        ))
    }
}
