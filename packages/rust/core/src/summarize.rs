//! Summarizer bridge.
//!
//! Spawns the configured summarizer command, writes the discovered
//! repositories to its stdin as a JSON array, and reads a JSON array of
//! strategy summaries from its stdout. The subprocess's stderr goes to ours.

use std::process::Stdio;
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use strategy_scout_shared::{
    DiscoveredRepo, Result, ScoutError, StrategySummary, SummarizerConfig,
};

use crate::collaborators::Summarize;

/// Summarization collaborator backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandSummarizer {
    config: SummarizerConfig,
}

impl CommandSummarizer {
    pub fn new(config: SummarizerConfig) -> Self {
        Self { config }
    }

    /// Run the command once for the whole batch.
    #[instrument(skip_all, fields(cmd = %self.config.command, repos = repos.len()))]
    pub async fn run(&self, repos: &[DiscoveredRepo]) -> Result<Vec<StrategySummary>> {
        if self.config.command.trim().is_empty() {
            return Err(ScoutError::Summarize(
                "no summarizer command configured (set [summarizer].command)".into(),
            ));
        }

        let input = serde_json::to_vec(repos)
            .map_err(|e| ScoutError::Summarize(format!("failed to encode input: {e}")))?;

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        info!("spawning summarizer");
        let mut child = command.spawn().map_err(|e| {
            ScoutError::Summarize(format!(
                "failed to spawn `{}`: {e}",
                self.config.command
            ))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ScoutError::Summarize("failed to capture summarizer stdin".into()))?;

        let write_input = async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        };

        let limit = Duration::from_secs(self.config.timeout_secs);
        let (written, output) =
            tokio::time::timeout(limit, async { tokio::join!(write_input, child.wait_with_output()) })
                .await
                .map_err(|_| {
                    ScoutError::Summarize(format!(
                        "summarizer timed out after {}s",
                        self.config.timeout_secs
                    ))
                })?;

        let output = output
            .map_err(|e| ScoutError::Summarize(format!("failed to wait for summarizer: {e}")))?;

        if !output.status.success() {
            return Err(ScoutError::Summarize(format!(
                "summarizer exited with {}",
                output.status
            )));
        }

        // A command may stop reading stdin once it has what it needs
        if let Err(e) = written {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(ScoutError::Summarize(format!(
                    "failed to write summarizer input: {e}"
                )));
            }
        }

        let mut summaries: Vec<StrategySummary> = serde_json::from_slice(&output.stdout)
            .map_err(|e| ScoutError::Summarize(format!("malformed summarizer output: {e}")))?;

        let now = Utc::now();
        for (index, summary) in summaries.iter_mut().enumerate() {
            summary
                .validate()
                .map_err(|e| ScoutError::Summarize(format!("summary {index}: {e}")))?;
            summary.discovered_at.get_or_insert(now);
        }

        debug!(bytes = output.stdout.len(), "summarizer output parsed");
        info!(summaries = summaries.len(), "summarization complete");
        Ok(summaries)
    }
}

impl Summarize for CommandSummarizer {
    async fn summarize(&self, repos: &[DiscoveredRepo]) -> Result<Vec<StrategySummary>> {
        self.run(repos).await
    }
}
