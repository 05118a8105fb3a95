//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use strategy_scout_artifacts::{DeliveryStatus, StageOutcome};
use strategy_scout_core::{
    Collaborators, CommandSummarizer, Pipeline, ProgressReporter, RunRequest, RunSummary,
    TelegramDelivery,
};
use strategy_scout_discovery::GithubDiscovery;
use strategy_scout_shared::{AppConfig, RunDate, Stage, init_config, load_config, load_config_from};
use strategy_scout_storage::StrategyStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Strategy Scout: find, de-duplicate and score trading strategies daily.
#[derive(Parser)]
#[command(
    name = "strategy-scout",
    version,
    about = "Discover open-source trading strategies, flag the ones already seen, and score their feasibility.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.strategy-scout/strategy-scout.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Run date keying every artifact (YYYY-MM-DD, defaults to today in UTC).
    #[arg(long, global = true)]
    pub date: Option<RunDate>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the daily pipeline, or resume it from a stage.
    Run {
        /// First stage to run (discover, summarize, dedup, score, report).
        #[arg(long)]
        from: Option<Stage>,

        /// Input artifact for the first stage (defaults to the run date's artifact).
        #[arg(long, requires = "from")]
        input: Option<PathBuf>,
    },

    /// Search GitHub for candidate strategy repositories.
    Discover,

    /// Summarize discovered repositories with the configured summarizer.
    Summarize {
        /// Discovery artifact to read.
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Classify summaries against the strategy store and update it.
    Dedup {
        /// Summaries artifact to read.
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Score deduplicated strategies for feasibility.
    Score {
        /// Dedup artifact to read.
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Render the digest and deliver it.
    Report {
        /// Scored artifact to read.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Write the digest without sending it.
        #[arg(long)]
        no_deliver: bool,
    },

    /// Inspect the persistent strategy store.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Store subcommands.
#[derive(Subcommand)]
pub(crate) enum StoreAction {
    /// Print record counts and sighting range.
    Stats,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "strategy_scout=info",
        1 => "strategy_scout=debug",
        _ => "strategy_scout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let date = cli.date.unwrap_or_else(RunDate::today);
    let config_path = cli.config.as_deref();

    let (request, deliver) = match cli.command {
        Command::Config { action } => {
            return match action {
                ConfigAction::Init => cmd_config_init(config_path),
                ConfigAction::Show => cmd_config_show(&resolve_config(config_path)?),
            };
        }
        Command::Store { action } => {
            return match action {
                StoreAction::Stats => cmd_store_stats(&resolve_config(config_path)?),
            };
        }
        Command::Run {
            from: Some(from),
            input,
        } => (RunRequest::resume(from, input), true),
        Command::Run { from: None, .. } => (RunRequest::full(), true),
        Command::Discover => (RunRequest::single(Stage::Discover, None), false),
        Command::Summarize { input } => (RunRequest::single(Stage::Summarize, input), false),
        Command::Dedup { input } => (RunRequest::single(Stage::Dedup, input), false),
        Command::Score { input } => (RunRequest::single(Stage::Score, input), false),
        Command::Report { input, no_deliver } => {
            (RunRequest::single(Stage::Report, input), !no_deliver)
        }
    };

    let config = resolve_config(config_path)?;
    cmd_pipeline(&config, date, request, deliver).await
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Pipeline commands
// ---------------------------------------------------------------------------

async fn cmd_pipeline(
    config: &AppConfig,
    date: RunDate,
    request: RunRequest,
    deliver: bool,
) -> Result<()> {
    let mut delivery_config = config.delivery.clone();
    delivery_config.enabled &= deliver;

    let collaborators = Collaborators {
        discovery: GithubDiscovery::from_config(&config.discovery)?,
        summarizer: CommandSummarizer::new(config.summarizer.clone()),
        delivery: TelegramDelivery::from_config(&delivery_config)?,
    };

    info!(
        %date,
        from = %request.from,
        to = %request.to,
        "starting strategy scout"
    );

    let reporter = CliProgress::new();
    let pipeline = Pipeline::new(config, date, &reporter);
    let summary = pipeline.run(&request, &collaborators).await?;

    println!();
    println!("  Run complete!");
    println!("  Date:     {}", summary.date);
    println!("  Run ID:   {}", summary.run_id);
    println!("  Items:    {}", summary.items);
    if let Some(digest) = &summary.digest_path {
        println!("  Digest:   {}", digest.display());
    }
    if let Some(delivery) = &summary.delivery {
        println!("  Delivery: {}", describe_delivery(delivery));
    }
    println!("  Manifest: {}", summary.manifest_path.display());
    println!("  Time:     {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn describe_delivery(status: &DeliveryStatus) -> String {
    match status {
        DeliveryStatus::Sent => "sent".into(),
        DeliveryStatus::Skipped { reason } => format!("skipped ({reason})"),
        DeliveryStatus::Failed { reason } => format!("failed ({reason})"),
    }
}

fn describe_outcome(outcome: &StageOutcome) -> String {
    match outcome {
        StageOutcome::Completed { items } => format!("{items} items"),
        StageOutcome::Degraded { reason } => format!("degraded: {reason}"),
        StageOutcome::Failed { reason } => format!("failed: {reason}"),
        StageOutcome::Skipped { reason } => format!("skipped: {reason}"),
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: Stage) {
        self.spinner.set_message(format!("Running {stage}"));
    }

    fn stage_finished(&self, stage: Stage, outcome: &StageOutcome) {
        let mark = match outcome {
            StageOutcome::Completed { .. } | StageOutcome::Skipped { .. } => "✓",
            StageOutcome::Degraded { .. } => "!",
            StageOutcome::Failed { .. } => "✗",
        };
        self.spinner
            .println(format!("  {mark} {stage:<9} {}", describe_outcome(outcome)));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

// ---------------------------------------------------------------------------
// Store and config commands
// ---------------------------------------------------------------------------

fn cmd_store_stats(config: &AppConfig) -> Result<()> {
    let path = config.paths.store_path();
    let store = StrategyStore::load(&path)?;
    let stats = store.stats();

    let format_time = |t: Option<DateTime<Utc>>| match t {
        Some(t) => t.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => "-".into(),
    };

    println!();
    println!("  Store:        {}", path.display());
    println!("  Records:      {}", stats.records);
    println!("  Matched:      {}", stats.with_duplicate_of);
    println!("  First seen:   {}", format_time(stats.oldest_first_seen));
    println!("  Last seen:    {}", format_time(stats.newest_last_seen));
    println!();

    Ok(())
}

fn cmd_config_init(path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(path) => {
            if path.exists() {
                return Err(eyre!("{} already exists", path.display()));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, toml::to_string_pretty(&AppConfig::default())?)?;
            path.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_resume_parses_stage_and_input() {
        let cli = Cli::try_parse_from([
            "strategy-scout",
            "--date",
            "2026-03-07",
            "run",
            "--from",
            "dedup",
            "--input",
            "data/daily_scans/2026-03-07_summaries.json",
        ])
        .unwrap();
        assert_eq!(cli.date, Some("2026-03-07".parse().unwrap()));
        match cli.command {
            Command::Run { from, input } => {
                assert_eq!(from, Some(Stage::Dedup));
                assert!(input.is_some());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn input_requires_from() {
        assert!(Cli::try_parse_from(["strategy-scout", "run", "--input", "x.json"]).is_err());
    }

    #[test]
    fn bad_date_is_rejected() {
        assert!(Cli::try_parse_from(["strategy-scout", "--date", "07/03/2026", "discover"]).is_err());
    }

    #[test]
    fn report_no_deliver_flag() {
        let cli = Cli::try_parse_from(["strategy-scout", "report", "--no-deliver"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Report {
                no_deliver: true,
                ..
            }
        ));
    }
}
