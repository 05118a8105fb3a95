//! Core pipeline orchestration for Strategy Scout.
//!
//! This crate ties together discovery, summarization, similarity dedup,
//! feasibility scoring and digest delivery into the daily run (see
//! [`pipeline::Pipeline`]), driven by the state machine in [`stage`].

pub mod collaborators;
pub mod delivery;
pub mod pipeline;
pub mod stage;
pub mod summarize;

pub use collaborators::{Collaborators, Deliver, Discover, Summarize};
pub use delivery::TelegramDelivery;
pub use pipeline::{
    Pipeline, ProgressReporter, RunRequest, RunSummary, SilentProgress, TOOL_VERSION,
};
pub use stage::{FailurePolicy, RunState, StageEvent, failure_policy, transition};
pub use summarize::CommandSummarizer;
