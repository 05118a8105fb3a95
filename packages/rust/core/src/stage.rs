//! Pipeline state machine.
//!
//! Stages run in the fixed order `discover -> summarize -> dedup -> score ->
//! report`. Each stage either completes or fails; what a failure does is
//! decided by [`failure_policy`], and every legal move is listed in
//! [`transition`].

use strategy_scout_shared::{Result, ScoutError, Stage};

/// Where a run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// About to run this stage.
    Running(Stage),
    /// Every requested stage finished.
    Finished,
    /// A fatal failure stopped the run at this stage.
    Aborted(Stage),
}

/// Result of executing the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    Completed,
    Failed,
}

/// What a stage failure does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Continue with an empty batch.
    Degrade,
    /// Stop the run; earlier artifacts stay on disk.
    Abort,
}

/// Failure policy per stage.
///
/// Discovery is the only stage that can degrade: downstream stages can still
/// run (and report an empty digest) without it. Delivery failures inside the
/// report stage never reach the state machine.
pub fn failure_policy(stage: Stage) -> FailurePolicy {
    match stage {
        Stage::Discover => FailurePolicy::Degrade,
        Stage::Summarize | Stage::Dedup | Stage::Score | Stage::Report => FailurePolicy::Abort,
    }
}

/// Apply `event` to `current`.
pub fn transition(current: RunState, event: StageEvent) -> Result<RunState> {
    use RunState::{Aborted, Finished, Running};
    use StageEvent::{Completed, Failed};

    match (current, event) {
        (Running(Stage::Discover), Completed) => Ok(Running(Stage::Summarize)),
        (Running(Stage::Summarize), Completed) => Ok(Running(Stage::Dedup)),
        (Running(Stage::Dedup), Completed) => Ok(Running(Stage::Score)),
        (Running(Stage::Score), Completed) => Ok(Running(Stage::Report)),
        (Running(Stage::Report), Completed) => Ok(Finished),
        (Running(stage), Failed) => match failure_policy(stage) {
            FailurePolicy::Degrade => transition(Running(stage), Completed),
            FailurePolicy::Abort => Ok(Aborted(stage)),
        },
        (Finished | Aborted(_), _) => Err(ScoutError::Transition {
            from: format!("{current:?}"),
            event: format!("{event:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_visits_every_stage_in_order() {
        let mut state = RunState::Running(Stage::Discover);
        let mut visited = Vec::new();
        while let RunState::Running(stage) = state {
            visited.push(stage);
            state = transition(state, StageEvent::Completed).unwrap();
        }
        assert_eq!(visited, Stage::ALL);
        assert_eq!(state, RunState::Finished);
    }

    #[test]
    fn discover_failure_degrades() {
        let next = transition(RunState::Running(Stage::Discover), StageEvent::Failed).unwrap();
        assert_eq!(next, RunState::Running(Stage::Summarize));
    }

    #[test]
    fn later_failures_abort() {
        for stage in [Stage::Summarize, Stage::Dedup, Stage::Score, Stage::Report] {
            let next = transition(RunState::Running(stage), StageEvent::Failed).unwrap();
            assert_eq!(next, RunState::Aborted(stage));
        }
    }

    #[test]
    fn terminal_states_reject_events() {
        let err = transition(RunState::Finished, StageEvent::Completed).unwrap_err();
        assert!(err.to_string().contains("invalid transition from Finished"));
        assert!(transition(RunState::Aborted(Stage::Dedup), StageEvent::Completed).is_err());
    }

    #[test]
    fn policy_table() {
        assert_eq!(failure_policy(Stage::Discover), FailurePolicy::Degrade);
        assert_eq!(failure_policy(Stage::Report), FailurePolicy::Abort);
    }
}
