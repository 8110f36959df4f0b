use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of a weekly review session.
///
/// A session moves strictly forward through these phases:
///
/// ```text
/// loading        -> restore_prompt | intro
/// restore_prompt -> test | review | intro
/// intro          -> test
/// test           -> review
/// review         -> grading
/// grading        -> results
/// results        -> loading (reset)
/// ```
///
/// Resuming a snapshot jumps straight to the phase it was saved in, and
/// `reset` returns from `results` to `loading` for a fresh cycle. Every
/// other edge is one-way; [`Phase::can_transition_to`] is the single
/// source of truth for which edges exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Fetching questions and probing for a saved snapshot.
    Loading,
    /// A compatible snapshot exists; the learner chooses resume or discard.
    RestorePrompt,
    /// Waiting for the learner to start the test.
    Intro,
    /// Timed questioning, one question at a time.
    Test,
    /// Untimed-per-question lookback over all answers, 60 seconds total.
    Review,
    /// Answers are out for concurrent evaluation.
    Grading,
    /// Per-question verdicts and the aggregate score are available.
    Results,
}

impl Phase {
    /// Returns true if a session may move from `self` directly to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Loading, Phase::RestorePrompt | Phase::Intro)
                | (Phase::RestorePrompt, Phase::Test | Phase::Review | Phase::Intro)
                | (Phase::Intro, Phase::Test)
                | (Phase::Test, Phase::Review)
                | (Phase::Review, Phase::Grading)
                | (Phase::Grading, Phase::Results)
                | (Phase::Results, Phase::Loading)
        )
    }

    /// Returns true for the phases whose progress is worth saving.
    ///
    /// Only `test` and `review` carry learner input that a crash could
    /// lose; every other phase restarts cleanly from scratch.
    #[must_use]
    pub fn persists_progress(self) -> bool {
        matches!(self, Phase::Test | Phase::Review)
    }

    /// Returns true once the session has produced its final verdicts.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Results)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Loading => "loading",
            Phase::RestorePrompt => "restore_prompt",
            Phase::Intro => "intro",
            Phase::Test => "test",
            Phase::Review => "review",
            Phase::Grading => "grading",
            Phase::Results => "results",
        };
        write!(f, "{name}")
    }
}
