use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use repaso_core::Clock;
use repaso_core::model::{Phase, Question, SessionResult};
use storage::kv::KeyValueStore;

use crate::decay::DecayTracker;
use crate::error::SessionError;
use crate::grading::GradingOrchestrator;
use crate::persistence::{PersistenceGuard, QuestionRecord, SCHEMA_VERSION, SessionSnapshot};
use crate::questions::QuestionSource;
use crate::timer::{TimerEngine, TimerSignal};

/// Fixed duration of the review phase, regardless of question count.
pub const REVIEW_PHASE_SECONDS: u32 = 60;
/// Test countdowns warn once remaining time is at or under this.
pub const WARNING_BAND_SECONDS: u32 = 10;
/// Window in which a second advance is swallowed as a double-fire.
pub const ADVANCE_DEBOUNCE_MS: i64 = 300;

/// What a call to [`SessionController::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved to the question at `index` and restarted its countdown.
    MovedTo { index: usize },
    /// The last question was left behind; the session is reviewing now.
    EnteredReview,
    /// The call landed inside the debounce window; nothing changed.
    Debounced,
}

/// What a call to [`SessionController::tick`] observed or caused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No countdown running, or less than a whole second elapsed.
    Idle,
    /// The running countdown lost at least one second.
    Ticked {
        remaining_seconds: u32,
        warning: bool,
    },
    /// A test countdown expired; moved to the question at `index`.
    AutoAdvancedTo { index: usize },
    /// The last test countdown expired; the session is reviewing now.
    EnteredReview,
    /// The review countdown expired; answers were submitted and graded.
    Submitted(SessionResult),
}

/// Counters a front end needs for a progress display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

/// Drives one weekly review session through its phases.
///
/// The controller owns the question list, the countdown, and the
/// persistence side effects; callers own the cadence by polling
/// [`SessionController::tick`] about once a second. All methods take
/// `&mut self`, so a session is single-threaded by construction and
/// cancelling simply means dropping the future mid-await.
pub struct SessionController {
    clock: Clock,
    source: Arc<dyn QuestionSource>,
    guard: PersistenceGuard,
    decay: DecayTracker,
    grader: GradingOrchestrator,
    timer: TimerEngine,
    phase: Phase,
    questions: Vec<Question>,
    current_index: usize,
    marked_for_review: BTreeSet<usize>,
    pending_snapshot: Option<SessionSnapshot>,
    fresh_questions: Option<Vec<Question>>,
    last_advance_at: Option<DateTime<Utc>>,
    result: Option<SessionResult>,
}

impl SessionController {
    #[must_use]
    pub fn new(
        clock: Clock,
        source: Arc<dyn QuestionSource>,
        store: Arc<dyn KeyValueStore>,
        grader: GradingOrchestrator,
    ) -> Self {
        Self {
            clock,
            source,
            guard: PersistenceGuard::new(Arc::clone(&store)),
            decay: DecayTracker::new(store),
            grader,
            timer: TimerEngine::new(),
            phase: Phase::Loading,
            questions: Vec::new(),
            current_index: 0,
            marked_for_review: BTreeSet::new(),
            pending_snapshot: None,
            fresh_questions: None,
            last_advance_at: None,
            result: None,
        }
    }

    //
    // ─── PHASE FLOW ────────────────────────────────────────────────────────────
    //

    /// Fetches the week's questions and decides between the restore
    /// prompt and a fresh intro.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the source or the snapshot
    /// store cannot be read. A stale or unreadable snapshot is not an
    /// error; it is discarded and the session starts fresh.
    pub async fn boot(&mut self) -> Result<(), SessionError> {
        self.require_phase(Phase::Loading, "boot")?;
        let fresh = self.source.fetch_questions().await?;

        match self.guard.load().await? {
            Some(snapshot) => {
                self.pending_snapshot = Some(snapshot);
                self.fresh_questions = Some(fresh);
                self.transition(Phase::RestorePrompt);
            }
            None => {
                self.questions = fresh;
                self.transition(Phase::Intro);
            }
        }
        Ok(())
    }

    /// Rebuilds the session from the offered snapshot and jumps to the
    /// phase it was saved in, countdown included.
    ///
    /// A snapshot that fails rehydration is deleted on the spot and the
    /// session falls back to a fresh intro.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::PhaseMismatch` outside the restore
    /// prompt, or `SessionError::Storage` if deleting a bad snapshot
    /// fails.
    pub async fn resume(&mut self) -> Result<(), SessionError> {
        self.require_phase(Phase::RestorePrompt, "resume")?;

        let hydrated = self.pending_snapshot.take().and_then(|snapshot| {
            Self::hydrate(&snapshot).map(|questions| (snapshot, questions))
        });
        let Some((snapshot, questions)) = hydrated else {
            self.guard.clear().await?;
            self.fall_back_to_intro();
            return Ok(());
        };

        let now = self.clock.now();
        self.questions = questions;
        self.current_index = snapshot.current_index.min(self.questions.len() - 1);
        self.marked_for_review = snapshot
            .marked_for_review
            .iter()
            .copied()
            .filter(|index| *index < self.questions.len())
            .collect();
        self.fresh_questions = None;
        let warn_below = match snapshot.phase {
            Phase::Test => Some(WARNING_BAND_SECONDS),
            _ => None,
        };
        self.timer.start(snapshot.time_left_seconds, warn_below, now);
        self.transition(snapshot.phase);
        Ok(())
    }

    /// Throws the snapshot away and starts over with today's questions.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::PhaseMismatch` outside the restore
    /// prompt, or `SessionError::Storage` if the delete fails.
    pub async fn discard(&mut self) -> Result<(), SessionError> {
        self.require_phase(Phase::RestorePrompt, "discard")?;
        self.pending_snapshot = None;
        self.guard.clear().await?;
        self.fall_back_to_intro();
        Ok(())
    }

    /// Begins the test at the first question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` when there are no questions; the
    /// session stays in intro so the caller can explain the dead end.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        self.require_phase(Phase::Intro, "start")?;
        if self.questions.is_empty() {
            return Err(SessionError::Empty);
        }

        let now = self.clock.now();
        self.current_index = 0;
        self.marked_for_review.clear();
        self.result = None;
        self.transition(Phase::Test);
        self.start_question_countdown(now);
        self.autosave(now).await;
        Ok(())
    }

    /// Records the learner's answer for the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::PhaseMismatch` outside the test phase.
    pub async fn answer(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        self.require_phase(Phase::Test, "answer")?;
        let index = self.current_index;
        let Some(question) = self.questions.get_mut(index) else {
            return Err(SessionError::IndexOutOfRange { index });
        };
        question.record_answer(text);
        self.autosave(self.clock.now()).await;
        Ok(())
    }

    /// Moves to the next question, or into review after the last one.
    ///
    /// Navigation is forward-only. A call landing within
    /// [`ADVANCE_DEBOUNCE_MS`] of the previous effective advance is
    /// treated as a double-fire and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::PhaseMismatch` outside the test phase.
    pub async fn advance(&mut self) -> Result<AdvanceOutcome, SessionError> {
        self.require_phase(Phase::Test, "advance")?;
        let now = self.clock.now();
        if self.within_debounce_window(now) {
            return Ok(AdvanceOutcome::Debounced);
        }

        Ok(match self.advance_step(now).await {
            Some(index) => AdvanceOutcome::MovedTo { index },
            None => AdvanceOutcome::EnteredReview,
        })
    }

    /// Replaces the answer of any question while reviewing.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::PhaseMismatch` outside the review phase,
    /// or `SessionError::IndexOutOfRange`.
    pub async fn edit_answer(
        &mut self,
        index: usize,
        text: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.require_phase(Phase::Review, "edit_answer")?;
        let Some(question) = self.questions.get_mut(index) else {
            return Err(SessionError::IndexOutOfRange { index });
        };
        question.record_answer(text);
        self.autosave(self.clock.now()).await;
        Ok(())
    }

    /// Toggles the review mark on a question and returns the new state.
    ///
    /// Marks are a learner-facing aid only; they never feed the decay
    /// set.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::PhaseMismatch` outside the review phase,
    /// or `SessionError::IndexOutOfRange`.
    pub async fn mark_for_review(&mut self, index: usize) -> Result<bool, SessionError> {
        self.require_phase(Phase::Review, "mark_for_review")?;
        if index >= self.questions.len() {
            return Err(SessionError::IndexOutOfRange { index });
        }

        let marked = if self.marked_for_review.remove(&index) {
            false
        } else {
            self.marked_for_review.insert(index);
            true
        };
        self.autosave(self.clock.now()).await;
        Ok(marked)
    }

    /// Sends every answer out for grading and lands on results.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::PhaseMismatch` outside the review phase.
    /// Grading itself cannot fail the session; individual failures
    /// degrade to incorrect verdicts.
    pub async fn submit(&mut self) -> Result<SessionResult, SessionError> {
        self.require_phase(Phase::Review, "submit")?;
        Ok(self.run_grading().await)
    }

    /// Ends the results phase and boots a fresh loading cycle.
    ///
    /// Clears the snapshot again on the way out; a finished session is
    /// never offered for restore.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::PhaseMismatch` outside results, or any
    /// error [`SessionController::boot`] can produce.
    pub async fn reset(&mut self) -> Result<(), SessionError> {
        self.require_phase(Phase::Results, "reset")?;
        self.guard.clear().await?;
        self.questions.clear();
        self.current_index = 0;
        self.marked_for_review.clear();
        self.pending_snapshot = None;
        self.fresh_questions = None;
        self.last_advance_at = None;
        self.result = None;
        self.timer.stop();
        self.transition(Phase::Loading);
        self.boot().await
    }

    /// Advances session time; call roughly once a second.
    ///
    /// Expiry of a test countdown advances exactly as the learner
    /// would have; expiry of the review countdown submits.
    ///
    /// # Errors
    ///
    /// Currently infallible in practice; kept fallible so storage
    /// semantics can change without breaking callers.
    pub async fn tick(&mut self) -> Result<TickOutcome, SessionError> {
        if !self.phase.persists_progress() {
            return Ok(TickOutcome::Idle);
        }

        let now = self.clock.now();
        match self.timer.tick(now) {
            None => Ok(TickOutcome::Idle),
            Some(TimerSignal::Tick {
                remaining_seconds,
                warning,
            }) => {
                self.autosave(now).await;
                Ok(TickOutcome::Ticked {
                    remaining_seconds,
                    warning,
                })
            }
            Some(TimerSignal::Expired) if self.phase == Phase::Test => {
                // Expiry bypasses the debounce guard; it cannot double-fire
                // because every advance restarts the countdown.
                Ok(match self.advance_step(now).await {
                    Some(index) => TickOutcome::AutoAdvancedTo { index },
                    None => TickOutcome::EnteredReview,
                })
            }
            Some(TimerSignal::Expired) => Ok(TickOutcome::Submitted(self.run_grading().await)),
        }
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    /// Remaining seconds of the running countdown, zero when idle.
    #[must_use]
    pub fn time_left_seconds(&self) -> u32 {
        self.timer.remaining_seconds().unwrap_or(0)
    }

    #[must_use]
    pub fn marked_for_review(&self) -> &BTreeSet<usize> {
        &self.marked_for_review
    }

    /// Aggregate score, available from the results phase on.
    #[must_use]
    pub fn result(&self) -> Option<SessionResult> {
        self.result
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.questions.len();
        let answered = self.questions.iter().filter(|q| q.has_answer()).count();
        SessionProgress {
            total,
            answered,
            remaining: total - answered,
            is_complete: self.phase.is_terminal(),
        }
    }

    /// Advances a fixed clock for deterministic tests.
    ///
    /// Has no effect when the controller runs on the system clock.
    pub fn advance_clock(&mut self, delta: Duration) {
        self.clock.advance(delta);
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn require_phase(&self, expected: Phase, action: &'static str) -> Result<(), SessionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SessionError::PhaseMismatch {
                action,
                phase: self.phase,
            })
        }
    }

    fn transition(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal phase transition {} -> {next}",
            self.phase
        );
        debug!(from = %self.phase, to = %next, "phase transition");
        self.phase = next;
    }

    fn hydrate(snapshot: &SessionSnapshot) -> Option<Vec<Question>> {
        if !snapshot.phase.persists_progress() {
            warn!(phase = %snapshot.phase, "snapshot saved in a non-resumable phase");
            return None;
        }
        if snapshot.questions.is_empty() {
            warn!("snapshot holds no questions");
            return None;
        }

        let mut questions = Vec::with_capacity(snapshot.questions.len());
        for record in snapshot.questions.iter().cloned() {
            match record.into_question() {
                Ok(question) => questions.push(question),
                Err(err) => {
                    warn!(error = %err, "snapshot question no longer validates");
                    return None;
                }
            }
        }
        Some(questions)
    }

    fn fall_back_to_intro(&mut self) {
        self.questions = self.fresh_questions.take().unwrap_or_default();
        self.transition(Phase::Intro);
    }

    fn within_debounce_window(&self, now: DateTime<Utc>) -> bool {
        self.last_advance_at
            .is_some_and(|last| now - last < Duration::milliseconds(ADVANCE_DEBOUNCE_MS))
    }

    /// One effective forward step: `Some(index)` for the next question,
    /// `None` once the session entered review instead.
    async fn advance_step(&mut self, now: DateTime<Utc>) -> Option<usize> {
        self.last_advance_at = Some(now);
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
            self.start_question_countdown(now);
            self.autosave(now).await;
            Some(self.current_index)
        } else {
            self.enter_review(now).await;
            None
        }
    }

    fn start_question_countdown(&mut self, now: DateTime<Utc>) {
        if let Some(question) = self.questions.get(self.current_index) {
            self.timer
                .start(question.time_limit_seconds(), Some(WARNING_BAND_SECONDS), now);
        }
    }

    async fn enter_review(&mut self, now: DateTime<Utc>) {
        self.transition(Phase::Review);
        self.timer.start(REVIEW_PHASE_SECONDS, None, now);
        self.autosave(now).await;
    }

    async fn run_grading(&mut self) -> SessionResult {
        self.transition(Phase::Grading);
        self.timer.stop();

        let report = self.grader.grade_all(&mut self.questions).await;
        debug!(
            total = report.result.total(),
            correct = report.result.correct_count(),
            "session graded"
        );

        if let Err(err) = self.decay.record_failures(&report.failed_ids).await {
            warn!(error = %err, "failed to record decayed items");
        }
        if let Err(err) = self.decay.mark_month_complete(self.clock.now()).await {
            warn!(error = %err, "failed to set the monthly completion flag");
        }
        // Clearing here keeps a crash on the results screen from
        // re-offering a finished session.
        if let Err(err) = self.guard.clear().await {
            warn!(error = %err, "failed to clear the session snapshot");
        }

        self.result = Some(report.result);
        self.transition(Phase::Results);
        report.result
    }

    /// Persists a snapshot when the current phase calls for one. A
    /// failed write is logged and the session carries on.
    async fn autosave(&self, now: DateTime<Utc>) {
        if !self.phase.persists_progress() {
            return;
        }
        let snapshot = self.snapshot(now);
        if let Err(err) = self.guard.save(&snapshot).await {
            warn!(error = %err, "autosave failed");
        }
    }

    fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot {
            schema_version: SCHEMA_VERSION.to_string(),
            phase: self.phase,
            questions: self
                .questions
                .iter()
                .map(QuestionRecord::from_question)
                .collect(),
            current_index: self.current_index,
            time_left_seconds: self.timer.remaining_seconds().unwrap_or(0),
            marked_for_review: self.marked_for_review.clone(),
            saved_at_epoch_ms: now.timestamp_millis(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
