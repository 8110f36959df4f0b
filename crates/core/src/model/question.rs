use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::ItemId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Validation errors for review questions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question id must not be blank")]
    BlankId,

    #[error("question statement must not be blank")]
    BlankStatement,

    #[error("time limit must be at least one second")]
    ZeroTimeLimit,

    #[error("multiple choice question needs at least one option")]
    MissingOptions,

    #[error("multiple choice option {index} is blank")]
    BlankOption { index: usize },

    #[error("open question cannot carry options")]
    UnexpectedOptions,
}

//
// ─── QUESTION KIND ────────────────────────────────────────────────────────────
//

/// What shape of answer a question expects.
///
/// Serialized as `multiple_choice` / `open`, the names the snapshot
/// wire format uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// The learner picks from a fixed option list.
    MultipleChoice,
    /// The learner writes free text.
    Open,
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

/// One item under review: the prompt, its per-question time budget, and
/// whatever the learner and the grader have recorded against it so far.
///
/// `user_answer` is written during the test and review phases;
/// `is_correct` and `feedback` only after grading. Options are present
/// exactly when the kind is multiple choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: ItemId,
    statement: String,
    kind: QuestionKind,
    options: Option<Vec<String>>,
    time_limit_seconds: u32,
    user_answer: Option<String>,
    is_correct: Option<bool>,
    feedback: Option<String>,
}

impl Question {
    /// Builds an open question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::BlankId`, `BlankStatement`, or
    /// `ZeroTimeLimit` when the corresponding field is unusable.
    pub fn open(
        id: ItemId,
        statement: impl Into<String>,
        time_limit_seconds: u32,
    ) -> Result<Self, QuestionError> {
        Self::validated(id, statement.into(), QuestionKind::Open, None, time_limit_seconds)
    }

    /// Builds a multiple choice question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::MissingOptions` when the option list is
    /// empty, `BlankOption` when any option is blank, plus the checks
    /// shared with [`Question::open`].
    pub fn multiple_choice(
        id: ItemId,
        statement: impl Into<String>,
        options: Vec<String>,
        time_limit_seconds: u32,
    ) -> Result<Self, QuestionError> {
        Self::validated(
            id,
            statement.into(),
            QuestionKind::MultipleChoice,
            Some(options),
            time_limit_seconds,
        )
    }

    /// Rehydrates a question from persisted state, re-running validation.
    ///
    /// # Errors
    ///
    /// Same conditions as the constructors; a stored question that no
    /// longer validates is treated as incompatible by callers.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: ItemId,
        statement: String,
        kind: QuestionKind,
        options: Option<Vec<String>>,
        time_limit_seconds: u32,
        user_answer: Option<String>,
        is_correct: Option<bool>,
        feedback: Option<String>,
    ) -> Result<Self, QuestionError> {
        let mut question = Self::validated(id, statement, kind, options, time_limit_seconds)?;
        question.user_answer = user_answer;
        question.is_correct = is_correct;
        question.feedback = feedback;
        Ok(question)
    }

    fn validated(
        id: ItemId,
        statement: String,
        kind: QuestionKind,
        options: Option<Vec<String>>,
        time_limit_seconds: u32,
    ) -> Result<Self, QuestionError> {
        if id.as_str().trim().is_empty() {
            return Err(QuestionError::BlankId);
        }
        if statement.trim().is_empty() {
            return Err(QuestionError::BlankStatement);
        }
        if time_limit_seconds == 0 {
            return Err(QuestionError::ZeroTimeLimit);
        }
        match (kind, &options) {
            (QuestionKind::MultipleChoice, None) => return Err(QuestionError::MissingOptions),
            (QuestionKind::MultipleChoice, Some(opts)) => {
                if opts.is_empty() {
                    return Err(QuestionError::MissingOptions);
                }
                if let Some(index) = opts.iter().position(|o| o.trim().is_empty()) {
                    return Err(QuestionError::BlankOption { index });
                }
            }
            (QuestionKind::Open, Some(_)) => return Err(QuestionError::UnexpectedOptions),
            (QuestionKind::Open, None) => {}
        }

        Ok(Self {
            id,
            statement,
            kind,
            options,
            time_limit_seconds,
            user_answer: None,
            is_correct: None,
            feedback: None,
        })
    }

    /// Overwrites the learner's answer. Blank text still counts as
    /// unanswered; see [`Question::has_answer`].
    pub fn record_answer(&mut self, answer: impl Into<String>) {
        self.user_answer = Some(answer.into());
    }

    /// Stores the grading verdict for this question.
    pub fn record_grade(&mut self, is_correct: bool, feedback: impl Into<String>) {
        self.is_correct = Some(is_correct);
        self.feedback = Some(feedback.into());
    }

    #[must_use]
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    #[must_use]
    pub fn statement(&self) -> &str {
        &self.statement
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn options(&self) -> Option<&[String]> {
        self.options.as_deref()
    }

    #[must_use]
    pub fn time_limit_seconds(&self) -> u32 {
        self.time_limit_seconds
    }

    #[must_use]
    pub fn user_answer(&self) -> Option<&str> {
        self.user_answer.as_deref()
    }

    /// Returns true when the learner left something other than
    /// whitespace. Grading treats everything else as a blank answer.
    #[must_use]
    pub fn has_answer(&self) -> bool {
        self.user_answer
            .as_deref()
            .is_some_and(|a| !a.trim().is_empty())
    }

    #[must_use]
    pub fn is_correct(&self) -> Option<bool> {
        self.is_correct
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    #[must_use]
    pub fn is_graded(&self) -> bool {
        self.is_correct.is_some()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn open_question_validates() {
        let q = Question::open(ItemId::new("q-1"), "Define ownership", 30).unwrap();
        assert_eq!(q.kind(), QuestionKind::Open);
        assert_eq!(q.time_limit_seconds(), 30);
        assert!(q.options().is_none());
        assert!(!q.has_answer());
        assert!(!q.is_graded());
    }

    #[test]
    fn blank_statement_is_rejected() {
        let err = Question::open(ItemId::new("q-1"), "   ", 30).unwrap_err();
        assert_eq!(err, QuestionError::BlankStatement);
    }

    #[test]
    fn blank_id_is_rejected() {
        let err = Question::open(ItemId::new("  "), "Define ownership", 30).unwrap_err();
        assert_eq!(err, QuestionError::BlankId);
    }

    #[test]
    fn zero_time_limit_is_rejected() {
        let err = Question::open(ItemId::new("q-1"), "Define ownership", 0).unwrap_err();
        assert_eq!(err, QuestionError::ZeroTimeLimit);
    }

    #[test]
    fn multiple_choice_requires_options() {
        let err =
            Question::multiple_choice(ItemId::new("q-2"), "Pick one", Vec::new(), 20).unwrap_err();
        assert_eq!(err, QuestionError::MissingOptions);
    }

    #[test]
    fn multiple_choice_rejects_blank_option() {
        let err = Question::multiple_choice(ItemId::new("q-2"), "Pick one", opts(&["a", " "]), 20)
            .unwrap_err();
        assert_eq!(err, QuestionError::BlankOption { index: 1 });
    }

    #[test]
    fn open_question_rejects_options_on_rehydrate() {
        let err = Question::from_persisted(
            ItemId::new("q-3"),
            "Explain borrowing".to_string(),
            QuestionKind::Open,
            Some(opts(&["a"])),
            15,
            None,
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::UnexpectedOptions);
    }

    #[test]
    fn rehydrate_preserves_answer_and_verdict() {
        let q = Question::from_persisted(
            ItemId::new("q-4"),
            "Explain lifetimes".to_string(),
            QuestionKind::Open,
            None,
            45,
            Some("they bound references".to_string()),
            Some(true),
            Some("Correct!".to_string()),
        )
        .unwrap();

        assert_eq!(q.user_answer(), Some("they bound references"));
        assert_eq!(q.is_correct(), Some(true));
        assert_eq!(q.feedback(), Some("Correct!"));
    }

    #[test]
    fn whitespace_answer_counts_as_unanswered() {
        let mut q = Question::open(ItemId::new("q-5"), "Define traits", 30).unwrap();
        q.record_answer("   ");
        assert!(q.user_answer().is_some());
        assert!(!q.has_answer());

        q.record_answer("shared behaviour contracts");
        assert!(q.has_answer());
    }

    #[test]
    fn grading_records_verdict_and_feedback() {
        let mut q = Question::open(ItemId::new("q-6"), "Define Send", 30).unwrap();
        q.record_grade(false, "The correct answer is: safe to move across threads.");

        assert_eq!(q.is_correct(), Some(false));
        assert!(q.is_graded());
        assert!(q.feedback().unwrap().contains("correct answer"));
    }
}
