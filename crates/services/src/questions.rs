use async_trait::async_trait;

use repaso_core::model::Question;
use storage::kv::StorageError;

/// Supplies the week's question list when a session loads.
///
/// The engine treats the source as a black box: it asks once per
/// loading phase and takes whatever comes back in order. An empty list
/// is not an error here; the controller refuses to start instead.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the backing material cannot be read.
    async fn fetch_questions(&self) -> Result<Vec<Question>, StorageError>;
}

/// A source with a pre-built list, for tests and seeded demos.
#[derive(Clone, Default)]
pub struct FixedQuestionSource {
    questions: Vec<Question>,
}

impl FixedQuestionSource {
    #[must_use]
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }
}

#[async_trait]
impl QuestionSource for FixedQuestionSource {
    async fn fetch_questions(&self) -> Result<Vec<Question>, StorageError> {
        Ok(self.questions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repaso_core::model::ItemId;

    #[tokio::test]
    async fn fixed_source_preserves_order() {
        let source = FixedQuestionSource::new(vec![
            Question::open(ItemId::new("q-2"), "Second", 30).unwrap(),
            Question::open(ItemId::new("q-1"), "First", 30).unwrap(),
        ]);

        let questions = source.fetch_questions().await.unwrap();
        assert_eq!(questions[0].id(), &ItemId::new("q-2"));
        assert_eq!(questions[1].id(), &ItemId::new("q-1"));
    }

    #[tokio::test]
    async fn empty_source_returns_an_empty_list() {
        let source = FixedQuestionSource::default();
        assert!(source.fetch_questions().await.unwrap().is_empty());
    }
}
