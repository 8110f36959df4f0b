use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use repaso_core::model::{ItemId, Phase, Question, QuestionError, QuestionKind};
use storage::kv::{KeyValueStore, StorageError};

/// Schema version written into every snapshot. Bump on any breaking
/// change to the wire format; older snapshots are discarded, never
/// migrated.
pub const SCHEMA_VERSION: &str = "v2";

/// Durable key for in-flight session progress.
#[must_use]
pub fn snapshot_key() -> String {
    format!("testProgress.{SCHEMA_VERSION}")
}

//
// ─── WIRE FORMAT ───────────────────────────────────────────────────────────────
//

/// Persisted shape of one question, including everything the learner
/// has entered so far.
///
/// This mirrors the domain `Question` so the snapshot can serialize
/// without leaking storage concerns into the domain layer. Field names
/// follow the original on-disk format (camelCase).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub id: ItemId,
    pub statement: String,
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub time_limit_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl QuestionRecord {
    #[must_use]
    pub fn from_question(question: &Question) -> Self {
        Self {
            id: question.id().clone(),
            statement: question.statement().to_owned(),
            kind: question.kind(),
            options: question.options().map(<[String]>::to_vec),
            time_limit_seconds: question.time_limit_seconds(),
            user_answer: question.user_answer().map(str::to_owned),
            is_correct: question.is_correct(),
            feedback: question.feedback().map(str::to_owned),
        }
    }

    /// Convert the record back into a domain `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the stored fields no longer validate.
    pub fn into_question(self) -> Result<Question, QuestionError> {
        Question::from_persisted(
            self.id,
            self.statement,
            self.kind,
            self.options,
            self.time_limit_seconds,
            self.user_answer,
            self.is_correct,
            self.feedback,
        )
    }
}

/// Everything needed to put a learner back exactly where they were.
///
/// Snapshots are written during the test and review phases only; the
/// other phases restart cleanly from scratch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub schema_version: String,
    pub phase: Phase,
    pub questions: Vec<QuestionRecord>,
    pub current_index: usize,
    pub time_left_seconds: u32,
    pub marked_for_review: BTreeSet<usize>,
    pub saved_at_epoch_ms: i64,
}

//
// ─── PERSISTENCE GUARD ─────────────────────────────────────────────────────────
//

/// Owns the snapshot lifecycle: autosave, restore-with-version-gate,
/// and deletion.
#[derive(Clone)]
pub struct PersistenceGuard {
    store: Arc<dyn KeyValueStore>,
}

impl PersistenceGuard {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Writes the snapshot under the versioned progress key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or the write fails.
    pub async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError> {
        let payload = serde_json::to_string(snapshot)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.store.set(&snapshot_key(), &payload).await
    }

    /// Reads the stored snapshot, enforcing the schema version gate.
    ///
    /// A snapshot whose `schemaVersion` differs from [`SCHEMA_VERSION`],
    /// or that no longer decodes, is deleted and reported as absent.
    /// There is no migration path by design of the format.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` only if the backend itself fails.
    pub async fn load(&self) -> Result<Option<SessionSnapshot>, StorageError> {
        let key = snapshot_key();
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<SessionSnapshot>(&raw) {
            Ok(snapshot) if snapshot.schema_version == SCHEMA_VERSION => Ok(Some(snapshot)),
            Ok(snapshot) => {
                info!(
                    found = %snapshot.schema_version,
                    expected = SCHEMA_VERSION,
                    "discarding snapshot with incompatible schema version"
                );
                self.store.delete(&key).await?;
                Ok(None)
            }
            Err(err) => {
                info!(error = %err, "discarding unreadable snapshot");
                self.store.delete(&key).await?;
                Ok(None)
            }
        }
    }

    /// Removes any stored snapshot. Deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.store.delete(&snapshot_key()).await
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use repaso_core::time::fixed_now;
    use storage::kv::InMemoryStore;

    fn answered_question() -> Question {
        let mut q = Question::multiple_choice(
            ItemId::new("q-1"),
            "Which keyword borrows?",
            vec!["let".to_string(), "ref".to_string()],
            20,
        )
        .unwrap();
        q.record_answer("ref");
        q
    }

    fn snapshot_with(questions: Vec<QuestionRecord>) -> SessionSnapshot {
        SessionSnapshot {
            schema_version: SCHEMA_VERSION.to_string(),
            phase: Phase::Test,
            questions,
            current_index: 0,
            time_left_seconds: 14,
            marked_for_review: BTreeSet::new(),
            saved_at_epoch_ms: fixed_now().timestamp_millis(),
        }
    }

    fn guard() -> (PersistenceGuard, Arc<dyn KeyValueStore>) {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        (PersistenceGuard::new(Arc::clone(&store)), store)
    }

    #[tokio::test]
    async fn load_returns_none_when_nothing_saved() {
        let (guard, _store) = guard();
        assert!(guard.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshot_round_trips_exactly() {
        let (guard, _store) = guard();

        let mut marked = BTreeSet::new();
        marked.insert(1);
        let mut snapshot = snapshot_with(vec![
            QuestionRecord::from_question(&answered_question()),
            QuestionRecord {
                id: ItemId::new("q-2"),
                statement: "Explain lifetimes".to_string(),
                kind: QuestionKind::Open,
                options: None,
                time_limit_seconds: 45,
                user_answer: None,
                is_correct: None,
                feedback: None,
            },
        ]);
        snapshot.current_index = 1;
        snapshot.marked_for_review = marked;

        guard.save(&snapshot).await.unwrap();
        let loaded = guard.load().await.unwrap().expect("snapshot present");

        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn wire_format_is_camel_case() {
        let (guard, store) = guard();
        guard
            .save(&snapshot_with(vec![QuestionRecord::from_question(
                &answered_question(),
            )]))
            .await
            .unwrap();

        let raw = store.get(&snapshot_key()).await.unwrap().unwrap();
        assert!(raw.contains("\"schemaVersion\":\"v2\""));
        assert!(raw.contains("\"currentIndex\""));
        assert!(raw.contains("\"timeLeftSeconds\""));
        assert!(raw.contains("\"markedForReview\""));
        assert!(raw.contains("\"savedAtEpochMs\""));
        assert!(raw.contains("\"timeLimitSeconds\""));
        assert!(raw.contains("\"userAnswer\""));
        assert!(raw.contains("\"kind\":\"multiple_choice\""));
    }

    #[tokio::test]
    async fn unanswered_fields_are_omitted_from_the_wire() {
        let (guard, store) = guard();
        guard
            .save(&snapshot_with(vec![QuestionRecord {
                id: ItemId::new("q-2"),
                statement: "Explain lifetimes".to_string(),
                kind: QuestionKind::Open,
                options: None,
                time_limit_seconds: 45,
                user_answer: None,
                is_correct: None,
                feedback: None,
            }]))
            .await
            .unwrap();

        let raw = store.get(&snapshot_key()).await.unwrap().unwrap();
        assert!(!raw.contains("\"userAnswer\""));
        assert!(!raw.contains("\"isCorrect\""));
        assert!(!raw.contains("\"feedback\""));
        assert!(!raw.contains("\"options\""));
    }

    #[tokio::test]
    async fn version_mismatch_is_deleted_not_migrated() {
        let (guard, store) = guard();
        let stale = r#"{"schemaVersion":"v1","phase":"test","questions":[],"currentIndex":0,"timeLeftSeconds":9,"markedForReview":[],"savedAtEpochMs":0}"#;
        store.set(&snapshot_key(), stale).await.unwrap();

        assert!(guard.load().await.unwrap().is_none());
        assert_eq!(store.get(&snapshot_key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_payload_is_deleted() {
        let (guard, store) = guard();
        store.set(&snapshot_key(), "{not json").await.unwrap();

        assert!(guard.load().await.unwrap().is_none());
        assert_eq!(store.get(&snapshot_key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_removes_the_snapshot() {
        let (guard, store) = guard();
        guard.save(&snapshot_with(Vec::new())).await.unwrap();
        guard.clear().await.unwrap();

        assert_eq!(store.get(&snapshot_key()).await.unwrap(), None);

        guard.clear().await.unwrap();
    }

    #[test]
    fn record_preserves_verdict_through_rehydration() {
        let mut q = answered_question();
        q.record_grade(true, "Correct! ref borrows.");

        let record = QuestionRecord::from_question(&q);
        let back = record.into_question().unwrap();

        assert_eq!(back, q);
    }

    #[test]
    fn record_rehydration_revalidates() {
        let record = QuestionRecord {
            id: ItemId::new("q-9"),
            statement: "  ".to_string(),
            kind: QuestionKind::Open,
            options: None,
            time_limit_seconds: 30,
            user_answer: None,
            is_correct: None,
            feedback: None,
        };

        assert!(record.into_question().is_err());
    }
}
