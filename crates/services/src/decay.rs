use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use repaso_core::model::ItemId;
use storage::kv::{KeyValueStore, StorageError};

/// Durable key holding the ids of every item ever missed in a session.
pub const DECAYED_ITEMS_KEY: &str = "decayed_items";

/// Key of the completion flag for the month containing `at`, e.g.
/// `repaso_done_202501`.
#[must_use]
pub fn month_flag_key(at: DateTime<Utc>) -> String {
    format!("repaso_done_{}", at.format("%Y%m"))
}

/// Accumulates failed item ids across sessions.
///
/// The decay set only ever grows: recording failures unions them into
/// whatever is already stored. Re-learning flows consume the set
/// elsewhere; nothing in this engine removes entries.
#[derive(Clone)]
pub struct DecayTracker {
    store: Arc<dyn KeyValueStore>,
}

impl DecayTracker {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Unions `failed` into the stored decay set and returns the new
    /// set size.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the stored set cannot be read, decoded,
    /// or written back. The stored value is left untouched on error.
    pub async fn record_failures(
        &self,
        failed: &BTreeSet<ItemId>,
    ) -> Result<usize, StorageError> {
        let mut pending = self.pending().await?;
        pending.extend(failed.iter().cloned());

        let payload = serde_json::to_string(&pending)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.store.set(DECAYED_ITEMS_KEY, &payload).await?;
        Ok(pending.len())
    }

    /// Reads the current decay set. An absent key is an empty set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored payload does
    /// not decode; a corrupt set is never silently replaced.
    pub async fn pending(&self) -> Result<BTreeSet<ItemId>, StorageError> {
        let Some(raw) = self.store.get(DECAYED_ITEMS_KEY).await? else {
            return Ok(BTreeSet::new());
        };
        serde_json::from_str(&raw).map_err(|err| StorageError::Serialization(err.to_string()))
    }

    /// Marks the month containing `at` as completed. The flag is set
    /// at results time regardless of score.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn mark_month_complete(&self, at: DateTime<Utc>) -> Result<(), StorageError> {
        self.store.set(&month_flag_key(at), "true").await
    }
}
