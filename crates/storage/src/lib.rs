#![forbid(unsafe_code)]

//! Durable storage for the repaso engine.
//!
//! Everything the engine persists goes through the [`kv::KeyValueStore`]
//! capability: session snapshots, the decay set, and monthly completion
//! flags are all string values under well-known keys. [`sqlite`] provides
//! the production backend; [`kv::InMemoryStore`] backs tests.

pub mod kv;
pub mod sqlite;

pub use kv::{InMemoryStore, KeyValueStore, StorageError};
pub use sqlite::{SqliteInitError, SqliteStore};
