#![forbid(unsafe_code)]

//! Domain types for the repaso weekly review engine.
//!
//! Everything here is plain data with validation: questions, session
//! phases, and result summaries. Timekeeping goes through [`Clock`] so
//! services and tests can run deterministically.

pub mod model;
pub mod time;

pub use model::{ItemId, Phase, Question, QuestionError, QuestionKind, SessionResult};
pub use time::Clock;
