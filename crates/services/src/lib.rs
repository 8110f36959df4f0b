#![forbid(unsafe_code)]

pub mod decay;
pub mod error;
pub mod grading;
pub mod persistence;
pub mod questions;
pub mod session;
pub mod timer;

pub use repaso_core::Clock;

pub use decay::DecayTracker;
pub use error::{ReasoningError, SessionError};
pub use grading::{
    GradeReport, GradeVerdict, GradingOrchestrator, GradingRequest, OpenAiReasoningService,
    ReasoningConfig, ReasoningService,
};
pub use persistence::{PersistenceGuard, QuestionRecord, SCHEMA_VERSION, SessionSnapshot};
pub use questions::{FixedQuestionSource, QuestionSource};
pub use session::{
    ADVANCE_DEBOUNCE_MS, AdvanceOutcome, REVIEW_PHASE_SECONDS, SessionController, SessionProgress,
    TickOutcome, WARNING_BAND_SECONDS,
};
pub use timer::{TimerEngine, TimerSignal};
