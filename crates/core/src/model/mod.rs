mod ids;
mod phase;
mod question;
mod result;

pub use ids::ItemId;
pub use phase::Phase;
pub use question::{Question, QuestionError, QuestionKind};
pub use result::SessionResult;
