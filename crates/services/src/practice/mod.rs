mod orchestrator;
mod snapshot;

// Public API of the practice subsystem.
pub use crate::error::PracticeServiceError;
pub use orchestrator::PracticeOrchestrator;
pub use snapshot::{Feedback, LedgerWrite, PracticeSnapshot, QuestionView};
