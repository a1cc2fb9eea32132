#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod mastery_ledger;
pub mod practice;

pub use learn_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, LedgerError, PracticeServiceError};
pub use mastery_ledger::MasteryLedger;
pub use practice::{Feedback, LedgerWrite, PracticeOrchestrator, PracticeSnapshot, QuestionView};
