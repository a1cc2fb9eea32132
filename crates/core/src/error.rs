use thiserror::Error;

use crate::model::{AttemptError, QuestionError, QuestionSetError, TopicError};
use crate::practice::PracticeError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    QuestionSet(#[from] QuestionSetError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Practice(#[from] PracticeError),
}
