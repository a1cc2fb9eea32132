mod ids;
mod mastery;
mod question;
mod topic;

pub use ids::{ChoiceId, ParseIdError, QuestionId, UserId};
pub use mastery::{AttemptError, AttemptScore, BestScore, MasteryRecord};
pub use question::{Choice, Question, QuestionError, QuestionSet, QuestionSetError};
pub use topic::{ModuleId, SectionName, TopicError, TopicKey};
