use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;
use crate::model::topic::TopicKey;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("attempt must cover at least one question")]
    EmptyAttempt,

    #[error("correct count ({correct}) exceeds total ({out_of})")]
    ScoreOutOfRange { correct: u32, out_of: u32 },

    #[error("last attempt is before first attempt")]
    InvalidTimeRange,

    #[error("best score ({best}) is below last score ({last}) or out of range")]
    InconsistentRecord { best: u32, last: u32 },
}

/// Raw result of one completed practice run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttemptScore {
    correct: u32,
    out_of: u32,
}

impl AttemptScore {
    /// # Errors
    ///
    /// Returns `AttemptError` if `out_of` is zero or `correct` exceeds it.
    pub fn new(correct: u32, out_of: u32) -> Result<Self, AttemptError> {
        if out_of == 0 {
            return Err(AttemptError::EmptyAttempt);
        }
        if correct > out_of {
            return Err(AttemptError::ScoreOutOfRange { correct, out_of });
        }
        Ok(Self { correct, out_of })
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn out_of(&self) -> u32 {
        self.out_of
    }

    /// Whole-number percentage, rounded down.
    #[must_use]
    pub fn percent(&self) -> u32 {
        let pct = u64::from(self.correct) * 100 / u64::from(self.out_of);
        u32::try_from(pct).unwrap_or(100)
    }
}

/// Best score badge shown for a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestScore {
    pub score: u32,
    pub out_of: u32,
}

/// Durable per-user, per-topic practice outcome.
///
/// `attempt_count` and `best_score` never decrease; `last_*` always reflects the
/// most recent completed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MasteryRecord {
    user_id: UserId,
    topic: TopicKey,
    attempt_count: u32,
    best_score: u32,
    best_out_of: u32,
    last_score: u32,
    last_out_of: u32,
    first_attempted_at: DateTime<Utc>,
    last_attempted_at: DateTime<Utc>,
}

impl MasteryRecord {
    /// Record created by the first completed attempt for a (user, topic) pair.
    #[must_use]
    pub fn first(user_id: UserId, topic: TopicKey, score: AttemptScore, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            topic,
            attempt_count: 1,
            best_score: score.correct,
            best_out_of: score.out_of,
            last_score: score.correct,
            last_out_of: score.out_of,
            first_attempted_at: at,
            last_attempted_at: at,
        }
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the stored values violate the record invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        user_id: UserId,
        topic: TopicKey,
        attempt_count: u32,
        best_score: u32,
        best_out_of: u32,
        last_score: u32,
        last_out_of: u32,
        first_attempted_at: DateTime<Utc>,
        last_attempted_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if attempt_count == 0 {
            return Err(AttemptError::EmptyAttempt);
        }
        AttemptScore::new(best_score, best_out_of)?;
        AttemptScore::new(last_score, last_out_of)?;
        if best_score < last_score {
            return Err(AttemptError::InconsistentRecord {
                best: best_score,
                last: last_score,
            });
        }
        if last_attempted_at < first_attempted_at {
            return Err(AttemptError::InvalidTimeRange);
        }

        Ok(Self {
            user_id,
            topic,
            attempt_count,
            best_score,
            best_out_of,
            last_score,
            last_out_of,
            first_attempted_at,
            last_attempted_at,
        })
    }

    /// Fold another completed attempt into this record.
    ///
    /// Best is compared on raw correct count. `best_out_of` follows the attempt
    /// that set the best, so it only moves when `best_score` strictly rises.
    pub fn apply_attempt(&mut self, score: AttemptScore, at: DateTime<Utc>) {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.last_score = score.correct;
        self.last_out_of = score.out_of;
        if score.correct > self.best_score {
            self.best_score = score.correct;
            self.best_out_of = score.out_of;
        }
        if at > self.last_attempted_at {
            self.last_attempted_at = at;
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn topic(&self) -> &TopicKey {
        &self.topic
    }

    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    #[must_use]
    pub fn best_score(&self) -> u32 {
        self.best_score
    }

    #[must_use]
    pub fn best_out_of(&self) -> u32 {
        self.best_out_of
    }

    #[must_use]
    pub fn last_score(&self) -> u32 {
        self.last_score
    }

    #[must_use]
    pub fn last_out_of(&self) -> u32 {
        self.last_out_of
    }

    #[must_use]
    pub fn first_attempted_at(&self) -> DateTime<Utc> {
        self.first_attempted_at
    }

    #[must_use]
    pub fn last_attempted_at(&self) -> DateTime<Utc> {
        self.last_attempted_at
    }

    #[must_use]
    pub fn best(&self) -> BestScore {
        BestScore {
            score: self.best_score,
            out_of: self.best_out_of,
        }
    }
}
