use std::sync::Arc;

use learn_core::model::{AttemptScore, BestScore, MasteryRecord, ModuleId, TopicKey, UserId};
use storage::repository::{InMemoryRepository, MasteryRepository};

use crate::Clock;
use crate::error::LedgerError;

/// Facade over the mastery store that owns the time source.
///
/// The caller always passes the user explicitly; there is no ambient "current user".
#[derive(Clone)]
pub struct MasteryLedger {
    clock: Clock,
    records: Arc<dyn MasteryRepository>,
}

impl MasteryLedger {
    #[must_use]
    pub fn new(clock: Clock, records: Arc<dyn MasteryRepository>) -> Self {
        Self { clock, records }
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::new(clock, Arc::new(InMemoryRepository::new()))
    }

    /// Record one completed attempt from raw counts.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Attempt` if the counts are out of range and
    /// `LedgerError::Storage` if the write fails.
    pub async fn record_attempt(
        &self,
        user_id: UserId,
        topic: &TopicKey,
        correct_count: u32,
        total_count: u32,
    ) -> Result<MasteryRecord, LedgerError> {
        let score = AttemptScore::new(correct_count, total_count)?;
        self.record_score(user_id, topic, score).await
    }

    /// Record one completed, already-validated attempt.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the write fails. Nothing is retried.
    pub async fn record_score(
        &self,
        user_id: UserId,
        topic: &TopicKey,
        score: AttemptScore,
    ) -> Result<MasteryRecord, LedgerError> {
        let record = self
            .records
            .record_attempt(user_id, topic, score, self.clock.now())
            .await?;
        tracing::debug!(
            user = %user_id,
            %topic,
            attempts = record.attempt_count(),
            best = record.best_score(),
            "mastery attempt recorded"
        );
        Ok(record)
    }

    /// Best score for a topic, or `None` if the user never completed it.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` on repository failures.
    pub async fn best_score(
        &self,
        user_id: UserId,
        topic: &TopicKey,
    ) -> Result<Option<BestScore>, LedgerError> {
        Ok(self
            .records
            .get_record(user_id, topic)
            .await?
            .map(|record| record.best()))
    }

    /// # Errors
    ///
    /// Returns `LedgerError::Storage` on repository failures.
    pub async fn has_attempted(&self, user_id: UserId, topic: &TopicKey) -> Result<bool, LedgerError> {
        Ok(self.records.get_record(user_id, topic).await?.is_some())
    }

    /// # Errors
    ///
    /// Returns `LedgerError::Storage` on repository failures.
    pub async fn record(
        &self,
        user_id: UserId,
        topic: &TopicKey,
    ) -> Result<Option<MasteryRecord>, LedgerError> {
        Ok(self.records.get_record(user_id, topic).await?)
    }

    /// Attempted sections of a module, ordered by section name.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` on repository failures.
    pub async fn module_progress(
        &self,
        user_id: UserId,
        module_id: &ModuleId,
    ) -> Result<Vec<MasteryRecord>, LedgerError> {
        Ok(self.records.list_module_records(user_id, module_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::time::{fixed_clock, fixed_now};

    fn topic() -> TopicKey {
        TopicKey::parse("algebra", "linear equations").unwrap()
    }

    #[tokio::test]
    async fn three_attempts_keep_best_and_count() {
        let ledger = MasteryLedger::in_memory(fixed_clock());
        let user = UserId::new(1);

        ledger.record_attempt(user, &topic(), 3, 5).await.unwrap();
        let record = ledger.record_attempt(user, &topic(), 4, 5).await.unwrap();
        assert_eq!(
            (record.best_score(), record.attempt_count(), record.last_score()),
            (4, 2, 4)
        );

        let record = ledger.record_attempt(user, &topic(), 2, 5).await.unwrap();
        assert_eq!(
            (record.best_score(), record.attempt_count(), record.last_score()),
            (4, 3, 2)
        );
        assert_eq!(record.last_attempted_at(), fixed_now());
        assert_eq!(ledger.record(user, &topic()).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn queries_are_scoped_per_user() {
        let ledger = MasteryLedger::in_memory(fixed_clock());
        ledger
            .record_attempt(UserId::new(1), &topic(), 5, 5)
            .await
            .unwrap();

        assert!(ledger.has_attempted(UserId::new(1), &topic()).await.unwrap());
        assert!(!ledger.has_attempted(UserId::new(2), &topic()).await.unwrap());
        assert_eq!(
            ledger.best_score(UserId::new(1), &topic()).await.unwrap(),
            Some(BestScore { score: 5, out_of: 5 })
        );
        assert_eq!(ledger.best_score(UserId::new(2), &topic()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn out_of_range_counts_are_rejected_before_storage() {
        let ledger = MasteryLedger::in_memory(fixed_clock());
        let err = ledger
            .record_attempt(UserId::new(1), &topic(), 6, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Attempt(_)));
        assert!(!ledger.has_attempted(UserId::new(1), &topic()).await.unwrap());
    }
}
