use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learn_core::model::{AttemptScore, MasteryRecord, ModuleId, QuestionSet, TopicKey, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Source of authored practice questions.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Ordered questions for a section. Unknown sections yield an empty set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be read.
    async fn questions_for_section(&self, topic: &TopicKey) -> Result<QuestionSet, StorageError>;

    /// Whether practice should be offered for a section at all.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be read.
    async fn has_questions_for_section(&self, topic: &TopicKey) -> Result<bool, StorageError>;

    /// Replace every question of the set's section with the given ones.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the section cannot be stored.
    async fn put_section(&self, questions: &QuestionSet) -> Result<(), StorageError>;
}

/// Durable store of per-user, per-topic mastery.
#[async_trait]
pub trait MasteryRepository: Send + Sync {
    /// Fold one completed attempt into the record for `(user_id, topic)`.
    ///
    /// Implementations must apply the whole read-modify-write atomically so that
    /// concurrent attempts on the same key are all counted and the best score is
    /// the true maximum.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be durably written.
    async fn record_attempt(
        &self,
        user_id: UserId,
        topic: &TopicKey,
        score: AttemptScore,
        at: DateTime<Utc>,
    ) -> Result<MasteryRecord, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_record(
        &self,
        user_id: UserId,
        topic: &TopicKey,
    ) -> Result<Option<MasteryRecord>, StorageError>;

    /// Records for every attempted section of a module, ordered by section name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_module_records(
        &self,
        user_id: UserId,
        module_id: &ModuleId,
    ) -> Result<Vec<MasteryRecord>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sections: Arc<Mutex<HashMap<TopicKey, QuestionSet>>>,
    mastery: Arc<Mutex<HashMap<(UserId, TopicKey), MasteryRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuestionBank for InMemoryRepository {
    async fn questions_for_section(&self, topic: &TopicKey) -> Result<QuestionSet, StorageError> {
        let guard = self
            .sections
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .get(topic)
            .cloned()
            .unwrap_or_else(|| QuestionSet::empty(topic.clone())))
    }

    async fn has_questions_for_section(&self, topic: &TopicKey) -> Result<bool, StorageError> {
        let guard = self
            .sections
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(topic).is_some_and(|set| !set.is_empty()))
    }

    async fn put_section(&self, questions: &QuestionSet) -> Result<(), StorageError> {
        let mut guard = self
            .sections
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(questions.topic().clone(), questions.clone());
        Ok(())
    }
}

#[async_trait]
impl MasteryRepository for InMemoryRepository {
    async fn record_attempt(
        &self,
        user_id: UserId,
        topic: &TopicKey,
        score: AttemptScore,
        at: DateTime<Utc>,
    ) -> Result<MasteryRecord, StorageError> {
        let mut guard = self
            .mastery
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let record = guard
            .entry((user_id, topic.clone()))
            .and_modify(|existing| existing.apply_attempt(score, at))
            .or_insert_with(|| MasteryRecord::first(user_id, topic.clone(), score, at));
        Ok(record.clone())
    }

    async fn get_record(
        &self,
        user_id: UserId,
        topic: &TopicKey,
    ) -> Result<Option<MasteryRecord>, StorageError> {
        let guard = self
            .mastery
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(user_id, topic.clone())).cloned())
    }

    async fn list_module_records(
        &self,
        user_id: UserId,
        module_id: &ModuleId,
    ) -> Result<Vec<MasteryRecord>, StorageError> {
        let guard = self
            .mastery
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut records: Vec<MasteryRecord> = guard
            .iter()
            .filter(|((user, topic), _)| *user == user_id && topic.module_id() == module_id)
            .map(|(_, record)| record.clone())
            .collect();
        records.sort_by(|a, b| a.topic().section().cmp(b.topic().section()));
        Ok(records)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionBank>,
    pub mastery: Arc<dyn MasteryRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let questions: Arc<dyn QuestionBank> = Arc::new(repo.clone());
        let mastery: Arc<dyn MasteryRepository> = Arc::new(repo);
        Self { questions, mastery }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::model::{Choice, ChoiceId, Question, QuestionId};
    use learn_core::time::fixed_now;

    fn topic(section: &str) -> TopicKey {
        TopicKey::parse("geography", section).unwrap()
    }

    fn section(topic: TopicKey, n: usize) -> QuestionSet {
        let questions = (1..=n)
            .map(|i| {
                Question::new(
                    QuestionId::new(format!("q{i}")),
                    format!("Prompt {i}"),
                    vec![Choice::new("a", "A"), Choice::new("b", "B")],
                    ChoiceId::new("a"),
                    "",
                )
                .unwrap()
            })
            .collect();
        QuestionSet::new(topic, questions).unwrap()
    }

    fn score(correct: u32) -> AttemptScore {
        AttemptScore::new(correct, 5).unwrap()
    }

    #[tokio::test]
    async fn unknown_section_is_empty() {
        let repo = InMemoryRepository::new();
        let set = repo.questions_for_section(&topic("rivers")).await.unwrap();
        assert!(set.is_empty());
        assert!(!repo.has_questions_for_section(&topic("rivers")).await.unwrap());
    }

    #[tokio::test]
    async fn put_section_replaces_questions() {
        let repo = InMemoryRepository::new();
        repo.put_section(&section(topic("rivers"), 5)).await.unwrap();
        repo.put_section(&section(topic("rivers"), 3)).await.unwrap();

        let set = repo.questions_for_section(&topic("rivers")).await.unwrap();
        assert_eq!(set.len(), 3);
        assert!(repo.has_questions_for_section(&topic("rivers")).await.unwrap());
    }

    #[tokio::test]
    async fn record_attempt_accumulates_per_key() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(7);
        let rivers = topic("rivers");

        repo.record_attempt(user, &rivers, score(3), fixed_now())
            .await
            .unwrap();
        let record = repo
            .record_attempt(user, &rivers, score(4), fixed_now())
            .await
            .unwrap();
        assert_eq!(record.best_score(), 4);
        assert_eq!(record.attempt_count(), 2);

        let record = repo
            .record_attempt(user, &rivers, score(2), fixed_now())
            .await
            .unwrap();
        assert_eq!(record.best_score(), 4);
        assert_eq!(record.attempt_count(), 3);
        assert_eq!(record.last_score(), 2);

        let other_user = repo.get_record(UserId::new(8), &rivers).await.unwrap();
        assert!(other_user.is_none());
    }

    #[tokio::test]
    async fn list_module_records_filters_and_sorts() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(1);
        for name in ["volcanoes", "deserts", "rivers"] {
            repo.record_attempt(user, &topic(name), score(1), fixed_now())
                .await
                .unwrap();
        }
        let other = TopicKey::parse("history", "empires").unwrap();
        repo.record_attempt(user, &other, score(1), fixed_now())
            .await
            .unwrap();

        let module = ModuleId::new("geography").unwrap();
        let records = repo.list_module_records(user, &module).await.unwrap();
        let names: Vec<_> = records
            .iter()
            .map(|r| r.topic().section().as_str().to_string())
            .collect();
        assert_eq!(names, vec!["deserts", "rivers", "volcanoes"]);
    }

    #[tokio::test]
    async fn concurrent_attempts_on_same_key_serialize() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(1);
        let rivers = topic("rivers");

        let mut handles = Vec::new();
        for correct in 0..=5 {
            let repo = repo.clone();
            let rivers = rivers.clone();
            handles.push(tokio::spawn(async move {
                repo.record_attempt(user, &rivers, score(correct), fixed_now())
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let record = repo.get_record(user, &rivers).await.unwrap().unwrap();
        assert_eq!(record.attempt_count(), 6);
        assert_eq!(record.best_score(), 5);
    }
}
