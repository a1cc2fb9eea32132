use std::sync::Arc;

use learn_core::model::UserId;
use storage::repository::{QuestionBank, Storage};

use crate::Clock;
use crate::error::AppServicesError;
use crate::mastery_ledger::MasteryLedger;
use crate::practice::PracticeOrchestrator;

/// Assembles app-facing services for one learner.
#[derive(Clone)]
pub struct AppServices {
    user_id: UserId,
    questions: Arc<dyn QuestionBank>,
    ledger: MasteryLedger,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        user_id: UserId,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        tracing::debug!(db_url, user = %user_id, "sqlite storage ready");
        Ok(Self::from_storage(&storage, clock, user_id))
    }

    #[must_use]
    pub fn in_memory(clock: Clock, user_id: UserId) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, user_id)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, user_id: UserId) -> Self {
        let ledger = MasteryLedger::new(clock, Arc::clone(&storage.mastery));
        Self {
            user_id,
            questions: Arc::clone(&storage.questions),
            ledger,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn questions(&self) -> Arc<dyn QuestionBank> {
        Arc::clone(&self.questions)
    }

    #[must_use]
    pub fn ledger(&self) -> &MasteryLedger {
        &self.ledger
    }

    /// A fresh, idle orchestrator for this learner.
    #[must_use]
    pub fn practice(&self) -> PracticeOrchestrator {
        PracticeOrchestrator::new(
            self.user_id,
            Arc::clone(&self.questions),
            self.ledger.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::model::{ModuleId, TopicKey};
    use learn_core::time::fixed_clock;

    #[tokio::test]
    async fn sqlite_services_share_one_store() {
        let services = AppServices::new_sqlite(
            "sqlite:file:memdb_app_services?mode=memory&cache=shared",
            fixed_clock(),
            UserId::new(4),
        )
        .await
        .unwrap();
        let topic = TopicKey::parse("chemistry", "bonds").unwrap();

        services
            .ledger()
            .record_attempt(services.user_id(), &topic, 2, 3)
            .await
            .unwrap();

        let practice = services.practice();
        assert!(practice.has_attempted(&topic).await.unwrap());
        assert!(!practice.has_questions_for_section(&topic).await.unwrap());
        let module = ModuleId::new("chemistry").unwrap();
        assert_eq!(practice.module_progress(&module).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn in_memory_services_start_idle() {
        let services = AppServices::in_memory(fixed_clock(), UserId::new(2));
        let practice = services.practice();
        assert_eq!(practice.user_id(), UserId::new(2));
        assert!(!practice.snapshot().is_complete());
        assert!(practice.state().questions().is_none());
    }
}
