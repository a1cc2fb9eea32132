use std::fmt;
use std::sync::Arc;

use learn_core::model::{
    AttemptScore, BestScore, ChoiceId, MasteryRecord, ModuleId, TopicKey, UserId,
};
use learn_core::practice::{PracticeEffect, PracticeError, PracticeIntent, PracticeState, transition};
use storage::repository::QuestionBank;

use super::snapshot::{LedgerWrite, PracticeSnapshot};
use crate::error::PracticeServiceError;
use crate::mastery_ledger::MasteryLedger;

/// Runs practice sessions for one learner and records completed runs.
///
/// Every operation returns a fresh `PracticeSnapshot` for rendering. A run that
/// reaches `Complete` is written to the ledger exactly once; a failed write is
/// logged and reported in the snapshot but never undoes the completion.
pub struct PracticeOrchestrator {
    user_id: UserId,
    questions: Arc<dyn QuestionBank>,
    ledger: MasteryLedger,
    state: PracticeState,
    topic: Option<TopicKey>,
    ledger_write: LedgerWrite,
}

impl PracticeOrchestrator {
    #[must_use]
    pub fn new(user_id: UserId, questions: Arc<dyn QuestionBank>, ledger: MasteryLedger) -> Self {
        Self {
            user_id,
            questions,
            ledger,
            state: PracticeState::Idle,
            topic: None,
            ledger_write: LedgerWrite::NotRequired,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn state(&self) -> &PracticeState {
        &self.state
    }

    #[must_use]
    pub fn snapshot(&self) -> PracticeSnapshot {
        PracticeSnapshot::capture(&self.state, &self.ledger_write)
    }

    //
    // ─── SESSION LIFECYCLE ─────────────────────────────────────────────────────
    //

    /// Load the section's questions and begin a new run, discarding any current one.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::EmptyQuestionSet` (wrapped) if the section has no
    /// questions, or `PracticeServiceError::Storage` if the bank cannot be read.
    /// On error the previous state is kept.
    pub async fn start_session(
        &mut self,
        topic: TopicKey,
    ) -> Result<PracticeSnapshot, PracticeServiceError> {
        let questions = self.questions.questions_for_section(&topic).await?;
        let count = questions.len();
        self.apply(PracticeIntent::Start(questions))?;
        self.topic = Some(topic);
        self.ledger_write = LedgerWrite::NotRequired;
        tracing::info!(user = %self.user_id, topic = ?self.topic, questions = count, "practice session started");
        Ok(self.snapshot())
    }

    /// Start again from a fresh fetch of the same section.
    ///
    /// # Errors
    ///
    /// Returns `PracticeServiceError::NoTopic` if no session was started, otherwise
    /// the same errors as `start_session`.
    pub async fn retry(&mut self) -> Result<PracticeSnapshot, PracticeServiceError> {
        let topic = self.topic.clone().ok_or(PracticeServiceError::NoTopic)?;
        self.start_session(topic).await
    }

    /// Start the same question snapshot over. Anything already recorded stays as is.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::InvalidState` (wrapped) when idle.
    pub fn restart(&mut self) -> Result<PracticeSnapshot, PracticeServiceError> {
        self.apply(PracticeIntent::Restart)?;
        self.ledger_write = LedgerWrite::NotRequired;
        Ok(self.snapshot())
    }

    /// Abandon the current run. Never writes to the ledger.
    pub fn exit(&mut self) -> PracticeSnapshot {
        if let PracticeState::InProgress(run) = &self.state {
            tracing::info!(
                user = %self.user_id,
                topic = %run.questions().topic(),
                answered = run.answers().len(),
                "practice session abandoned"
            );
        }
        self.state = PracticeState::Idle;
        self.topic = None;
        self.ledger_write = LedgerWrite::NotRequired;
        self.snapshot()
    }

    //
    // ─── ANSWERING ─────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `PracticeError::InvalidState` outside a run and
    /// `PracticeError::UnknownChoice` for a choice the question does not offer.
    pub fn select_choice(
        &mut self,
        choice_id: ChoiceId,
    ) -> Result<PracticeSnapshot, PracticeServiceError> {
        self.apply(PracticeIntent::Select(choice_id))?;
        Ok(self.snapshot())
    }

    /// # Errors
    ///
    /// Returns `PracticeError::InvalidState` when nothing is selected or the
    /// answer was already checked.
    pub fn check_answer(&mut self) -> Result<PracticeSnapshot, PracticeServiceError> {
        self.apply(PracticeIntent::Check)?;
        Ok(self.snapshot())
    }

    /// Move past a checked question. Past the last one the run completes and the
    /// attempt is recorded.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::InvalidState` before the answer is checked. Ledger
    /// failures are not errors here; see `PracticeSnapshot::ledger`.
    pub async fn advance(&mut self) -> Result<PracticeSnapshot, PracticeServiceError> {
        if let Some(PracticeEffect::Completed { topic, score }) = self.apply(PracticeIntent::Advance)? {
            tracing::info!(
                user = %self.user_id,
                %topic,
                correct = score.correct(),
                total = score.out_of(),
                "practice session complete"
            );
            self.persist(&topic, score).await;
        }
        Ok(self.snapshot())
    }

    /// Try again to record a completed run whose ledger write failed or never
    /// finished.
    ///
    /// Does nothing if the run is already recorded. There is no automatic retry;
    /// the caller decides when to call this.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::InvalidState` (wrapped) unless the run is complete.
    pub async fn retry_record(&mut self) -> Result<PracticeSnapshot, PracticeServiceError> {
        let PracticeState::Complete(run) = &self.state else {
            return Err(PracticeError::InvalidState {
                operation: "record the attempt",
                phase: self.state.phase(),
            }
            .into());
        };
        if let Some(score) = self.ledger_write.unrecorded_score() {
            let topic = run.questions().topic().clone();
            self.persist(&topic, score).await;
        }
        Ok(self.snapshot())
    }

    //
    // ─── QUERIES ───────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `PracticeServiceError::Storage` if the bank cannot be read.
    pub async fn has_questions_for_section(
        &self,
        topic: &TopicKey,
    ) -> Result<bool, PracticeServiceError> {
        Ok(self.questions.has_questions_for_section(topic).await?)
    }

    /// # Errors
    ///
    /// Returns `PracticeServiceError::Ledger` on storage failures.
    pub async fn best_score(
        &self,
        topic: &TopicKey,
    ) -> Result<Option<BestScore>, PracticeServiceError> {
        Ok(self.ledger.best_score(self.user_id, topic).await?)
    }

    /// # Errors
    ///
    /// Returns `PracticeServiceError::Ledger` on storage failures.
    pub async fn has_attempted(&self, topic: &TopicKey) -> Result<bool, PracticeServiceError> {
        Ok(self.ledger.has_attempted(self.user_id, topic).await?)
    }

    /// # Errors
    ///
    /// Returns `PracticeServiceError::Ledger` on storage failures.
    pub async fn module_progress(
        &self,
        module_id: &ModuleId,
    ) -> Result<Vec<MasteryRecord>, PracticeServiceError> {
        Ok(self.ledger.module_progress(self.user_id, module_id).await?)
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn apply(&mut self, intent: PracticeIntent) -> Result<Option<PracticeEffect>, PracticeError> {
        let operation = intent.name();
        let next = transition(&self.state, intent).inspect_err(|err| {
            tracing::debug!(operation, phase = %self.state.phase(), error = %err, "practice intent rejected");
        })?;
        tracing::debug!(operation, from = %self.state.phase(), to = %next.next.phase(), "practice transition");
        self.state = next.next;
        Ok(next.effect)
    }

    /// Marks the write pending first, so a dropped future leaves a retryable state.
    async fn persist(&mut self, topic: &TopicKey, score: AttemptScore) {
        self.ledger_write = LedgerWrite::Pending { score };
        self.ledger_write = match self.ledger.record_score(self.user_id, topic, score).await {
            Ok(record) => LedgerWrite::Recorded { record },
            Err(err) => {
                tracing::warn!(user = %self.user_id, %topic, error = %err, "failed to record practice attempt");
                LedgerWrite::Failed {
                    score,
                    reason: err.to_string(),
                }
            }
        };
    }
}

impl fmt::Debug for PracticeOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PracticeOrchestrator")
            .field("user_id", &self.user_id)
            .field("phase", &self.state.phase())
            .field("topic", &self.topic)
            .field("ledger_write", &self.ledger_write)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::model::{Choice, Question, QuestionId, QuestionSet};
    use learn_core::practice::PhaseKind;
    use learn_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    fn topic() -> TopicKey {
        TopicKey::parse("statistics", "variance").unwrap()
    }

    async fn orchestrator_with(n: usize) -> PracticeOrchestrator {
        let repo = InMemoryRepository::new();
        let questions = (1..=n)
            .map(|i| {
                Question::new(
                    QuestionId::new(format!("q{i}")),
                    format!("Prompt {i}"),
                    vec![Choice::new("a", "A"), Choice::new("b", "B")],
                    ChoiceId::new("a"),
                    format!("Because {i}"),
                )
                .unwrap()
            })
            .collect();
        repo.put_section(&QuestionSet::new(topic(), questions).unwrap())
            .await
            .unwrap();
        PracticeOrchestrator::new(
            UserId::new(1),
            Arc::new(repo.clone()),
            MasteryLedger::new(fixed_clock(), Arc::new(repo)),
        )
    }

    #[tokio::test]
    async fn snapshot_hides_answer_until_checked() {
        let mut orch = orchestrator_with(2).await;
        let snap = orch.start_session(topic()).await.unwrap();
        assert_eq!(snap.phase, PhaseKind::Unanswered);
        assert!(snap.feedback.is_none());
        assert_eq!(snap.question.as_ref().unwrap().choices.len(), 2);

        orch.select_choice(ChoiceId::new("b")).unwrap();
        let snap = orch.check_answer().unwrap();
        let feedback = snap.feedback.unwrap();
        assert!(!feedback.answer.is_correct());
        assert_eq!(feedback.correct_choice_id, ChoiceId::new("a"));
        assert_eq!(feedback.explanation, "Because 1");
    }

    #[tokio::test]
    async fn start_on_empty_section_keeps_previous_state() {
        let mut orch = orchestrator_with(2).await;
        orch.start_session(topic()).await.unwrap();

        let missing = TopicKey::parse("statistics", "unwritten").unwrap();
        let err = orch.start_session(missing).await.unwrap_err();
        assert!(matches!(
            err,
            PracticeServiceError::Practice(PracticeError::EmptyQuestionSet)
        ));
        assert_eq!(orch.snapshot().topic, Some(topic()));
        assert_eq!(orch.snapshot().phase, PhaseKind::Unanswered);
    }

    #[tokio::test]
    async fn retry_without_session_reports_no_topic() {
        let mut orch = orchestrator_with(1).await;
        let err = orch.retry().await.unwrap_err();
        assert!(matches!(err, PracticeServiceError::NoTopic));
    }

    #[tokio::test]
    async fn completion_records_and_reports_best() {
        let mut orch = orchestrator_with(2).await;
        orch.start_session(topic()).await.unwrap();
        for _ in 0..2 {
            orch.select_choice(ChoiceId::new("a")).unwrap();
            orch.check_answer().unwrap();
            orch.advance().await.unwrap();
        }

        let snap = orch.snapshot();
        assert!(snap.is_complete());
        assert_eq!(snap.score, Some(AttemptScore::new(2, 2).unwrap()));
        assert!(matches!(snap.ledger, LedgerWrite::Recorded { .. }));
        assert_eq!(
            orch.best_score(&topic()).await.unwrap(),
            Some(BestScore { score: 2, out_of: 2 })
        );

        // Already recorded: nothing new is written.
        orch.retry_record().await.unwrap();
        orch.advance().await.unwrap();
        let record = orch.module_progress(topic().module_id()).await.unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record[0].attempt_count(), 1);
    }

    #[tokio::test]
    async fn retry_record_requires_complete_run() {
        let mut orch = orchestrator_with(1).await;
        orch.start_session(topic()).await.unwrap();
        let err = orch.retry_record().await.unwrap_err();
        assert!(matches!(
            err,
            PracticeServiceError::Practice(PracticeError::InvalidState {
                phase: PhaseKind::Unanswered,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn snapshot_serializes_for_rendering() {
        let mut orch = orchestrator_with(1).await;
        let snap = orch.start_session(topic()).await.unwrap();
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["phase"], "unanswered");
        assert_eq!(json["ledger"]["status"], "not_required");
        assert_eq!(json["question"]["choices"][0]["id"], "a");
    }
}
