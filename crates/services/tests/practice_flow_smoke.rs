use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learn_core::model::{
    AttemptScore, Choice, ChoiceId, MasteryRecord, ModuleId, Question, QuestionId, QuestionSet,
    TopicKey, UserId,
};
use learn_core::practice::PhaseKind;
use learn_core::time::fixed_clock;
use services::{LedgerWrite, MasteryLedger, PracticeOrchestrator};
use storage::repository::{
    InMemoryRepository, MasteryRepository, QuestionBank, StorageError,
};

/// Counts writes and can be told to fail them.
#[derive(Default)]
struct SpyMastery {
    inner: InMemoryRepository,
    calls: AtomicUsize,
    failing: AtomicBool,
    slow: AtomicBool,
    scores: Mutex<Vec<AttemptScore>>,
}

impl SpyMastery {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn set_slow(&self, slow: bool) {
        self.slow.store(slow, Ordering::SeqCst);
    }
}

#[async_trait]
impl MasteryRepository for SpyMastery {
    async fn record_attempt(
        &self,
        user_id: UserId,
        topic: &TopicKey,
        score: AttemptScore,
        at: DateTime<Utc>,
    ) -> Result<MasteryRecord, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.slow.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("disk unavailable".into()));
        }
        self.scores.lock().unwrap().push(score);
        self.inner.record_attempt(user_id, topic, score, at).await
    }

    async fn get_record(
        &self,
        user_id: UserId,
        topic: &TopicKey,
    ) -> Result<Option<MasteryRecord>, StorageError> {
        self.inner.get_record(user_id, topic).await
    }

    async fn list_module_records(
        &self,
        user_id: UserId,
        module_id: &ModuleId,
    ) -> Result<Vec<MasteryRecord>, StorageError> {
        self.inner.list_module_records(user_id, module_id).await
    }
}

fn topic() -> TopicKey {
    TopicKey::parse("physics", "kinematics").unwrap()
}

async fn setup(n: usize) -> (PracticeOrchestrator, Arc<SpyMastery>, InMemoryRepository) {
    let bank = InMemoryRepository::new();
    let questions = (1..=n)
        .map(|i| {
            Question::new(
                QuestionId::new(format!("k{i}")),
                format!("Question {i}"),
                vec![
                    Choice::new("right", "Right"),
                    Choice::new("wrong", "Wrong"),
                ],
                ChoiceId::new("right"),
                "",
            )
            .unwrap()
        })
        .collect();
    bank.put_section(&QuestionSet::new(topic(), questions).unwrap())
        .await
        .unwrap();

    let spy = Arc::new(SpyMastery::default());
    let ledger = MasteryLedger::new(fixed_clock(), Arc::clone(&spy) as Arc<dyn MasteryRepository>);
    let orchestrator = PracticeOrchestrator::new(UserId::new(1), Arc::new(bank.clone()), ledger);
    (orchestrator, spy, bank)
}

async fn answer(orch: &mut PracticeOrchestrator, choice: &str) {
    orch.select_choice(ChoiceId::new(choice)).unwrap();
    orch.check_answer().unwrap();
    orch.advance().await.unwrap();
}

#[tokio::test]
async fn five_questions_two_correct_records_once() {
    let (mut orch, spy, _) = setup(5).await;
    orch.start_session(topic()).await.unwrap();

    for choice in ["right", "wrong", "right", "wrong", "wrong"] {
        answer(&mut orch, choice).await;
    }

    let snap = orch.snapshot();
    assert_eq!(snap.phase, PhaseKind::Complete);
    assert_eq!(snap.score, Some(AttemptScore::new(2, 5).unwrap()));
    assert_eq!(spy.calls(), 1);
    assert_eq!(*spy.scores.lock().unwrap(), vec![AttemptScore::new(2, 5).unwrap()]);

    // Advancing a finished run is a no-op and never re-records.
    orch.advance().await.unwrap();
    orch.advance().await.unwrap();
    assert_eq!(spy.calls(), 1);
}

#[tokio::test]
async fn exit_before_complete_records_nothing() {
    let (mut orch, spy, _) = setup(3).await;
    orch.start_session(topic()).await.unwrap();
    answer(&mut orch, "right").await;
    answer(&mut orch, "right").await;

    let snap = orch.exit();
    assert_eq!(snap.phase, PhaseKind::Idle);
    assert_eq!(spy.calls(), 0);
    assert!(!orch.has_attempted(&topic()).await.unwrap());
}

#[tokio::test]
async fn restart_keeps_persisted_record() {
    let (mut orch, spy, _) = setup(2).await;
    orch.start_session(topic()).await.unwrap();
    answer(&mut orch, "right").await;
    answer(&mut orch, "right").await;
    assert_eq!(spy.calls(), 1);

    let snap = orch.restart().unwrap();
    assert_eq!(snap.phase, PhaseKind::Unanswered);
    assert_eq!(snap.current_index, Some(0));
    assert_eq!(snap.progress.answered, 0);
    assert_eq!(snap.ledger, LedgerWrite::NotRequired);

    let best = orch.best_score(&topic()).await.unwrap().unwrap();
    assert_eq!((best.score, best.out_of), (2, 2));

    // A worse second run counts but does not lower the best.
    answer(&mut orch, "wrong").await;
    answer(&mut orch, "wrong").await;
    assert_eq!(spy.calls(), 2);
    let records = orch.module_progress(topic().module_id()).await.unwrap();
    assert_eq!(records[0].attempt_count(), 2);
    assert_eq!(records[0].best_score(), 2);
    assert_eq!(records[0].last_score(), 0);
}

#[tokio::test]
async fn failed_write_still_completes_and_can_be_retried() {
    let (mut orch, spy, _) = setup(2).await;
    spy.set_failing(true);
    orch.start_session(topic()).await.unwrap();
    answer(&mut orch, "right").await;
    answer(&mut orch, "wrong").await;

    let snap = orch.snapshot();
    assert!(snap.is_complete());
    assert_eq!(snap.score, Some(AttemptScore::new(1, 2).unwrap()));
    match &snap.ledger {
        LedgerWrite::Failed { score, reason } => {
            assert_eq!(*score, AttemptScore::new(1, 2).unwrap());
            assert!(reason.contains("disk unavailable"));
        }
        other => panic!("expected failed write, got {other:?}"),
    }
    assert_eq!(spy.calls(), 1);
    assert!(!orch.has_attempted(&topic()).await.unwrap());

    spy.set_failing(false);
    let snap = orch.retry_record().await.unwrap();
    assert!(snap.is_complete());
    assert!(matches!(snap.ledger, LedgerWrite::Recorded { .. }));
    assert_eq!(spy.calls(), 2);

    let record = orch.best_score(&topic()).await.unwrap().unwrap();
    assert_eq!((record.score, record.out_of), (1, 2));

    // Once recorded, retrying is a no-op.
    orch.retry_record().await.unwrap();
    assert_eq!(spy.calls(), 2);
}

#[tokio::test]
async fn retry_refetches_the_same_section() {
    let (mut orch, spy, _) = setup(1).await;
    orch.start_session(topic()).await.unwrap();
    answer(&mut orch, "right").await;

    let snap = orch.retry().await.unwrap();
    assert_eq!(snap.phase, PhaseKind::Unanswered);
    assert_eq!(snap.topic, Some(topic()));
    assert_eq!(spy.calls(), 1);
}

#[tokio::test]
async fn interrupted_write_stays_pending_and_can_be_recorded() {
    let (mut orch, spy, _) = setup(1).await;
    spy.set_slow(true);
    orch.start_session(topic()).await.unwrap();
    orch.select_choice(ChoiceId::new("right")).unwrap();
    orch.check_answer().unwrap();

    // The caller gives up before the write returns.
    let timed_out = tokio::time::timeout(Duration::from_millis(20), orch.advance()).await;
    assert!(timed_out.is_err());

    let snap = orch.snapshot();
    assert!(snap.is_complete());
    assert_eq!(
        snap.ledger,
        LedgerWrite::Pending {
            score: AttemptScore::new(1, 1).unwrap()
        }
    );
    assert!(!orch.has_attempted(&topic()).await.unwrap());

    spy.set_slow(false);
    let snap = orch.retry_record().await.unwrap();
    assert!(matches!(snap.ledger, LedgerWrite::Recorded { .. }));
    assert_eq!(spy.calls(), 2);
    assert!(orch.has_attempted(&topic()).await.unwrap());
}

#[tokio::test]
async fn running_session_ignores_bank_edits() {
    let (mut orch, _spy, bank) = setup(3).await;
    orch.start_session(topic()).await.unwrap();

    let replacement = Question::new(
        QuestionId::new("only"),
        "Replacement",
        vec![Choice::new("right", "Right"), Choice::new("wrong", "Wrong")],
        ChoiceId::new("right"),
        "",
    )
    .unwrap();
    bank.put_section(&QuestionSet::new(topic(), vec![replacement]).unwrap())
        .await
        .unwrap();

    answer(&mut orch, "right").await;
    let snap = orch.snapshot();
    assert_eq!(snap.progress.total, 3);
    assert_eq!(snap.question.unwrap().id, QuestionId::new("k2"));

    // A retry picks up the edited section.
    let snap = orch.retry().await.unwrap();
    assert_eq!(snap.progress.total, 1);
}
