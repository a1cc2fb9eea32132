use learn_core::model::{QuestionSet, TopicKey};

use super::SqliteRepository;
use super::mapping::{conn, encode_choices, map_question_row, ser};
use crate::repository::{QuestionBank, StorageError};

#[async_trait::async_trait]
impl QuestionBank for SqliteRepository {
    async fn questions_for_section(&self, topic: &TopicKey) -> Result<QuestionSet, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT question_id, prompt, choices, correct_choice_id, explanation
                FROM questions
                WHERE module_id = ?1 AND section_name = ?2
                ORDER BY position ASC
            ",
        )
        .bind(topic.module_id().as_str())
        .bind(topic.section().as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in &rows {
            questions.push(map_question_row(row)?);
        }
        QuestionSet::new(topic.clone(), questions).map_err(ser)
    }

    async fn has_questions_for_section(&self, topic: &TopicKey) -> Result<bool, StorageError> {
        let row = sqlx::query(
            r"
                SELECT 1 FROM questions
                WHERE module_id = ?1 AND section_name = ?2
                LIMIT 1
            ",
        )
        .bind(topic.module_id().as_str())
        .bind(topic.section().as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        Ok(row.is_some())
    }

    async fn put_section(&self, questions: &QuestionSet) -> Result<(), StorageError> {
        let topic = questions.topic();
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM questions WHERE module_id = ?1 AND section_name = ?2")
            .bind(topic.module_id().as_str())
            .bind(topic.section().as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, question) in questions.questions().iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            sqlx::query(
                r"
                    INSERT INTO questions (
                        module_id, section_name, position, question_id,
                        prompt, choices, correct_choice_id, explanation
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
            )
            .bind(topic.module_id().as_str())
            .bind(topic.section().as_str())
            .bind(position)
            .bind(question.id().as_str())
            .bind(question.prompt())
            .bind(encode_choices(question.choices())?)
            .bind(question.correct_choice_id().as_str())
            .bind(question.explanation())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
