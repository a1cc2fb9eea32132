use chrono::{DateTime, Utc};
use learn_core::model::{AttemptScore, MasteryRecord, ModuleId, TopicKey, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_mastery_row, user_id_to_i64};
use crate::repository::{MasteryRepository, StorageError};

const RECORD_COLUMNS: &str = r"
    user_id, module_id, section_name, attempt_count,
    best_score, best_out_of, last_score, last_out_of,
    first_attempted_at, last_attempted_at
";

#[async_trait::async_trait]
impl MasteryRepository for SqliteRepository {
    async fn record_attempt(
        &self,
        user_id: UserId,
        topic: &TopicKey,
        score: AttemptScore,
        at: DateTime<Utc>,
    ) -> Result<MasteryRecord, StorageError> {
        // One statement, so concurrent writers to the same key serialize inside SQLite.
        // Every right-hand side in the UPDATE reads the pre-update row.
        let sql = format!(
            r"
                INSERT INTO mastery_records (
                    user_id, module_id, section_name, attempt_count,
                    best_score, best_out_of, last_score, last_out_of,
                    first_attempted_at, last_attempted_at
                )
                VALUES (?1, ?2, ?3, 1, ?4, ?5, ?4, ?5, ?6, ?6)
                ON CONFLICT(user_id, module_id, section_name) DO UPDATE SET
                    attempt_count = mastery_records.attempt_count + 1,
                    best_out_of = CASE
                        WHEN excluded.best_score > mastery_records.best_score
                            THEN excluded.best_out_of
                        ELSE mastery_records.best_out_of
                    END,
                    best_score = MAX(mastery_records.best_score, excluded.best_score),
                    last_score = excluded.last_score,
                    last_out_of = excluded.last_out_of,
                    last_attempted_at = MAX(mastery_records.last_attempted_at, excluded.last_attempted_at)
                RETURNING {RECORD_COLUMNS}
            "
        );

        let row = sqlx::query(&sql)
            .bind(user_id_to_i64(user_id)?)
            .bind(topic.module_id().as_str())
            .bind(topic.section().as_str())
            .bind(i64::from(score.correct()))
            .bind(i64::from(score.out_of()))
            .bind(at)
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;

        map_mastery_row(&row)
    }

    async fn get_record(
        &self,
        user_id: UserId,
        topic: &TopicKey,
    ) -> Result<Option<MasteryRecord>, StorageError> {
        let sql = format!(
            r"
                SELECT {RECORD_COLUMNS}
                FROM mastery_records
                WHERE user_id = ?1 AND module_id = ?2 AND section_name = ?3
            "
        );
        let row = sqlx::query(&sql)
            .bind(user_id_to_i64(user_id)?)
            .bind(topic.module_id().as_str())
            .bind(topic.section().as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_mastery_row).transpose()
    }

    async fn list_module_records(
        &self,
        user_id: UserId,
        module_id: &ModuleId,
    ) -> Result<Vec<MasteryRecord>, StorageError> {
        let sql = format!(
            r"
                SELECT {RECORD_COLUMNS}
                FROM mastery_records
                WHERE user_id = ?1 AND module_id = ?2
                ORDER BY section_name ASC
            "
        );
        let rows = sqlx::query(&sql)
            .bind(user_id_to_i64(user_id)?)
            .bind(module_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(map_mastery_row(row)?);
        }
        Ok(out)
    }
}
