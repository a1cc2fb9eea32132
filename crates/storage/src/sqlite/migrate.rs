use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs versioned migrations for the practice schema.
///
/// Version 1 creates the question bank and the mastery ledger.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    module_id TEXT NOT NULL,
                    section_name TEXT NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    question_id TEXT NOT NULL,
                    prompt TEXT NOT NULL,
                    choices TEXT NOT NULL,
                    correct_choice_id TEXT NOT NULL,
                    explanation TEXT NOT NULL,
                    PRIMARY KEY (module_id, section_name, question_id),
                    UNIQUE (module_id, section_name, position)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS mastery_records (
                    user_id INTEGER NOT NULL,
                    module_id TEXT NOT NULL,
                    section_name TEXT NOT NULL,
                    attempt_count INTEGER NOT NULL CHECK (attempt_count >= 1),
                    best_score INTEGER NOT NULL CHECK (best_score >= 0),
                    best_out_of INTEGER NOT NULL CHECK (best_out_of >= 1),
                    last_score INTEGER NOT NULL CHECK (last_score >= 0),
                    last_out_of INTEGER NOT NULL CHECK (last_out_of >= 1),
                    first_attempted_at TEXT NOT NULL,
                    last_attempted_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, module_id, section_name)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_questions_section_position
                    ON questions (module_id, section_name, position);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
