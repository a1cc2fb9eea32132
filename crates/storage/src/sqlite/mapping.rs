use learn_core::model::{
    Choice, ChoiceId, MasteryRecord, Question, QuestionId, TopicKey, UserId,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn user_id_to_i64(user_id: UserId) -> Result<i64, StorageError> {
    i64::try_from(user_id.value())
        .map_err(|_| StorageError::Serialization("user_id overflow".into()))
}

fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    u64::try_from(v)
        .map(UserId::new)
        .map_err(|_| StorageError::Serialization("user_id sign overflow".into()))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u32_column(row: &sqlx::sqlite::SqliteRow, field: &'static str) -> Result<u32, StorageError> {
    u32_from_i64(field, row.try_get::<i64, _>(field).map_err(ser)?)
}

pub(crate) fn map_mastery_row(row: &sqlx::sqlite::SqliteRow) -> Result<MasteryRecord, StorageError> {
    let user_id = user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?;
    let topic = TopicKey::parse(
        row.try_get::<&str, _>("module_id").map_err(ser)?,
        row.try_get::<&str, _>("section_name").map_err(ser)?,
    )
    .map_err(ser)?;

    MasteryRecord::from_persisted(
        user_id,
        topic,
        u32_column(row, "attempt_count")?,
        u32_column(row, "best_score")?,
        u32_column(row, "best_out_of")?,
        u32_column(row, "last_score")?,
        u32_column(row, "last_out_of")?,
        row.try_get("first_attempted_at").map_err(ser)?,
        row.try_get("last_attempted_at").map_err(ser)?,
    )
    .map_err(ser)
}

/// Choices are stored as a JSON array of `{id, text}` objects, in display order.
pub(crate) fn encode_choices(choices: &[Choice]) -> Result<String, StorageError> {
    serde_json::to_string(choices).map_err(ser)
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let choices: Vec<Choice> =
        serde_json::from_str(row.try_get::<&str, _>("choices").map_err(ser)?).map_err(ser)?;

    Question::new(
        QuestionId::new(row.try_get::<String, _>("question_id").map_err(ser)?),
        row.try_get::<String, _>("prompt").map_err(ser)?,
        choices,
        ChoiceId::new(row.try_get::<String, _>("correct_choice_id").map_err(ser)?),
        row.try_get::<String, _>("explanation").map_err(ser)?,
    )
    .map_err(ser)
}
