use learn_core::model::LessonId;
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn map_lesson_row(row: &sqlx::sqlite::SqliteRow) -> Result<LessonId, StorageError> {
    let raw: String = row.try_get("lesson_id").map_err(ser)?;
    LessonId::new(raw).map_err(ser)
}
