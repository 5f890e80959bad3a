use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learn_core::model::ProgressState;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_lesson_row, ser};
use crate::repository::{ProgressKey, ProgressRepository, StorageError};

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<ProgressState>, StorageError> {
        let meta = sqlx::query(
            r"
                SELECT updated_at
                FROM progress_meta
                WHERE progress_key = ?1
            ",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(meta) = meta else {
            return Ok(None);
        };
        let updated_at: Option<DateTime<Utc>> = meta.try_get("updated_at").map_err(ser)?;

        let rows = sqlx::query(
            r"
                SELECT lesson_id
                FROM progress_lessons
                WHERE progress_key = ?1
                ORDER BY lesson_id
            ",
        )
        .bind(key.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let completed = rows
            .iter()
            .map(map_lesson_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(ProgressState::from_persisted(completed, updated_at)))
    }

    async fn save_progress(
        &self,
        key: &ProgressKey,
        state: &ProgressState,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO progress_meta (progress_key, updated_at)
                VALUES (?1, ?2)
                ON CONFLICT(progress_key) DO UPDATE SET
                    updated_at = excluded.updated_at
            ",
        )
        .bind(key.as_str())
        .bind(state.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // The completed set only grows, so inserting what is missing is enough.
        for lesson_id in state.completed() {
            sqlx::query(
                r"
                    INSERT INTO progress_lessons (progress_key, lesson_id)
                    VALUES (?1, ?2)
                    ON CONFLICT(progress_key, lesson_id) DO NOTHING
                ",
            )
            .bind(key.as_str())
            .bind(lesson_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        tracing::debug!(
            key = %key,
            completed = state.completed_count(),
            "saved progress"
        );
        Ok(())
    }
}
