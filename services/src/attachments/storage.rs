//! PostgreSQL attachment store.

use super::traits::AttachmentStore;
use super::types::{Attachment, AttachmentStoreError, NewAttachment};
use sqlx::PgPool;

/// Unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgAttachmentStore {
    pool: PgPool,
}

impl PgAttachmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl AttachmentStore for PgAttachmentStore {
    async fn is_connected(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn attachments_insert(
        &self,
        input: NewAttachment,
    ) -> Result<Attachment, AttachmentStoreError> {
        if input.size <= 0 {
            return Err(AttachmentStoreError::Invalid(format!(
                "size must be positive, got {}",
                input.size
            )));
        }

        let drive = input.drive.as_db_str();
        sqlx::query_as::<_, Attachment>(
            r#"
            INSERT INTO attachments
                (member_id, drive, specific_type, name, size, path, hash,
                 extension, width, height, year, month, day)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id, member_id, drive, specific_type, name, size, path, hash,
                      extension, width, height, year, month, day, created_at
            "#,
        )
        .bind(input.member_id)
        .bind(drive)
        .bind(&input.specific_type)
        .bind(&input.name)
        .bind(input.size)
        .bind(&input.path)
        .bind(&input.hash)
        .bind(&input.extension)
        .bind(input.width)
        .bind(input.height)
        .bind(input.partition.year)
        .bind(input.partition.month)
        .bind(input.partition.day)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                AttachmentStoreError::Duplicate {
                    drive: drive.to_owned(),
                    path: input.path.clone(),
                }
            }
            other => AttachmentStoreError::Db(other.to_string()),
        })
    }
}
