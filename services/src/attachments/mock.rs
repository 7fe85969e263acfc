//! In-memory attachment store for testing.

use super::traits::AttachmentStore;
use super::types::{Attachment, AttachmentStoreError, NewAttachment};
use std::sync::{Arc, RwLock};

/// Keeps rows in a vector and enforces the same constraints as the table.
#[derive(Clone)]
pub struct MockAttachmentStore {
    rows: Arc<RwLock<Vec<Attachment>>>,
    is_connected: bool,
}

impl MockAttachmentStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::default(),
            is_connected: true,
        }
    }

    /// A store whose health check fails.
    pub fn disconnected() -> Self {
        Self {
            is_connected: false,
            ..Self::new()
        }
    }

    pub fn rows(&self) -> Vec<Attachment> {
        self.rows.read().expect("lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.rows.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MockAttachmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AttachmentStore for MockAttachmentStore {
    async fn is_connected(&self) -> bool {
        self.is_connected
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

        let mut rows = self.rows.write().expect("lock poisoned");
        let drive = input.drive.as_db_str();
        if rows.iter().any(|r| r.drive == drive && r.path == input.path) {
            return Err(AttachmentStoreError::Duplicate {
                drive: drive.to_owned(),
                path: input.path,
            });
        }

        let id = rows.len() as i64 + 1;
        let row = Attachment::from_insert(id, input, chrono::Utc::now());
        rows.push(row.clone());
        Ok(row)
    }
}
