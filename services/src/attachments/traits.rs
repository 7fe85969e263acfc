//! Attachment store trait.

use super::types::{Attachment, AttachmentStoreError, NewAttachment};
use std::future::Future;

/// Persistence for upload metadata.
///
/// Rows are written once at the end of a successful upload and never
/// updated afterwards.
pub trait AttachmentStore: Clone + Send + Sync + 'static {
    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    /// Inserts a row; `(drive, path)` must be unique and `size` positive.
    fn attachments_insert(
        &self,
        input: NewAttachment,
    ) -> impl Future<Output = Result<Attachment, AttachmentStoreError>> + Send;
}
