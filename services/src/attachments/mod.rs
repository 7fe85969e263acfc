//! Attachment metadata persistence.
//!
//! Every successful upload that is configured to be recorded ends with a
//! single [`AttachmentStore::attachments_insert`] call.

mod mock;
mod storage;
mod traits;
mod types;

pub use mock::MockAttachmentStore;
pub use storage::PgAttachmentStore;
pub use traits::AttachmentStore;
pub use types::{Attachment, AttachmentStoreError, DatePartition, Drive, NewAttachment};
