//! Editor upload actions.

pub mod local;
pub mod multipart;
pub mod naming;
pub mod qiniu;
pub mod types;
pub mod validate;

pub use local::{LocalUploadAction, LocalUploadOptions};
pub use naming::{FileNaming, slugify};
pub use qiniu::{QiniuUploadAction, QiniuUploadOptions};
pub use types::{UploadError, UploadForm, UploadedFile};
pub use validate::{Rejection, ValidationRules, validate};

use crate::attachments::Attachment;
use crate::config::{Config, ConfigError};
use crate::qiniu::QiniuUploader;
use serde_json::Value;

/// The actions mounted under `/redactor/upload`.
pub struct UploadActions<Q> {
    pub local: LocalUploadAction,
    /// Mounted only when Qiniu is configured.
    pub qiniu: Option<QiniuUploadAction<Q>>,
}

impl<Q: QiniuUploader> UploadActions<Q> {
    /// Local uploads always; Qiniu uploads when any credential is configured,
    /// failing if the credentials are incomplete.
    pub fn from_config(config: &Config, uploader: Q) -> Result<Self, ConfigError> {
        let local = LocalUploadAction::new(LocalUploadOptions::from_config(config));
        let qiniu = if config.qiniu_enabled() {
            Some(QiniuUploadAction::new(
                QiniuUploadOptions::default(),
                config,
                uploader,
            )?)
        } else {
            None
        };
        Ok(Self { local, qiniu })
    }

    pub fn local_only(local: LocalUploadAction) -> Self {
        Self { local, qiniu: None }
    }

    pub fn with_qiniu(mut self, action: QiniuUploadAction<Q>) -> Self {
        self.qiniu = Some(action);
        self
    }
}

/// The stored row plus the `filelink` and `filename` keys the editor reads.
fn attachment_response(row: &Attachment, filelink: &str) -> Result<Value, UploadError> {
    let mut body = serde_json::to_value(row).map_err(|e| UploadError::Internal(e.to_string()))?;
    if let Value::Object(map) = &mut body {
        map.insert("filelink".to_owned(), Value::String(filelink.to_owned()));
        map.insert("filename".to_owned(), Value::String(row.name.clone()));
    }
    Ok(body)
}
