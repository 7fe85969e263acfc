use super::validate::Rejection;
use crate::attachments::{AttachmentStoreError, DatePartition};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde_json::json;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

/// Bytes kept from the start of every upload for format sniffing.
pub const HEAD_LEN: usize = 512;

/// A file part spooled to a temp file.
///
/// The temp file is removed when this is dropped unless it was persisted.
#[derive(Debug)]
pub struct UploadedFile {
    name: String,
    content_type: String,
    size: u64,
    head: Vec<u8>,
    path: TempPath,
}

impl UploadedFile {
    pub(crate) fn new(
        name: String,
        content_type: String,
        size: u64,
        head: Vec<u8>,
        path: TempPath,
    ) -> Self {
        Self {
            name: client_file_name(&name),
            content_type,
            size,
            head,
            path,
        }
    }

    /// Writes `bytes` to a fresh temp file in `dir`.
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: &[u8],
        dir: &Path,
    ) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("redactor-")
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self::new(
            name.into(),
            content_type.into(),
            bytes.len() as u64,
            bytes[..bytes.len().min(HEAD_LEN)].to_vec(),
            file.into_temp_path(),
        ))
    }

    /// Client-side file name, reduced to its final path component.
    ///
    /// Empty when the client sent no usable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Content type declared by the client.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercased extension of the client file name, empty if there is none.
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default()
    }

    /// Client file name without directory or extension.
    pub fn base_name(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("")
    }

    /// MIME type sniffed from the content, for image formats only.
    pub fn detected_image_mime(&self) -> Option<&'static str> {
        image::guess_format(&self.head)
            .ok()
            .map(|format| format.to_mime_type())
    }

    /// Pixel size if the content decodes as an image header.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        image::ImageReader::open(self.path())
            .and_then(|reader| reader.with_guessed_format())
            .ok()?
            .into_dimensions()
            .ok()
    }

    /// Moves the spooled file to `dest`, copying when a rename is impossible.
    pub async fn persist_to(self, dest: &Path) -> io::Result<()> {
        if let Err(err) = self.path.persist(dest) {
            // Rename fails across filesystems; the temp path is dropped after the copy.
            tracing::debug!(error = %err.error, "rename failed, copying upload instead");
            tokio::fs::copy(&err.path, dest).await?;
        }

        publish_mode(dest).await
    }

    /// Like [`Self::persist_to`], but fails with `AlreadyExists` rather than
    /// replace a file already at `dest`.
    pub async fn persist_new(self, dest: &Path) -> io::Result<()> {
        if let Err(err) = self.path.persist_noclobber(dest) {
            if err.error.kind() == io::ErrorKind::AlreadyExists {
                return Err(err.error);
            }
            tracing::debug!(error = %err.error, "rename failed, copying upload instead");
            let mut out = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(dest)
                .await?;
            let copied = async {
                let mut src = tokio::fs::File::open(&err.path).await?;
                tokio::io::copy(&mut src, &mut out).await?;
                out.flush().await
            }
            .await;
            if let Err(e) = copied {
                let _ = tokio::fs::remove_file(dest).await;
                return Err(e);
            }
        }

        publish_mode(dest).await
    }

    /// Removes the temp file now instead of on drop.
    pub fn discard(self) -> io::Result<()> {
        self.path.close()
    }
}

async fn publish_mode(dest: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(dest, std::fs::Permissions::from_mode(0o644)).await?;
    }
    #[cfg(not(unix))]
    let _ = dest;
    Ok(())
}

/// Last component of a client-supplied file name.
///
/// Browsers may send a full local path, with either separator, and a hostile
/// client may send `..` segments. Nothing but the final component may reach
/// the filesystem; `.` and `..` reduce to an empty name.
pub(crate) fn client_file_name(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match last {
        "." | ".." => String::new(),
        name => name.to_owned(),
    }
}

/// Multipart body of an upload request.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// `x:member_id`, 0 when absent or not a number.
    pub fn member_id(&self) -> i64 {
        self.field("x:member_id")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// `x:year`/`x:month`/`x:day`, each defaulting to `today`.
    pub fn partition(&self, today: NaiveDate) -> DatePartition {
        DatePartition::from_fields(
            self.field("x:year"),
            self.field("x:month"),
            self.field("x:day"),
            today,
        )
    }
}

/// A failed upload. Answered as `{"error": message}` with status 200, the
/// shape the editor expects.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{0} can not be created")]
    DirNotCreated(String),

    #[error("{0} is not a dir")]
    NotADir(String),

    #[error("{0} is not writable")]
    NotWritable(String),

    #[error("{0} File exists, create dir failed")]
    SubdirConflict(String),

    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("Upload failed: malformed request ({0})")]
    MalformedForm(String),

    #[error("Upload failed: the file could not be buffered")]
    Spool(#[source] io::Error),

    #[error("Upload failed:[ERROR_SAVE_FILE]")]
    SaveFile(#[source] io::Error),

    #[error("Upload to qiniu error")]
    Vendor,

    #[error("Upload failed: {0}")]
    Store(#[from] AttachmentStoreError),

    #[error("Upload failed: {0}")]
    Internal(String),
}

impl UploadError {
    fn log(&self) {
        match self {
            UploadError::Rejected(rejection) => {
                tracing::debug!(reason = %rejection, "upload rejected");
            }
            UploadError::MalformedForm(_) => {
                tracing::warn!(error = %self, "malformed upload request");
            }
            UploadError::Spool(source) | UploadError::SaveFile(source) => {
                tracing::error!(error = %self, source = %source, "failed to write upload");
            }
            _ => tracing::error!(error = %self, "upload failed"),
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        self.log();
        (StatusCode::OK, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
