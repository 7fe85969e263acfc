//! Uploads stored on the local disk under date-named directories.

use super::multipart::read_upload_form;
use super::naming::FileNaming;
use super::types::{UploadError, UploadForm};
use super::validate::{Rejection, ValidationRules, validate};
use super::attachment_response;
use crate::attachments::{AttachmentStore, AttachmentStoreError, Drive, NewAttachment};
use crate::config::Config;
use crate::qiniu::etag_of_file;
use axum::extract::Multipart;
use chrono::{DateTime, Local};
use serde_json::{Value, json};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalUploadOptions {
    /// Directory files are stored under.
    pub path: PathBuf,
    /// Public URL prefix of `path`, without a trailing slash.
    pub url: String,
    pub upload_only_image: bool,
    /// Name of the multipart file field.
    pub upload_param: String,
    pub unique: bool,
    pub translit: bool,
    pub rules: ValidationRules,
    /// Record every stored file in the attachment store.
    pub store_in_db: bool,
    /// Where request bodies are spooled; the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for LocalUploadOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("uploads"),
            url: "/uploads".to_owned(),
            upload_only_image: false,
            upload_param: "file".to_owned(),
            unique: true,
            translit: false,
            rules: ValidationRules::default(),
            store_in_db: true,
            temp_dir: None,
        }
    }
}

impl LocalUploadOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            path: config.upload_path().to_path_buf(),
            url: config.upload_url().to_owned(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalUploadAction {
    options: LocalUploadOptions,
    rules: ValidationRules,
    naming: FileNaming,
}

impl LocalUploadAction {
    pub fn new(options: LocalUploadOptions) -> Self {
        let mut rules = options.rules.clone();
        rules.images_only |= options.upload_only_image;
        let naming = FileNaming {
            unique: options.unique,
            translit: options.translit,
        };
        Self {
            options: LocalUploadOptions {
                url: options.url.trim_end_matches('/').to_owned(),
                ..options
            },
            rules,
            naming,
        }
    }

    pub fn options(&self) -> &LocalUploadOptions {
        &self.options
    }

    fn temp_dir(&self) -> PathBuf {
        self.options
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Creates the upload directory if needed and checks it can be written.
    pub async fn ensure_upload_dir(&self) -> Result<(), UploadError> {
        let path = &self.options.path;
        let dir_display = path.display().to_string();

        match tokio::fs::metadata(path).await {
            Ok(meta) if !meta.is_dir() => return Err(UploadError::NotADir(dir_display)),
            Ok(_) => {}
            Err(_) => {
                tokio::fs::create_dir_all(path).await.map_err(|e| {
                    tracing::warn!(error = %e, path = %dir_display, "failed to create upload dir");
                    UploadError::DirNotCreated(dir_display.clone())
                })?;
            }
        }

        if !is_writable(path).await {
            return Err(UploadError::NotWritable(dir_display));
        }
        Ok(())
    }

    /// Full request: directory check, multipart parsing, then [`Self::handle`].
    pub async fn upload<S: AttachmentStore>(
        &self,
        store: &S,
        multipart: Multipart,
        now: DateTime<Local>,
    ) -> Result<Value, UploadError> {
        self.ensure_upload_dir().await?;
        let form = read_upload_form(multipart, &self.options.upload_param, &self.temp_dir()).await?;
        self.handle(store, form, now).await
    }

    /// Validates, names and stores the file of `form`.
    pub async fn handle<S: AttachmentStore>(
        &self,
        store: &S,
        mut form: UploadForm,
        now: DateTime<Local>,
    ) -> Result<Value, UploadError> {
        let file = form.file.take().ok_or(Rejection::NoFile)?;
        validate(&file, &self.rules)?;

        let extension = file.extension();
        let name = self
            .naming
            .file_name(file.name(), file.base_name(), &extension, now.time());
        let date_dir = now.format("%Y%m%d").to_string();
        let dir = self.options.path.join(&date_dir);
        prepare_subdir(&dir).await?;

        let original_name = file.name().to_owned();
        let specific_type = file
            .detected_image_mime()
            .map_or_else(|| file.content_type().to_owned(), str::to_owned);
        let size = file.size();
        let dimensions = if self.options.store_in_db {
            file.dimensions()
        } else {
            None
        };

        let dest = dir.join(&name);
        let id = format!("{date_dir}/{name}");
        let filelink = format!("{}/{id}", self.options.url);

        if self.options.store_in_db {
            // A recorded file is never replaced; its row would go stale.
            file.persist_new(&dest).await.map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    UploadError::Store(AttachmentStoreError::Duplicate {
                        drive: Drive::Local.as_db_str().to_owned(),
                        path: filelink.clone(),
                    })
                } else {
                    UploadError::SaveFile(e)
                }
            })?;
        } else {
            file.persist_to(&dest).await.map_err(UploadError::SaveFile)?;
        }
        tracing::info!(path = %dest.display(), size, "stored upload");

        if !self.options.store_in_db {
            return Ok(json!({
                "filelink": filelink,
                "id": id,
                "filename": name,
            }));
        }

        let hash = match etag_of_file(&dest).await {
            Ok(hash) => Some(hash),
            Err(e) => {
                tracing::warn!(error = %e, path = %dest.display(), "failed to hash upload");
                None
            }
        };

        let inserted = store
            .attachments_insert(NewAttachment {
                member_id: form.member_id(),
                drive: Drive::Local,
                specific_type,
                name: original_name,
                size: i64::try_from(size).unwrap_or(i64::MAX),
                path: filelink,
                hash,
                extension,
                width: dimensions.and_then(|(w, _)| i32::try_from(w).ok()),
                height: dimensions.and_then(|(_, h)| i32::try_from(h).ok()),
                partition: form.partition(now.date_naive()),
            })
            .await;
        let row = match inserted {
            Ok(row) => row,
            Err(e) => {
                if let Err(remove) = tokio::fs::remove_file(&dest).await {
                    tracing::warn!(error = %remove, path = %dest.display(), "failed to remove unrecorded upload");
                }
                return Err(e.into());
            }
        };

        attachment_response(&row, &row.path)
    }
}

async fn is_writable(dir: &Path) -> bool {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if !meta.permissions().readonly() => {}
        _ => return false,
    }
    // readonly() only looks at mode bits; ACLs and read-only mounts need a real write.
    let probe = dir.join(format!(".writable-{}", uuid::Uuid::new_v4().simple()));
    let created = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)
        .await;
    match created {
        Ok(file) => {
            drop(file);
            if let Err(e) = tokio::fs::remove_file(&probe).await {
                tracing::warn!(error = %e, path = %probe.display(), "failed to remove write probe");
            }
            true
        }
        Err(_) => false,
    }
}

async fn prepare_subdir(dir: &Path) -> Result<(), UploadError> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(UploadError::SubdirConflict(dir.display().to_string())),
        Err(_) => tokio::fs::create_dir_all(dir).await.map_err(|e| {
            tracing::warn!(error = %e, dir = %dir.display(), "failed to create date dir");
            UploadError::SubdirConflict(dir.display().to_string())
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::MockAttachmentStore;
    use crate::upload::UploadedFile;
    use chrono::TimeZone;
    use tempfile::{TempDir, tempdir};

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 16, 9, 30, 5).unwrap()
    }

    fn action(root: &TempDir, tweak: impl FnOnce(&mut LocalUploadOptions)) -> LocalUploadAction {
        let mut options = LocalUploadOptions {
            path: root.path().join("uploads"),
            temp_dir: Some(root.path().to_path_buf()),
            ..LocalUploadOptions::default()
        };
        tweak(&mut options);
        LocalUploadAction::new(options)
    }

    fn form(root: &TempDir, name: &str, bytes: &[u8]) -> UploadForm {
        UploadForm {
            file: Some(UploadedFile::from_bytes(name, "text/plain", bytes, root.path()).unwrap()),
            ..UploadForm::default()
        }
    }

    #[tokio::test]
    async fn stores_file_and_row() {
        let root = tempdir().unwrap();
        let action = action(&root, |_| {});
        let store = MockAttachmentStore::new();
        action.ensure_upload_dir().await.unwrap();

        let mut form = form(&root, "notes.txt", b"hello world");
        form.fields.insert("x:member_id".into(), "7".into());
        let body = action.handle(&store, form, now()).await.unwrap();

        let filename = body["filename"].as_str().unwrap();
        assert_eq!(filename, "notes.txt");
        let filelink = body["filelink"].as_str().unwrap();
        assert!(filelink.starts_with("/uploads/20261016/093005_"));
        assert!(filelink.ends_with(".txt"));
        assert_eq!(body["drive"], "local");
        assert_eq!(body["member_id"], 7);
        assert_eq!(body["hash"], "FiqubDXJT8-0FdvpX0CLnOke6Ebt");

        let stored_name = filelink.rsplit('/').next().unwrap();
        let stored = root.path().join("uploads/20261016").join(stored_name);
        assert_eq!(std::fs::read(stored).unwrap(), b"hello world");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn without_db_answers_link_id_and_name() {
        let root = tempdir().unwrap();
        let action = action(&root, |o| {
            o.store_in_db = false;
            o.unique = false;
        });
        let store = MockAttachmentStore::new();

        let body = action
            .handle(&store, form(&root, "Report.txt", b"x"), now())
            .await
            .unwrap();

        assert_eq!(
            body,
            json!({
                "filelink": "/uploads/20261016/Report.txt",
                "id": "20261016/Report.txt",
                "filename": "Report.txt",
            })
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let root = tempdir().unwrap();
        let err = action(&root, |_| {})
            .handle(&MockAttachmentStore::new(), UploadForm::default(), now())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please upload a file.");
    }

    #[tokio::test]
    async fn images_only_refuses_text() {
        let root = tempdir().unwrap();
        let action = action(&root, |o| o.upload_only_image = true);
        let err = action
            .handle(&MockAttachmentStore::new(), form(&root, "a.png", b"text"), now())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "The file \"a.png\" is not an image.");
    }

    #[tokio::test]
    async fn date_dir_blocked_by_a_file() {
        let root = tempdir().unwrap();
        let action = action(&root, |_| {});
        action.ensure_upload_dir().await.unwrap();
        let blocker = root.path().join("uploads/20261016");
        std::fs::write(&blocker, b"").unwrap();

        let err = action
            .handle(&MockAttachmentStore::new(), form(&root, "a.txt", b"a"), now())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("{} File exists, create dir failed", blocker.display())
        );
    }

    #[tokio::test]
    async fn writable_check_leaves_nothing_behind() {
        let root = tempdir().unwrap();
        assert!(is_writable(root.path()).await);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
        assert!(!is_writable(&root.path().join("missing")).await);
    }

    #[tokio::test]
    async fn upload_path_that_is_a_file() {
        let root = tempdir().unwrap();
        let action = action(&root, |_| {});
        std::fs::write(root.path().join("uploads"), b"").unwrap();

        let err = action.ensure_upload_dir().await.unwrap_err();
        assert!(matches!(err, UploadError::NotADir(_)));
        assert!(err.to_string().ends_with("uploads is not a dir"));
    }

    #[tokio::test]
    async fn recorded_file_is_never_replaced() {
        let root = tempdir().unwrap();
        let action = action(&root, |o| o.unique = false);
        let store = MockAttachmentStore::new();
        action
            .handle(&store, form(&root, "same.txt", b"one"), now())
            .await
            .unwrap();

        let err = action
            .handle(&store, form(&root, "same.txt", b"two"), now())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Store(AttachmentStoreError::Duplicate { .. })));
        assert_eq!(store.len(), 1);

        let stored = root.path().join("uploads/20261016/same.txt");
        assert_eq!(std::fs::read(stored).unwrap(), b"one");
        assert_eq!(store.rows()[0].size, 3);
    }

    #[tokio::test]
    async fn failed_insert_removes_the_stored_file() {
        let root = tempdir().unwrap();
        let action = action(&root, |o| o.unique = false);
        let store = MockAttachmentStore::new();
        action
            .handle(&store, form(&root, "same.txt", b"one"), now())
            .await
            .unwrap();
        let stored = root.path().join("uploads/20261016/same.txt");
        std::fs::remove_file(&stored).unwrap();

        // The row is still there, so this insert fails after the move.
        let err = action
            .handle(&store, form(&root, "same.txt", b"two"), now())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Store(AttachmentStoreError::Duplicate { .. })));
        assert!(!stored.exists());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn without_db_same_name_overwrites() {
        let root = tempdir().unwrap();
        let action = action(&root, |o| {
            o.unique = false;
            o.store_in_db = false;
        });
        let store = MockAttachmentStore::new();
        for bytes in [&b"one"[..], b"two"] {
            action
                .handle(&store, form(&root, "same.txt", bytes), now())
                .await
                .unwrap();
        }

        let stored = root.path().join("uploads/20261016/same.txt");
        assert_eq!(std::fs::read(stored).unwrap(), b"two");
    }
}
