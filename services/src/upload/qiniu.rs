//! Uploads forwarded to a Qiniu bucket.

use super::attachment_response;
use super::multipart::read_upload_form;
use super::naming::FileNaming;
use super::types::{UploadError, UploadForm};
use super::validate::{Rejection, ValidationRules, validate};
use crate::attachments::AttachmentStore;
use crate::config::{Config, ConfigError};
use crate::qiniu::{
    Credentials, DEFAULT_TOKEN_TTL, PutFileRequest, PutPolicy, QiniuUploader,
    attachment_from_return_body, default_return_body,
};
use axum::extract::Multipart;
use chrono::{DateTime, Local, Utc};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct QiniuUploadOptions {
    /// Key prefix; `uploads/YYYYMMDD` of the request day when unset.
    pub url: Option<String>,
    /// Public base of the bucket, prepended to keys in links.
    pub dns_base_url: Option<String>,
    pub upload_only_image: bool,
    pub upload_param: String,
    pub unique: bool,
    pub translit: bool,
    pub rules: ValidationRules,
    pub bucket: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Template the storage fills in and answers with.
    pub return_body: Map<String, Value>,
    pub token_ttl: Duration,
    pub temp_dir: Option<PathBuf>,
}

impl Default for QiniuUploadOptions {
    fn default() -> Self {
        Self {
            url: None,
            dns_base_url: None,
            upload_only_image: false,
            upload_param: "file".to_owned(),
            unique: true,
            translit: false,
            rules: ValidationRules::default(),
            bucket: None,
            access_key: None,
            secret_key: None,
            return_body: default_return_body(),
            token_ttl: DEFAULT_TOKEN_TTL,
            temp_dir: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QiniuUploadAction<Q> {
    options: QiniuUploadOptions,
    rules: ValidationRules,
    naming: FileNaming,
    bucket: String,
    credentials: Credentials,
    dns_base_url: String,
    return_body: String,
    uploader: Q,
}

impl<Q: QiniuUploader> QiniuUploadAction<Q> {
    /// Fills unset credentials from `config`. Fails if any is still missing.
    pub fn new(options: QiniuUploadOptions, config: &Config, uploader: Q) -> Result<Self, ConfigError> {
        let pick = |explicit: &Option<String>, fallback: Option<&str>, attribute: &'static str| {
            explicit
                .as_deref()
                .or(fallback)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
                .ok_or(ConfigError::MissingAttribute(attribute))
        };
        let bucket = pick(&options.bucket, config.qiniu_bucket(), "qiniu_bucket")?;
        let access_key = pick(&options.access_key, config.qiniu_access_key(), "qiniu_access_key")?;
        let secret_key = pick(&options.secret_key, config.qiniu_secret_key(), "qiniu_secret_key")?;

        let return_body = serde_json::to_string(&options.return_body)
            .map_err(|e| ConfigError::Invalid(format!("return body: {e}")))?;
        let dns_base_url = options
            .dns_base_url
            .clone()
            .unwrap_or_else(|| config.qiniu_base_url().to_owned());

        let mut rules = options.rules.clone();
        rules.images_only |= options.upload_only_image;
        let naming = FileNaming {
            unique: options.unique,
            translit: options.translit,
        };

        tracing::debug!(bucket = %bucket, "qiniu upload action ready");
        Ok(Self {
            options,
            rules,
            naming,
            bucket,
            credentials: Credentials::new(access_key, secret_key),
            dns_base_url,
            return_body,
            uploader,
        })
    }

    pub fn options(&self) -> &QiniuUploadOptions {
        &self.options
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Full request: multipart parsing, then [`Self::handle`].
    pub async fn upload<S: AttachmentStore>(
        &self,
        store: &S,
        multipart: Multipart,
        now: DateTime<Local>,
    ) -> Result<Value, UploadError> {
        let temp_dir = self
            .options
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let form = read_upload_form(multipart, &self.options.upload_param, &temp_dir).await?;
        self.handle(store, form, now).await
    }

    /// Validates and names the file of `form`, sends it to the bucket and
    /// records what the storage answered.
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
        let prefix = self
            .options
            .url
            .clone()
            .unwrap_or_else(|| format!("uploads/{}", now.format("%Y%m%d")));
        let key = format!("{}/{name}", prefix.trim_end_matches('/'));

        let today = now.date_naive();
        let partition = form.partition(today);
        let params = vec![
            ("x:year".to_owned(), partition.year.to_string()),
            ("x:month".to_owned(), partition.month.to_string()),
            ("x:day".to_owned(), partition.day.to_string()),
            ("x:member_id".to_owned(), form.member_id().to_string()),
            ("x:name".to_owned(), file.name().to_owned()),
            ("x:extension".to_owned(), extension),
        ];

        let policy = PutPolicy::new(&self.bucket, now.with_timezone(&Utc), self.options.token_ttl)
            .with_return_body(self.return_body.clone());
        let token = self
            .credentials
            .upload_token(&policy)
            .map_err(|e| UploadError::Internal(e.to_string()))?;

        let mime_type = file
            .detected_image_mime()
            .map_or_else(|| file.content_type().to_owned(), str::to_owned);
        let result = self
            .uploader
            .put_file(PutFileRequest {
                token,
                key: key.clone(),
                path: file.path().to_path_buf(),
                file_name: name,
                mime_type,
                params,
            })
            .await;

        if let Err(e) = file.discard() {
            tracing::warn!(error = %e, "failed to remove spooled upload");
        }

        let body = result.map_err(|e| {
            tracing::error!(error = %e, key = %key, "upload to qiniu failed");
            UploadError::Vendor
        })?;
        let input = attachment_from_return_body(&body, today).map_err(|e| {
            tracing::error!(error = %e, key = %key, "unusable qiniu return body");
            UploadError::Vendor
        })?;

        let row = store.attachments_insert(input).await?;
        tracing::info!(key = %key, bucket = %self.bucket, "stored upload in qiniu");
        attachment_response(&row, &join_url(&self.dns_base_url, &row.path))
    }
}

fn join_url(base: &str, path: &str) -> String {
    if base.is_empty() {
        return path.to_owned();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
