//! In-process stand-in for the upload host.

use super::auth::{Credentials, decode_upload_token};
use super::etag::etag_of_file;
use super::return_body::render_return_body;
use super::uploader::{PutFileRequest, QiniuError, QiniuUploader};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// What the mock received for one successful upload.
#[derive(Debug, Clone)]
pub struct MockUpload {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub params: Vec<(String, String)>,
}

/// Answers like the upload host would: checks the token, then renders the
/// policy's return body from the file it was given.
#[derive(Debug, Clone, Default)]
pub struct MockQiniuUploader {
    credentials: Option<Credentials>,
    failure: Option<(u16, String)>,
    uploads: Arc<RwLock<Vec<MockUpload>>>,
}

impl MockQiniuUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects tokens not signed by `credentials`.
    pub fn verifying(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            ..Self::default()
        }
    }

    /// Refuses every upload with `status`.
    pub fn failing(status: u16, message: impl Into<String>) -> Self {
        Self {
            failure: Some((status, message.into())),
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> Vec<MockUpload> {
        self.uploads.read().expect("lock poisoned").clone()
    }
}

impl QiniuUploader for MockQiniuUploader {
    async fn put_file(&self, request: PutFileRequest) -> Result<Value, QiniuError> {
        if let Some((status, message)) = &self.failure {
            return Err(QiniuError::Rejected {
                status: *status,
                message: message.clone(),
            });
        }

        let rejected = |message: &str| QiniuError::Rejected {
            status: 401,
            message: message.to_owned(),
        };
        let (_, policy) = decode_upload_token(&request.token).ok_or_else(|| rejected("bad token"))?;
        if let Some(credentials) = &self.credentials
            && !credentials.verify_upload_token(&request.token)
        {
            return Err(rejected("bad token"));
        }

        let size = tokio::fs::metadata(&request.path).await?.len();
        let etag = etag_of_file(&request.path).await?;

        let mut vars: HashMap<String, String> = request.params.iter().cloned().collect();
        vars.insert("key".to_owned(), request.key.clone());
        vars.insert("etag".to_owned(), etag.clone());
        vars.insert("fsize".to_owned(), size.to_string());
        vars.insert("mimeType".to_owned(), request.mime_type.clone());
        vars.insert("bucket".to_owned(), policy.bucket().to_owned());
        let dimensions = image::ImageReader::open(&request.path)
            .and_then(|reader| reader.with_guessed_format())
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());
        if let Some((width, height)) = dimensions {
            vars.insert("imageInfo.width".to_owned(), width.to_string());
            vars.insert("imageInfo.height".to_owned(), height.to_string());
        }

        let body = match &policy.return_body {
            Some(template) => render_return_body(template, &vars),
            None => serde_json::json!({ "key": request.key, "hash": etag }).to_string(),
        };

        self.uploads
            .write()
            .expect("lock poisoned")
            .push(MockUpload {
                bucket: policy.bucket().to_owned(),
                key: request.key,
                size,
                params: request.params,
            });

        serde_json::from_str(&body).map_err(|_| QiniuError::InvalidResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qiniu::auth::{DEFAULT_TOKEN_TTL, PutPolicy};
    use chrono::Utc;
    use std::io::Write;

    fn request(token: String, file: &tempfile::NamedTempFile) -> PutFileRequest {
        PutFileRequest {
            token,
            key: "uploads/20261016/a.txt".to_owned(),
            path: file.path().to_path_buf(),
            file_name: "a.txt".to_owned(),
            mime_type: "text/plain".to_owned(),
            params: vec![("x:name".to_owned(), "a.txt".to_owned())],
        }
    }

    fn hello_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file
    }

    #[tokio::test]
    async fn renders_return_body_from_the_file() {
        let credentials = Credentials::new("ak", "sk");
        let policy = PutPolicy::new("bucket", Utc::now(), DEFAULT_TOKEN_TTL)
            .with_return_body(r#"{"path":"$(key)","hash":"$(etag)","size":$(fsize),"name":"$(x:name)"}"#);
        let token = credentials.upload_token(&policy).unwrap();
        let file = hello_file();

        let uploader = MockQiniuUploader::verifying(credentials);
        let body = uploader.put_file(request(token, &file)).await.unwrap();

        assert_eq!(body["path"], "uploads/20261016/a.txt");
        assert_eq!(body["hash"], "FiqubDXJT8-0FdvpX0CLnOke6Ebt");
        assert_eq!(body["size"], 11);
        assert_eq!(body["name"], "a.txt");

        let uploads = uploader.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].bucket, "bucket");
    }

    #[tokio::test]
    async fn foreign_signature_is_refused() {
        let policy = PutPolicy::new("bucket", Utc::now(), DEFAULT_TOKEN_TTL);
        let token = Credentials::new("ak", "other").upload_token(&policy).unwrap();
        let file = hello_file();

        let uploader = MockQiniuUploader::verifying(Credentials::new("ak", "sk"));
        let err = uploader.put_file(request(token, &file)).await.unwrap_err();
        assert!(matches!(err, QiniuError::Rejected { status: 401, .. }));
        assert!(uploader.uploads().is_empty());
    }

    #[tokio::test]
    async fn failing_uploader_rejects_everything() {
        let file = hello_file();
        let uploader = MockQiniuUploader::failing(503, "service unavailable");
        let err = uploader
            .put_file(request("x:y:z".to_owned(), &file))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("service unavailable"));
    }
}
