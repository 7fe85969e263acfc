//! Form uploads to the Qiniu upload host.

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum QiniuError {
    #[error("failed to read upload file: {0}")]
    Io(#[from] std::io::Error),

    #[error("request to upload host failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upload rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("upload host answered with a non-JSON body")]
    InvalidResponse,
}

/// One file to put into a bucket.
#[derive(Debug, Clone)]
pub struct PutFileRequest {
    pub token: String,
    pub key: String,
    pub path: PathBuf,
    pub file_name: String,
    pub mime_type: String,
    /// Custom `x:` variables, echoed back through the return body.
    pub params: Vec<(String, String)>,
}

/// Uploads a local file with a signed token and returns the rendered return body.
pub trait QiniuUploader: Clone + Send + Sync + 'static {
    fn put_file(
        &self,
        request: PutFileRequest,
    ) -> impl Future<Output = Result<Value, QiniuError>> + Send;
}

/// Uploader speaking the multipart form API of an upload host.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    host: String,
}

impl HttpUploader {
    pub fn new(host: impl Into<String>) -> Result<Self, QiniuError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self::with_client(client, host))
    }

    pub fn with_client(client: Client, host: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl QiniuUploader for HttpUploader {
    async fn put_file(&self, request: PutFileRequest) -> Result<Value, QiniuError> {
        let PutFileRequest {
            token,
            key,
            path,
            file_name,
            mime_type,
            params,
        } = request;

        let bytes = tokio::fs::read(&path).await?;
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(&mime_type)?;

        let mut form = Form::new().text("token", token).text("key", key.clone());
        for (name, value) in params {
            form = form.text(name, value);
        }
        let form = form.part("file", part);

        let response = self.client.post(&self.host).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned))
                .unwrap_or(body);
            return Err(QiniuError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(key = %key, "qiniu accepted upload");
        serde_json::from_str(&body).map_err(|_| QiniuError::InvalidResponse)
    }
}
