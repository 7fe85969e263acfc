//! Shared test utilities for integration tests.
//!
//! Builds routers over the in-memory attachment store and mock uploader,
//! and hand-assembles multipart bodies the way the editor sends them.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use redactor_services::{
    attachments::MockAttachmentStore,
    config::Config,
    qiniu::MockQiniuUploader,
    routes,
    upload::{LocalUploadAction, LocalUploadOptions, UploadActions},
};
use serde_json::Value;
use std::io::Cursor;
use std::path::Path;

pub const BOUNDARY: &str = "----redactor-test-boundary";

/// A file part of a multipart body.
pub struct FilePart<'a> {
    pub field: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

impl<'a> FilePart<'a> {
    pub fn new(file_name: &'a str, content_type: &'a str, bytes: &'a [u8]) -> Self {
        Self {
            field: "file",
            file_name,
            content_type,
            bytes,
        }
    }
}

/// Encodes text fields and an optional file part as `multipart/form-data`.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<&FilePart<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(file) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.field, file.file_name, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// A `POST` carrying a multipart body.
pub fn upload_request(uri: &str, fields: &[(&str, &str)], file: Option<&FilePart<'_>>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(fields, file)))
        .unwrap()
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn response_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Local-only router storing files under `root/uploads`.
#[allow(dead_code)]
pub fn local_app(
    root: &Path,
    store: MockAttachmentStore,
    tweak: impl FnOnce(&mut LocalUploadOptions),
) -> Router {
    let config = Config::new_for_test_with_upload_path(root.join("uploads"));
    local_app_with_config(root, store, config, tweak)
}

#[allow(dead_code)]
pub fn local_app_with_config(
    root: &Path,
    store: MockAttachmentStore,
    config: Config,
    tweak: impl FnOnce(&mut LocalUploadOptions),
) -> Router {
    let mut options = LocalUploadOptions {
        temp_dir: Some(root.join("tmp")),
        ..LocalUploadOptions::from_config(&config)
    };
    std::fs::create_dir_all(root.join("tmp")).unwrap();
    tweak(&mut options);

    let actions = UploadActions::<MockQiniuUploader>::local_only(LocalUploadAction::new(options));
    routes(store, actions, config)
}

/// Encodes a blank PNG of the given size.
#[allow(dead_code)]
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::RgbImage::new(width, height)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Every regular file below `dir`.
#[allow(dead_code)]
pub fn files_under(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(files_under(&path));
        } else {
            found.push(path);
        }
    }
    found
}
