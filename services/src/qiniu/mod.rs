//! Qiniu Kodo object storage: token signing, etags, and form uploads.

pub mod auth;
pub mod etag;
pub mod mock;
pub mod return_body;
pub mod uploader;

pub use auth::{Credentials, DEFAULT_TOKEN_TTL, PutPolicy, decode_upload_token};
pub use etag::{etag_of_bytes, etag_of_file};
pub use mock::{MockQiniuUploader, MockUpload};
pub use return_body::{
    ReturnBodyError, attachment_from_return_body, default_return_body, render_return_body,
};
pub use uploader::{HttpUploader, PutFileRequest, QiniuError, QiniuUploader};
