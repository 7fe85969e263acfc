//! Reading the editor's multipart request.

use super::types::{HEAD_LEN, UploadError, UploadForm, UploadedFile};
use axum::extract::Multipart;
use axum::extract::multipart::Field;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Collects the text fields and spools the file part named `upload_param`
/// (or `upload_param[]`) into `temp_dir`. Only the first such file is kept.
pub async fn read_upload_form(
    mut multipart: Multipart,
    upload_param: &str,
    temp_dir: &Path,
) -> Result<UploadForm, UploadError> {
    let mut form = UploadForm::default();
    let array_param = format!("{upload_param}[]");

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::MalformedForm(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        let is_upload = name == upload_param || name == array_param;
        if is_upload && field.file_name().is_some() {
            if form.file.is_none() {
                form.file = Some(spool(&mut field, temp_dir).await?);
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| UploadError::MalformedForm(e.body_text()))?;
        form.fields.insert(name, value);
    }

    Ok(form)
}

async fn spool(field: &mut Field<'_>, temp_dir: &Path) -> Result<UploadedFile, UploadError> {
    let name = field.file_name().unwrap_or_default().to_owned();
    let content_type = match field.content_type() {
        Some(declared) => declared.to_owned(),
        None => mime_guess::from_path(&name)
            .first_or_octet_stream()
            .to_string(),
    };

    let temp = tempfile::Builder::new()
        .prefix("redactor-")
        .tempfile_in(temp_dir)
        .map_err(UploadError::Spool)?;
    let (std_file, path) = temp.into_parts();
    let mut file = tokio::fs::File::from_std(std_file);

    let mut size = 0u64;
    let mut head = Vec::with_capacity(HEAD_LEN);
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| UploadError::MalformedForm(e.body_text()))?
    {
        if head.len() < HEAD_LEN {
            let take = (HEAD_LEN - head.len()).min(chunk.len());
            head.extend_from_slice(&chunk[..take]);
        }
        size += chunk.len() as u64;
        file.write_all(&chunk).await.map_err(UploadError::Spool)?;
    }
    file.flush().await.map_err(UploadError::Spool)?;

    tracing::debug!(file = %name, size, "spooled upload");
    Ok(UploadedFile::new(name, content_type, size, head, path))
}
