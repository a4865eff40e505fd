use std::collections::HashMap;

use actix_multipart::Multipart;
use futures_util::TryStreamExt;

use crate::models::image::UploadedImage;
use crate::utils::errors::ServiceError;

/// Text parts keyed by field name, plus the file parts.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, UploadedImage>,
}

impl FormData {
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedImage> {
        self.files.remove(name)
    }
}

/// Room left for text parts on top of the file limit when summing the whole form.
pub const TEXT_FIELDS_ALLOWANCE: usize = 16 * 1024;

/// Reads the whole form into memory. A single part over `max_bytes`, or a form
/// over `max_bytes + TEXT_FIELDS_ALLOWANCE` in total, aborts the read.
pub async fn read_form(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<FormData, ServiceError> {
    let mut form = FormData::default();
    let total_limit = max_bytes.saturating_add(TEXT_FIELDS_ALLOWANCE);
    let mut total = 0usize;

    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        log::error!("Multipart error: {}", e);
        ServiceError::ValidationError("Invalid multipart data".to_string())
    })? {
        let name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(|f| f.to_string());
        let content_type = field.content_type().cloned();

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| {
            log::error!("Multipart chunk error: {}", e);
            ServiceError::ValidationError("Error reading form data".to_string())
        })? {
            data.extend_from_slice(&chunk);
            total += chunk.len();
            if data.len() > max_bytes {
                return Err(ServiceError::ValidationError(format!(
                    "{}: Upload exceeds {} byte limit",
                    name, max_bytes
                )));
            }
            if total > total_limit {
                log::warn!("Multipart form passed {} bytes, aborting", total_limit);
                return Err(ServiceError::ValidationError(format!(
                    "Form data exceeds {} byte limit",
                    total_limit
                )));
            }
        }

        match file_name {
            Some(file_name) => {
                log::info!(
                    "Received file '{}' ({} bytes) in field '{}'",
                    file_name,
                    data.len(),
                    name
                );
                form.files.insert(
                    name,
                    UploadedImage {
                        file_name,
                        content_type,
                        data,
                    },
                );
            }
            None => {
                let value = String::from_utf8(data).map_err(|_| {
                    ServiceError::ValidationError(format!("{}: Field is not valid UTF-8", name))
                })?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}
