use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};
use std::path::Path;
use utoipa::ToSchema;
use validator::Validate;

use crate::utils::errors::ServiceError;

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "webp"];

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct TaskImage {
    pub id: i32,
    pub title: String,
    pub image_path: String,
    pub created_at: DateTime<Utc>,
    pub task_id: i32,
}

#[derive(Debug, Clone)]
pub struct NewTaskImage {
    pub title: String,
    pub image_path: String,
    pub task_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskImageResponse {
    pub id: i32,
    pub title: String,
    /// Public URL of the stored image
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvatarResponse {
    pub id: i32,
    pub image: String,
    pub date_uploaded: chrono::NaiveDate,
}

/// An image file received in a multipart form, not yet stored.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: Option<mime::Mime>,
    pub data: Vec<u8>,
}

impl UploadedImage {
    /// Checks size, extension and declared content type. Returns the lowercased extension.
    pub fn validate(&self, max_bytes: usize) -> Result<String, ServiceError> {
        if self.data.is_empty() {
            return Err(ServiceError::ValidationError(
                "The submitted image file is empty".to_string(),
            ));
        }

        if self.data.len() > max_bytes {
            return Err(ServiceError::ValidationError(format!(
                "Image size exceeds {} byte limit",
                max_bytes
            )));
        }

        let extension = Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();

        if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ServiceError::ValidationError(format!(
                "File type '{}' is not an allowed image type",
                extension
            )));
        }

        if let Some(content_type) = &self.content_type {
            if content_type.type_() != mime::IMAGE {
                return Err(ServiceError::ValidationError(format!(
                    "Content type '{}' is not an image",
                    content_type
                )));
            }
        }

        Ok(extension)
    }
}

/// Fields of a task image upload, as received. Every rule is checked by the service.
#[derive(Debug, Clone, Default)]
pub struct TaskImageInput {
    pub title: Option<String>,
    pub task: Option<String>,
    pub image: Option<UploadedImage>,
}

impl TaskImageInput {
    /// Trimmed text fields, missing ones as empty strings.
    pub fn text_fields(&self) -> TaskImageFields {
        let trimmed = |v: &Option<String>| v.as_deref().unwrap_or_default().trim().to_string();
        TaskImageFields {
            title: trimmed(&self.title),
            task: trimmed(&self.task),
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct TaskImageFields {
    #[validate(length(min = 1, max = 100, message = "Title must be 1-100 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub task: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadTaskImageRequest {
    pub title: String,
    pub task: i32,
    #[schema(format = "binary")]
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadAvatarRequest {
    #[schema(format = "binary")]
    pub image: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, content_type: Option<mime::Mime>, len: usize) -> UploadedImage {
        UploadedImage {
            file_name: name.to_string(),
            content_type,
            data: vec![7; len],
        }
    }

    #[test]
    fn accepts_images() {
        let ext = upload("Photo.JPG", Some(mime::IMAGE_JPEG), 16).validate(1024).unwrap();
        assert_eq!(ext, "jpg");
    }

    #[test]
    fn rejects_non_images() {
        assert!(upload("notes.txt", None, 16).validate(1024).is_err());
        assert!(upload("x.png", Some(mime::TEXT_PLAIN), 16).validate(1024).is_err());
    }

    #[test]
    fn text_fields_are_trimmed_and_checked() {
        let input = |title: Option<&str>, task: Option<&str>| TaskImageInput {
            title: title.map(str::to_string),
            task: task.map(str::to_string),
            image: None,
        };

        let fields = input(Some("  shot "), Some(" 7 ")).text_fields();
        assert_eq!(fields.title, "shot");
        assert_eq!(fields.task, "7");
        assert!(fields.validate().is_ok());

        let errors = input(Some("   "), None).text_fields().validate().unwrap_err();
        let errors = errors.field_errors();
        assert!(errors.contains_key("title"));
        assert!(errors.contains_key("task"));

        let long = "é".repeat(101);
        assert!(input(Some(&long), Some("7")).text_fields().validate().is_err());
        let edge = "é".repeat(100);
        assert!(input(Some(&edge), Some("7")).text_fields().validate().is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(upload("x.png", None, 0).validate(1024).is_err());
        assert!(upload("x.png", None, 2048).validate(1024).is_err());
    }
}
