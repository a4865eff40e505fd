use crate::models::auth::Principal;
use crate::models::image::{NewTaskImage, TaskImage, TaskImageInput};
use crate::repository::Repositories;
use crate::services::access;
use crate::services::storage::ImageStorage;
use crate::utils::errors::ServiceError;
use validator::Validate;

pub const TASK_IMAGE_KIND: &str = "taskimage";

/// Input rules first (including that the task exists), ownership second, storage last.
pub async fn create_task_image(
    repos: &Repositories,
    storage: &dyn ImageStorage,
    principal: &Principal,
    input: TaskImageInput,
    max_bytes: usize,
) -> Result<TaskImage, ServiceError> {
    let fields = input.text_fields();
    fields.validate()?;

    let task_id: i32 = fields.task.parse().map_err(|_| {
        ServiceError::ValidationError("task: Incorrect type. Expected pk value.".to_string())
    })?;
    let task = repos.tasks.find(task_id).await?.ok_or_else(|| {
        ServiceError::ValidationError(format!(
            "task: Invalid pk \"{}\" - object does not exist.",
            task_id
        ))
    })?;

    let image = input.image.ok_or_else(|| {
        ServiceError::ValidationError("image: No file was submitted.".to_string())
    })?;
    let extension = image.validate(max_bytes)?;

    access::ensure_owner(principal, task.user_id, "task")?;

    let image_path = storage.store(TASK_IMAGE_KIND, &extension, &image.data).await?;
    let created = repos
        .task_images
        .create(NewTaskImage {
            title: fields.title,
            image_path: image_path.clone(),
            task_id,
        })
        .await;

    match created {
        Ok(row) => {
            log::info!("Task image {} added to task {}", row.id, task_id);
            Ok(row)
        }
        Err(e) => {
            // Don't leave an orphaned file behind
            if let Err(cleanup) = storage.remove(&image_path).await {
                log::warn!("Failed to clean up image {}: {}", image_path, cleanup);
            }
            Err(e)
        }
    }
}

pub async fn get_task_image(repos: &Repositories, id: i32) -> Result<TaskImage, ServiceError> {
    repos
        .task_images
        .find(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Task image not found".to_string()))
}

pub async fn delete_task_image(
    repos: &Repositories,
    storage: &dyn ImageStorage,
    principal: &Principal,
    id: i32,
) -> Result<(), ServiceError> {
    let image = get_task_image(repos, id).await?;
    let owner_id = repos
        .tasks
        .find(image.task_id)
        .await?
        .map(|task| task.user_id)
        .ok_or_else(|| ServiceError::NotFound("Task image not found".to_string()))?;

    access::ensure_owner(principal, owner_id, "task image")?;

    if !repos.task_images.delete(id).await? {
        return Err(ServiceError::NotFound("Task image not found".to_string()));
    }

    if let Err(e) = storage.remove(&image.image_path).await {
        log::warn!("Failed to delete image file {}: {}", image.image_path, e);
    }

    log::info!("Task image {} deleted by user {}", id, principal.id);
    Ok(())
}
