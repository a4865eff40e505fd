use serde_json::{Map, Value};

use crate::models::auth::Principal;
use crate::models::task::{
    CreateTaskRequest, NewTask, Task, TaskCompletion, TaskDetail, TaskFilter, TaskListItem,
    TaskPatch,
};
use crate::repository::Repositories;
use crate::services::access;
use crate::services::storage::ImageStorage;
use crate::utils::errors::ServiceError;

fn missing_reference(field: &str, id: i32) -> ServiceError {
    ServiceError::ValidationError(format!(
        "{}: Invalid pk \"{}\" - object does not exist.",
        field, id
    ))
}

async fn ensure_references(
    repos: &Repositories,
    category: Option<i32>,
    status: Option<i32>,
) -> Result<(), ServiceError> {
    if let Some(id) = category {
        if repos.categories.find(id).await?.is_none() {
            return Err(missing_reference("category", id));
        }
    }
    if let Some(id) = status {
        if repos.statuses.find(id).await?.is_none() {
            return Err(missing_reference("status", id));
        }
    }
    Ok(())
}

pub async fn create_task(
    repos: &Repositories,
    principal: &Principal,
    req: CreateTaskRequest,
) -> Result<Task, ServiceError> {
    access::ensure_active(principal)?;

    let req = req.normalized()?;
    ensure_references(repos, Some(req.category), Some(req.status)).await?;

    let task = repos
        .tasks
        .create(NewTask {
            title: req.title,
            category_id: req.category,
            status_id: req.status,
            user_id: principal.id,
            text: req.text,
            available: req.available,
        })
        .await?;

    log::info!("Task {} created by user {}", task.id, principal.id);
    Ok(task)
}

pub async fn get_task(repos: &Repositories, id: i32) -> Result<Task, ServiceError> {
    repos
        .tasks
        .find(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Task not found".to_string()))
}

pub async fn load_task_detail(
    repos: &Repositories,
    task: Task,
) -> Result<TaskDetail, ServiceError> {
    let category = repos
        .categories
        .find(task.category_id)
        .await?
        .map(|c| c.name)
        .unwrap_or_default();
    let status = repos
        .statuses
        .find(task.status_id)
        .await?
        .map(|s| s.name)
        .unwrap_or_default();
    let image_ids = repos.task_images.ids_for_task(task.id).await?;
    let completion = repos.completions.find_for_task(task.id).await?;

    Ok(TaskDetail {
        task,
        category,
        status,
        image_ids,
        completion,
    })
}

pub async fn list_tasks(
    repos: &Repositories,
    filter: &TaskFilter,
) -> Result<Vec<TaskListItem>, ServiceError> {
    repos.tasks.list(filter).await
}

/// Missing tasks and tasks owned by someone else both come back as `NotFound`.
pub async fn delete_task(
    repos: &Repositories,
    storage: &dyn ImageStorage,
    principal: &Principal,
    id: i32,
) -> Result<(), ServiceError> {
    let image_paths = repos
        .tasks
        .delete_owned(id, principal.id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Task not found".to_string()))?;

    for path in &image_paths {
        if let Err(e) = storage.remove(path).await {
            log::warn!("Failed to delete image file {}: {}", path, e);
        }
    }

    log::info!(
        "Task {} deleted by user {} ({} images removed)",
        id,
        principal.id,
        image_paths.len()
    );
    Ok(())
}

/// Unlike delete, a foreign task is reported as `PermissionDenied` here.
pub async fn update_task(
    repos: &Repositories,
    principal: &Principal,
    id: i32,
    fields: Map<String, Value>,
) -> Result<Task, ServiceError> {
    let task = get_task(repos, id).await?;
    access::ensure_owner(principal, task.user_id, "task")?;

    let patch = TaskPatch::from_fields(fields)?;
    ensure_references(repos, patch.category, patch.status).await?;

    let task = repos
        .tasks
        .update(id, &patch)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Task not found".to_string()))?;

    log::info!("Task {} updated by user {}", id, principal.id);
    Ok(task)
}

pub async fn complete_task(
    repos: &Repositories,
    principal: &Principal,
    id: i32,
) -> Result<TaskCompletion, ServiceError> {
    let task = get_task(repos, id).await?;
    access::ensure_can_view_task(Some(principal), &task)?;

    if repos.completions.find_for_task(id).await?.is_some() {
        return Err(ServiceError::ValidationError(
            "Task has already been completed".to_string(),
        ));
    }

    let completion = repos.completions.create(id, principal.id).await?;
    log::info!("Task {} completed by user {}", id, principal.id);
    Ok(completion)
}
