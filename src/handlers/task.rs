use actix_web::{web, HttpRequest, HttpResponse, Result};
use serde_json::{Map, Value};

use crate::config::AppConfig;
use crate::handlers::image::{image_config, TASK_IMAGE_ROUTE};
use crate::handlers::json_body;
use crate::models::auth::ApiResponse;
use crate::models::task::{
    CreateTaskRequest, Task, TaskCompletion, TaskCreatedResponse, TaskDetailResponse,
    TaskListItem, TaskListQuery,
};
use crate::repository::Repositories;
use crate::services::auth::{require_principal, resolve_principal};
use crate::services::storage::ImageStorage;
use crate::services::{access, task as task_service};
use crate::utils::errors::ServiceError;

// Detail view with absolute links to the task's images
async fn detail_response(
    req: &HttpRequest,
    repos: &Repositories,
    task: Task,
) -> Result<TaskDetailResponse, ServiceError> {
    let detail = task_service::load_task_detail(repos, task).await?;

    let mut images = Vec::with_capacity(detail.image_ids.len());
    for id in &detail.image_ids {
        let url = req
            .url_for(TASK_IMAGE_ROUTE, [id.to_string()])
            .map_err(|e| {
                log::error!("Failed to build image URL: {}", e);
                ServiceError::InternalError("Failed to build image URL".to_string())
            })?;
        images.push(url.to_string());
    }

    Ok(TaskDetailResponse::new(detail, images))
}

/// Create a new task
#[utoipa::path(
    post,
    path = "/api/tasks/create/",
    tag = "tasks",
    security(
        ("bearer_auth" = [])
    ),
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created successfully", body = ApiResponse<TaskCreatedResponse>),
        (status = 400, description = "Validation error", body = crate::utils::errors::ServiceError),
        (status = 401, description = "Unauthorized", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn create_task(
    req: HttpRequest,
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    task_req: Result<web::Json<CreateTaskRequest>, actix_web::Error>,
) -> Result<HttpResponse, ServiceError> {
    log::info!("POST /api/tasks/create/");

    let principal = require_principal(&req, &config, &repos).await?;
    let task_req = json_body(task_req)?;
    log::info!("Creating new task: {}", task_req.title);
    let task = task_service::create_task(&repos, &principal, task_req).await?;
    let detail = task_service::load_task_detail(&repos, task).await?;

    Ok(HttpResponse::Created().json(ApiResponse::success(
        "Task created successfully",
        TaskCreatedResponse::from(detail),
    )))
}

/// List tasks, optionally filtered
#[utoipa::path(
    get,
    path = "/api/tasks/list/",
    tag = "tasks",
    params(TaskListQuery),
    responses(
        (status = 200, description = "Tasks retrieved successfully", body = ApiResponse<Vec<TaskListItem>>),
        (status = 400, description = "Invalid filter", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn list_tasks(
    repos: web::Data<Repositories>,
    query: web::Query<TaskListQuery>,
) -> Result<HttpResponse, ServiceError> {
    log::info!("GET /api/tasks/list/");

    let filter = query.into_inner().into_filter()?;
    let tasks = task_service::list_tasks(&repos, &filter).await?;

    log::info!("Retrieved {} tasks", tasks.len());
    Ok(HttpResponse::Ok().json(ApiResponse::success("Tasks retrieved successfully", tasks)))
}

/// Get a task by ID
#[utoipa::path(
    get,
    path = "/api/tasks/{id}/",
    tag = "tasks",
    params(
        ("id" = i32, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task retrieved successfully", body = ApiResponse<TaskDetailResponse>),
        (status = 403, description = "Task is not available", body = crate::utils::errors::ServiceError),
        (status = 404, description = "Task not found", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn get_task(
    req: HttpRequest,
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ServiceError> {
    let task_id = path.into_inner();
    log::info!("GET /api/tasks/{}/", task_id);

    let principal = resolve_principal(&req, &config, &repos).await?;
    let task = task_service::get_task(&repos, task_id).await?;
    access::ensure_can_view_task(principal.as_ref(), &task)?;

    let response = detail_response(&req, &repos, task).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Task retrieved successfully", response)))
}

/// Partially update a task. Only the owner may do this.
#[utoipa::path(
    put,
    path = "/api/tasks/update/{id}/",
    tag = "tasks",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = i32, Path, description = "Task ID")
    ),
    request_body(
        content = Object,
        description = "Any subset of title, category, status, text, available"
    ),
    responses(
        (status = 200, description = "Task updated successfully", body = ApiResponse<TaskDetailResponse>),
        (status = 400, description = "Validation error", body = crate::utils::errors::ServiceError),
        (status = 401, description = "Unauthorized", body = crate::utils::errors::ServiceError),
        (status = 403, description = "Not the task owner", body = crate::utils::errors::ServiceError),
        (status = 404, description = "Task not found", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn update_task(
    req: HttpRequest,
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
    fields: Result<web::Json<Map<String, Value>>, actix_web::Error>,
) -> Result<HttpResponse, ServiceError> {
    let task_id = path.into_inner();
    log::info!("{} /api/tasks/update/{}/", req.method(), task_id);

    let principal = require_principal(&req, &config, &repos).await?;
    let fields = json_body(fields)?;
    let task = task_service::update_task(&repos, &principal, task_id, fields).await?;

    let response = detail_response(&req, &repos, task).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Task updated successfully", response)))
}

/// Delete a task with its images and completion
#[utoipa::path(
    delete,
    path = "/api/tasks/delete/{id}/",
    tag = "tasks",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = i32, Path, description = "Task ID")
    ),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 401, description = "Unauthorized", body = crate::utils::errors::ServiceError),
        (status = 404, description = "Task not found", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn delete_task(
    req: HttpRequest,
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    storage: web::Data<dyn ImageStorage>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ServiceError> {
    let task_id = path.into_inner();
    log::info!("DELETE /api/tasks/delete/{}/", task_id);

    let principal = require_principal(&req, &config, &repos).await?;
    task_service::delete_task(&repos, storage.get_ref(), &principal, task_id).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// Mark a task as completed by the caller
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/complete/",
    tag = "tasks",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = i32, Path, description = "Task ID")
    ),
    responses(
        (status = 201, description = "Task completed", body = ApiResponse<TaskCompletion>),
        (status = 400, description = "Already completed", body = crate::utils::errors::ServiceError),
        (status = 401, description = "Unauthorized", body = crate::utils::errors::ServiceError),
        (status = 403, description = "Task is not available", body = crate::utils::errors::ServiceError),
        (status = 404, description = "Task not found", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn complete_task(
    req: HttpRequest,
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ServiceError> {
    let task_id = path.into_inner();
    log::info!("POST /api/tasks/{}/complete/", task_id);

    let principal = require_principal(&req, &config, &repos).await?;
    let completion = task_service::complete_task(&repos, &principal, task_id).await?;

    Ok(HttpResponse::Created().json(ApiResponse::success("Task completed", completion)))
}

pub fn task_config(cfg: &mut web::ServiceConfig) {
    // Literal segments go before "/{id}/"
    cfg.service(
        web::scope("/api/tasks")
            .route("/create/", web::post().to(create_task))
            .route("/list/", web::get().to(list_tasks))
            .configure(image_config)
            .route("/update/{id}/", web::put().to(update_task))
            .route("/update/{id}/", web::patch().to(update_task))
            .route("/delete/{id}/", web::delete().to(delete_task))
            .route("/{id}/complete/", web::post().to(complete_task))
            .route("/{id}/", web::get().to(get_task)),
    );
}
