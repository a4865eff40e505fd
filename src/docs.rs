use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::database::DatabaseStats;
use crate::handlers::{auth, catalog, health, image, task};
use crate::models::auth::{LoginRequest, LoginResponseData, RegisterRequest, UserResponse};
use crate::models::image::{TaskImageResponse, UploadAvatarRequest, UploadTaskImageRequest};
use crate::models::task::{
    Category, CreateTaskRequest, NamedRequest, Status, TaskCompletion, TaskCreatedResponse,
    TaskDetailResponse, TaskListItem,
};
use crate::utils::errors::ServiceError;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Task Tracker API",
        description = "Tasks with categories, statuses, images and completions"
    ),
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::get_me,
        auth::update_avatar,
        task::create_task,
        task::list_tasks,
        task::get_task,
        task::update_task,
        task::delete_task,
        task::complete_task,
        image::upload_image,
        image::get_image,
        image::delete_image,
        catalog::list_categories,
        catalog::get_category,
        catalog::create_category,
        catalog::update_category,
        catalog::delete_category,
        catalog::list_statuses,
        catalog::get_status,
        catalog::create_status,
        catalog::update_status,
        catalog::delete_status,
    ),
    components(schemas(
        DatabaseStats,
        RegisterRequest,
        LoginRequest,
        LoginResponseData,
        UserResponse,
        CreateTaskRequest,
        TaskCreatedResponse,
        TaskDetailResponse,
        TaskListItem,
        TaskCompletion,
        TaskImageResponse,
        UploadTaskImageRequest,
        UploadAvatarRequest,
        NamedRequest,
        Category,
        Status,
        ServiceError,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Service health"),
        (name = "auth", description = "Registration, login and the current user"),
        (name = "tasks", description = "Task CRUD and completion"),
        (name = "task images", description = "Images attached to tasks"),
        (name = "categories", description = "Task categories"),
        (name = "statuses", description = "Task statuses")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    Http::builder()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
