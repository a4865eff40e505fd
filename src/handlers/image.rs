use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse, Result};

use crate::config::AppConfig;
use crate::handlers::multipart::read_form;
use crate::models::auth::ApiResponse;
use crate::models::image::{TaskImage, TaskImageInput, TaskImageResponse, UploadTaskImageRequest};
use crate::repository::Repositories;
use crate::services::auth::require_principal;
use crate::services::storage::ImageStorage;
use crate::services::task_image as image_service;
use crate::utils::errors::ServiceError;

/// Route name used to build image links in task details.
pub const TASK_IMAGE_ROUTE: &str = "task_image_retrieve";

fn image_response(config: &AppConfig, image: TaskImage) -> TaskImageResponse {
    TaskImageResponse {
        id: image.id,
        title: image.title,
        image: config.media_link(&image.image_path),
    }
}

/// Upload an image for a task you own
#[utoipa::path(
    post,
    path = "/api/tasks/image/create/",
    tag = "task images",
    security(
        ("bearer_auth" = [])
    ),
    request_body(
        content = inline(UploadTaskImageRequest),
        description = "Title, task id and image file as multipart/form-data",
        content_type = "multipart/form-data"
    ),
    responses(
        (status = 201, description = "Image uploaded successfully", body = ApiResponse<TaskImageResponse>),
        (status = 400, description = "Validation error", body = crate::utils::errors::ServiceError),
        (status = 401, description = "Unauthorized", body = crate::utils::errors::ServiceError),
        (status = 403, description = "Not the task owner", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn upload_image(
    req: HttpRequest,
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    storage: web::Data<dyn ImageStorage>,
    payload: Multipart,
) -> Result<HttpResponse, ServiceError> {
    log::info!("POST /api/tasks/image/create/");

    let principal = require_principal(&req, &config, &repos).await?;
    let mut form = read_form(payload, config.max_upload_bytes).await?;
    let input = TaskImageInput {
        title: form.text("title"),
        task: form.text("task"),
        image: form.take_file("image"),
    };

    let image = image_service::create_task_image(
        &repos,
        storage.get_ref(),
        &principal,
        input,
        config.max_upload_bytes,
    )
    .await?;

    Ok(HttpResponse::Created().json(ApiResponse::success(
        "Image uploaded successfully",
        image_response(&config, image),
    )))
}

/// Get a task image
#[utoipa::path(
    get,
    path = "/api/tasks/image/{id}/",
    tag = "task images",
    params(
        ("id" = i32, Path, description = "Task image ID")
    ),
    responses(
        (status = 200, description = "Image retrieved successfully", body = ApiResponse<TaskImageResponse>),
        (status = 404, description = "Image not found", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn get_image(
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ServiceError> {
    let image_id = path.into_inner();
    log::info!("GET /api/tasks/image/{}/", image_id);

    let image = image_service::get_task_image(&repos, image_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(
        "Image retrieved successfully",
        image_response(&config, image),
    )))
}

/// Delete a task image and its file
#[utoipa::path(
    delete,
    path = "/api/tasks/image/{id}/",
    tag = "task images",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = i32, Path, description = "Task image ID")
    ),
    responses(
        (status = 204, description = "Image deleted"),
        (status = 401, description = "Unauthorized", body = crate::utils::errors::ServiceError),
        (status = 403, description = "Not the task owner", body = crate::utils::errors::ServiceError),
        (status = 404, description = "Image not found", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn delete_image(
    req: HttpRequest,
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    storage: web::Data<dyn ImageStorage>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ServiceError> {
    let image_id = path.into_inner();
    log::info!("DELETE /api/tasks/image/{}/", image_id);

    let principal = require_principal(&req, &config, &repos).await?;
    image_service::delete_task_image(&repos, storage.get_ref(), &principal, image_id).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// Mounted inside the `/api/tasks` scope.
pub fn image_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/image/create/", web::post().to(upload_image))
        .service(
            web::resource("/image/{id}/")
                .name(TASK_IMAGE_ROUTE)
                .route(web::get().to(get_image))
                .route(web::delete().to(delete_image)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::CreateTaskRequest;
    use crate::services::task::create_task;
    use crate::test_support::{
        bearer, principal, seed_category, seed_status, seed_user, test_config, TestState,
    };
    use actix_web::{http::StatusCode, test, App};
    use serde_json::Value;

    const BOUNDARY: &str = "XBOUNDARY";

    fn form(title: &str, task: &str, with_file: bool) -> String {
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\n{title}\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"task\"\r\n\r\n{task}\r\n",
            b = BOUNDARY,
            title = title,
            task = task
        );
        if with_file {
            body.push_str(&format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"shot.png\"\r\n\
                 Content-Type: image/png\r\n\r\nPNGDATA\r\n",
                b = BOUNDARY
            ));
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        body
    }

    fn upload(body: String) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/tasks/image/create/")
            .insert_header((
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn oversized_form_is_rejected_before_storing() {
        let state = TestState::with_config(AppConfig {
            max_upload_bytes: 10_000,
            ..test_config()
        });
        let owner = seed_user(&state.repos, "owner", false).await;
        let category = seed_category(&state.repos, "Backend").await.id;
        let status = seed_status(&state.repos, "Open").await.id;
        let task = create_task(
            &state.repos,
            &principal(&owner),
            CreateTaskRequest {
                title: "Big form".into(),
                category,
                status,
                text: "text".into(),
                available: true,
            },
        )
        .await
        .unwrap();
        let app = test::init_service(App::new().configure(|cfg| state.register(cfg))).await;

        // Every part is under the per-file limit, the sum is not
        let mut body = form("shot", &task.id.to_string(), false);
        body.truncate(body.len() - format!("--{}--\r\n", BOUNDARY).len());
        let chunk = "x".repeat(9_000);
        for name in ["image", "extra1", "extra2", "extra3"] {
            body.push_str(&format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"{n}\"; filename=\"{n}.png\"\r\n\
                 Content-Type: image/png\r\n\r\n{c}\r\n",
                b = BOUNDARY,
                n = name,
                c = chunk
            ));
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));

        let req = upload(body)
            .insert_header(bearer(&state.config, &owner))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["message"].as_str().unwrap().contains("Form data exceeds"));
        assert_eq!(state.storage.len(), 0);
        assert!(state.repos.task_images.ids_for_task(task.id).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn upload_fetch_and_delete() {
        let state = TestState::new();
        let owner = seed_user(&state.repos, "owner", false).await;
        let other = seed_user(&state.repos, "other", false).await;
        let category = seed_category(&state.repos, "Backend").await.id;
        let status = seed_status(&state.repos, "Open").await.id;
        let task = create_task(
            &state.repos,
            &principal(&owner),
            CreateTaskRequest {
                title: "With image".into(),
                category,
                status,
                text: "text".into(),
                available: true,
            },
        )
        .await
        .unwrap();
        let app = test::init_service(App::new().configure(|cfg| state.register(cfg))).await;

        let req = upload(form("shot", "99999", true))
            .insert_header(bearer(&state.config, &other))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = upload(form("shot", &task.id.to_string(), true))
            .insert_header(bearer(&state.config, &other))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = upload(form("shot", &task.id.to_string(), false))
            .insert_header(bearer(&state.config, &owner))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = upload(form("shot", &task.id.to_string(), true)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = upload(form("shot", &task.id.to_string(), true))
            .insert_header(bearer(&state.config, &owner))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        let id = body["data"]["id"].as_i64().unwrap();
        assert!(body["data"]["image"].as_str().unwrap().starts_with("/media/taskimage/"));
        assert_eq!(state.storage.len(), 1);

        let req = test::TestRequest::get()
            .uri(&format!("/api/tasks/image/{}/", id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["title"], "shot");

        let req = test::TestRequest::delete()
            .uri(&format!("/api/tasks/image/{}/", id))
            .insert_header(bearer(&state.config, &other))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/tasks/image/{}/", id))
            .insert_header(bearer(&state.config, &owner))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.storage.len(), 0);

        let req = test::TestRequest::get()
            .uri(&format!("/api/tasks/image/{}/", id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
