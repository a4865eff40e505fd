use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse, Result};

use crate::config::AppConfig;
use crate::handlers::multipart::read_form;
use crate::models::auth::{
    ApiResponse, LoginRequest, LoginResponseData, RegisterRequest, UserResponse,
};
use crate::models::image::UploadAvatarRequest;
use crate::repository::Repositories;
use crate::services::auth as auth_service;
use crate::services::storage::ImageStorage;
use crate::utils::errors::ServiceError;

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = ApiResponse<UserResponse>),
        (status = 400, description = "Validation error", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn register(
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    register_req: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ServiceError> {
    log::info!("POST /api/auth/register - Registering: {}", register_req.username);

    let user = auth_service::register(&repos, register_req.into_inner()).await?;
    let user = auth_service::user_response(&repos, &config, user).await?;

    Ok(HttpResponse::Created().json(ApiResponse::success("User registered successfully", user)))
}

/// Login and receive a JWT
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<LoginResponseData>),
        (status = 401, description = "Invalid credentials", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn login(
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    login_req: web::Json<LoginRequest>,
) -> Result<HttpResponse, ServiceError> {
    log::info!("POST /api/auth/login - Login attempt for: {}", login_req.username);

    let data = auth_service::login(&repos, &config, login_req.into_inner()).await?;

    log::info!("Login successful for user: {}", data.user.username);
    Ok(HttpResponse::Ok().json(ApiResponse::success("Login successful", data)))
}

/// Get the current user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "User information retrieved", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthorized", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn get_me(
    req: HttpRequest,
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, ServiceError> {
    log::info!("GET /api/auth/me");

    let principal = auth_service::require_principal(&req, &config, &repos).await?;
    let user = auth_service::current_user(&repos, &principal).await?;
    let user = auth_service::user_response(&repos, &config, user).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success("User information retrieved", user)))
}

/// Replace the current user's avatar
#[utoipa::path(
    put,
    path = "/api/auth/me/avatar",
    tag = "auth",
    security(
        ("bearer_auth" = [])
    ),
    request_body(
        content = inline(UploadAvatarRequest),
        description = "Avatar image as multipart/form-data",
        content_type = "multipart/form-data"
    ),
    responses(
        (status = 200, description = "Avatar updated", body = ApiResponse<UserResponse>),
        (status = 400, description = "Validation error", body = crate::utils::errors::ServiceError),
        (status = 401, description = "Unauthorized", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn update_avatar(
    req: HttpRequest,
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    storage: web::Data<dyn ImageStorage>,
    payload: Multipart,
) -> Result<HttpResponse, ServiceError> {
    log::info!("PUT /api/auth/me/avatar");

    let principal = auth_service::require_principal(&req, &config, &repos).await?;
    let mut form = read_form(payload, config.max_upload_bytes).await?;

    auth_service::set_avatar(
        &repos,
        storage.get_ref(),
        &config,
        &principal,
        form.take_file("image"),
    )
    .await?;

    let user = auth_service::current_user(&repos, &principal).await?;
    let user = auth_service::user_response(&repos, &config, user).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success("Avatar updated successfully", user)))
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/me", web::get().to(get_me))
            .route("/me/avatar", web::put().to(update_avatar)),
    );
}
