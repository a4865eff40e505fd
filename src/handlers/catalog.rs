//! `/api/categories/` and `/api/statuses/`. Reads are open, writes need a staff token.

use actix_web::{web, HttpRequest, HttpResponse, Result};

use crate::config::AppConfig;
use crate::handlers::json_body;
use crate::models::auth::{ApiResponse, Principal};
use crate::models::task::{Category, NamedEntity, NamedListQuery, NamedRequest, Status};
use crate::repository::{NamedStore, Repositories};
use crate::services::auth::resolve_principal;
use crate::services::{access, catalog};
use crate::utils::errors::ServiceError;
use crate::utils::pagination::{Page, PageRequest};

// Runs before the request body is parsed
async fn staff_principal(
    req: &HttpRequest,
    config: &AppConfig,
    repos: &Repositories,
) -> Result<Principal, ServiceError> {
    let principal = resolve_principal(req, config, repos).await?;
    access::ensure_staff(principal)
}

async fn list_named<T: NamedEntity>(
    repos: &Repositories,
    config: &AppConfig,
    query: NamedListQuery,
) -> Result<HttpResponse, ServiceError>
where
    Repositories: NamedStore<T>,
{
    let page = PageRequest::parse(query.page.as_deref(), config.page_size)?;
    let rows = catalog::list::<T>(repos, query.name.as_deref(), page).await?;

    log::info!("Retrieved {} of {} {} rows", rows.results.len(), rows.count, T::TABLE);
    Ok(HttpResponse::Ok().json(ApiResponse::success(
        &format!("{} list retrieved successfully", T::LABEL),
        rows,
    )))
}

async fn get_named<T: NamedEntity>(
    repos: &Repositories,
    id: i32,
) -> Result<HttpResponse, ServiceError>
where
    Repositories: NamedStore<T>,
{
    let row = catalog::get::<T>(repos, id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(
        &format!("{} retrieved successfully", T::LABEL),
        row,
    )))
}

async fn create_named<T: NamedEntity>(
    req: &HttpRequest,
    repos: &Repositories,
    config: &AppConfig,
    body: Result<web::Json<NamedRequest>, actix_web::Error>,
) -> Result<HttpResponse, ServiceError>
where
    Repositories: NamedStore<T>,
{
    let principal = staff_principal(req, config, repos).await?;
    let row = catalog::create::<T>(repos, Some(principal), json_body(body)?).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(
        &format!("{} created successfully", T::LABEL),
        row,
    )))
}

async fn update_named<T: NamedEntity>(
    req: &HttpRequest,
    repos: &Repositories,
    config: &AppConfig,
    id: i32,
    body: Result<web::Json<NamedRequest>, actix_web::Error>,
) -> Result<HttpResponse, ServiceError>
where
    Repositories: NamedStore<T>,
{
    let principal = staff_principal(req, config, repos).await?;
    let row = catalog::update::<T>(repos, Some(principal), id, json_body(body)?).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(
        &format!("{} updated successfully", T::LABEL),
        row,
    )))
}

async fn delete_named<T: NamedEntity>(
    req: &HttpRequest,
    repos: &Repositories,
    config: &AppConfig,
    id: i32,
) -> Result<HttpResponse, ServiceError>
where
    Repositories: NamedStore<T>,
{
    let principal = resolve_principal(req, config, repos).await?;
    catalog::delete::<T>(repos, principal, id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// List categories
#[utoipa::path(
    get,
    path = "/api/categories/",
    tag = "categories",
    params(NamedListQuery),
    responses(
        (status = 200, description = "Categories retrieved", body = ApiResponse<Page<Category>>),
        (status = 404, description = "Invalid page", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn list_categories(
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    query: web::Query<NamedListQuery>,
) -> Result<HttpResponse, ServiceError> {
    log::info!("GET /api/categories/");
    list_named::<Category>(&repos, &config, query.into_inner()).await
}

/// Get a category
#[utoipa::path(
    get,
    path = "/api/categories/{id}/",
    tag = "categories",
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category retrieved", body = ApiResponse<Category>),
        (status = 404, description = "Category not found", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn get_category(
    repos: web::Data<Repositories>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ServiceError> {
    let id = path.into_inner();
    log::info!("GET /api/categories/{}/", id);
    get_named::<Category>(&repos, id).await
}

/// Create a category (staff only)
#[utoipa::path(
    post,
    path = "/api/categories/",
    tag = "categories",
    security(("bearer_auth" = [])),
    request_body = NamedRequest,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<Category>),
        (status = 400, description = "Validation error", body = crate::utils::errors::ServiceError),
        (status = 401, description = "Unauthorized", body = crate::utils::errors::ServiceError),
        (status = 403, description = "Staff only", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn create_category(
    req: HttpRequest,
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    body: Result<web::Json<NamedRequest>, actix_web::Error>,
) -> Result<HttpResponse, ServiceError> {
    log::info!("POST /api/categories/");
    create_named::<Category>(&req, &repos, &config, body).await
}

/// Rename a category (staff only)
#[utoipa::path(
    put,
    path = "/api/categories/{id}/",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Category ID")),
    request_body = NamedRequest,
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<Category>),
        (status = 400, description = "Validation error", body = crate::utils::errors::ServiceError),
        (status = 401, description = "Unauthorized", body = crate::utils::errors::ServiceError),
        (status = 403, description = "Staff only", body = crate::utils::errors::ServiceError),
        (status = 404, description = "Category not found", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn update_category(
    req: HttpRequest,
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
    body: Result<web::Json<NamedRequest>, actix_web::Error>,
) -> Result<HttpResponse, ServiceError> {
    let id = path.into_inner();
    log::info!("PUT /api/categories/{}/", id);
    update_named::<Category>(&req, &repos, &config, id, body).await
}

/// Delete a category no task refers to (staff only)
#[utoipa::path(
    delete,
    path = "/api/categories/{id}/",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 400, description = "Category is in use", body = crate::utils::errors::ServiceError),
        (status = 401, description = "Unauthorized", body = crate::utils::errors::ServiceError),
        (status = 403, description = "Staff only", body = crate::utils::errors::ServiceError),
        (status = 404, description = "Category not found", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn delete_category(
    req: HttpRequest,
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ServiceError> {
    let id = path.into_inner();
    log::info!("DELETE /api/categories/{}/", id);
    delete_named::<Category>(&req, &repos, &config, id).await
}

/// List statuses
#[utoipa::path(
    get,
    path = "/api/statuses/",
    tag = "statuses",
    params(NamedListQuery),
    responses(
        (status = 200, description = "Statuses retrieved", body = ApiResponse<Page<Status>>),
        (status = 404, description = "Invalid page", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn list_statuses(
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    query: web::Query<NamedListQuery>,
) -> Result<HttpResponse, ServiceError> {
    log::info!("GET /api/statuses/");
    list_named::<Status>(&repos, &config, query.into_inner()).await
}

/// Get a status
#[utoipa::path(
    get,
    path = "/api/statuses/{id}/",
    tag = "statuses",
    params(("id" = i32, Path, description = "Status ID")),
    responses(
        (status = 200, description = "Status retrieved", body = ApiResponse<Status>),
        (status = 404, description = "Status not found", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn get_status(
    repos: web::Data<Repositories>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ServiceError> {
    let id = path.into_inner();
    log::info!("GET /api/statuses/{}/", id);
    get_named::<Status>(&repos, id).await
}

/// Create a status (staff only)
#[utoipa::path(
    post,
    path = "/api/statuses/",
    tag = "statuses",
    security(("bearer_auth" = [])),
    request_body = NamedRequest,
    responses(
        (status = 201, description = "Status created", body = ApiResponse<Status>),
        (status = 400, description = "Validation error", body = crate::utils::errors::ServiceError),
        (status = 401, description = "Unauthorized", body = crate::utils::errors::ServiceError),
        (status = 403, description = "Staff only", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn create_status(
    req: HttpRequest,
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    body: Result<web::Json<NamedRequest>, actix_web::Error>,
) -> Result<HttpResponse, ServiceError> {
    log::info!("POST /api/statuses/");
    create_named::<Status>(&req, &repos, &config, body).await
}

/// Rename a status (staff only)
#[utoipa::path(
    put,
    path = "/api/statuses/{id}/",
    tag = "statuses",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Status ID")),
    request_body = NamedRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Status>),
        (status = 400, description = "Validation error", body = crate::utils::errors::ServiceError),
        (status = 401, description = "Unauthorized", body = crate::utils::errors::ServiceError),
        (status = 403, description = "Staff only", body = crate::utils::errors::ServiceError),
        (status = 404, description = "Status not found", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn update_status(
    req: HttpRequest,
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
    body: Result<web::Json<NamedRequest>, actix_web::Error>,
) -> Result<HttpResponse, ServiceError> {
    let id = path.into_inner();
    log::info!("PUT /api/statuses/{}/", id);
    update_named::<Status>(&req, &repos, &config, id, body).await
}

/// Delete a status no task refers to (staff only)
#[utoipa::path(
    delete,
    path = "/api/statuses/{id}/",
    tag = "statuses",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Status ID")),
    responses(
        (status = 204, description = "Status deleted"),
        (status = 400, description = "Status is in use", body = crate::utils::errors::ServiceError),
        (status = 401, description = "Unauthorized", body = crate::utils::errors::ServiceError),
        (status = 403, description = "Staff only", body = crate::utils::errors::ServiceError),
        (status = 404, description = "Status not found", body = crate::utils::errors::ServiceError)
    )
)]
pub async fn delete_status(
    req: HttpRequest,
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ServiceError> {
    let id = path.into_inner();
    log::info!("DELETE /api/statuses/{}/", id);
    delete_named::<Status>(&req, &repos, &config, id).await
}

pub fn catalog_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/categories")
            .route("/", web::get().to(list_categories))
            .route("/", web::post().to(create_category))
            .route("/{id}/", web::get().to(get_category))
            .route("/{id}/", web::put().to(update_category))
            .route("/{id}/", web::delete().to(delete_category)),
    )
    .service(
        web::scope("/api/statuses")
            .route("/", web::get().to(list_statuses))
            .route("/", web::post().to(create_status))
            .route("/{id}/", web::get().to(get_status))
            .route("/{id}/", web::put().to(update_status))
            .route("/{id}/", web::delete().to(delete_status)),
    );
}
