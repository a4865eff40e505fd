pub mod auth;
pub mod catalog;
pub mod health;
pub mod image;
pub mod multipart;
pub mod task;

pub use auth::auth_config;
pub use catalog::catalog_config;
pub use health::health_config;
pub use task::task_config;

use actix_web::web;

use crate::utils::errors::ServiceError;

/// Unwraps a JSON body taken as `Result`, letting handlers authenticate first.
pub(crate) fn json_body<T>(
    body: Result<web::Json<T>, actix_web::Error>,
) -> Result<T, ServiceError> {
    body.map(web::Json::into_inner).map_err(|e| {
        e.as_error::<ServiceError>()
            .cloned()
            .unwrap_or_else(|| ServiceError::ValidationError(e.to_string()))
    })
}

/// Extractor error handlers plus every `/api` route.
/// `/health` needs a `Database` and is mounted separately.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        log::warn!("Rejected JSON body: {}", err);
        ServiceError::ValidationError(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        log::warn!("Rejected query string: {}", err);
        ServiceError::ValidationError(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        log::warn!("Rejected path: {}", err);
        ServiceError::NotFound("Not found".to_string()).into()
    }))
    .configure(auth_config)
    .configure(task_config)
    .configure(catalog_config);
}
