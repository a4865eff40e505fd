use actix_web::{web, HttpResponse, Result};
use serde_json::json;

use crate::database::Database;
use crate::models::auth::ApiResponse;

/// Service and database status with row counts
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Database unreachable")
    )
)]
pub async fn health_check(db: web::Data<Database>) -> Result<HttpResponse> {
    match db.health_check().await {
        Ok(_) => {
            let stats = db.get_stats().await.unwrap_or_else(|e| {
                log::warn!("Failed to collect database stats: {}", e);
                Default::default()
            });

            Ok(HttpResponse::Ok().json(ApiResponse::success(
                "Task Tracker API is running",
                json!({
                    "status": "ok",
                    "database": "connected",
                    "stats": stats
                }),
            )))
        }
        Err(e) => {
            log::error!("Database health check failed: {}", e);
            Ok(HttpResponse::ServiceUnavailable().json(json!({
                "status": "error",
                "message": "Database connection failed"
            })))
        }
    }
}

pub fn health_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}
