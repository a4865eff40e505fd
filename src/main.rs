use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use task_tracker_be::docs::ApiDoc;
use task_tracker_be::handlers;
use task_tracker_be::repository::Repositories;
use task_tracker_be::services::storage::{ImageStorage, LocalImageStorage};
use task_tracker_be::{AppConfig, Database};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let database = match Database::new(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            log::error!("❌ {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = database.health_check().await {
        log::error!("❌ {:#}", e);
        std::process::exit(1);
    }
    if let Err(e) = database.check_tables().await {
        log::warn!("⚠️  {:#}", e);
    }
    if let Ok(stats) = database.get_stats().await {
        stats.log_stats();
    }

    log::info!("🚀 Starting Task Tracker API on port {}", config.port);
    log::info!("📋 Allowed frontend URLs: {:?}", config.frontend_urls);
    log::info!("🖼️  Serving media from {}", config.media_root.display());
    if config.is_development() {
        log::info!("📖 Swagger UI at http://localhost:{}/swagger-ui/", config.port);
    }

    let port = config.port;
    let storage: Arc<dyn ImageStorage> =
        Arc::new(LocalImageStorage::new(config.media_root.clone()));
    let repos = web::Data::new(Repositories::postgres(database.pool.clone()));
    let storage = web::Data::from(storage);
    let database = web::Data::new(database);
    let config = web::Data::new(config);
    let openapi = ApiDoc::openapi();

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                "Authorization",
                "Content-Type",
                "Accept",
                "Origin",
                "X-Requested-With",
            ])
            .supports_credentials();

        for origin in &config.frontend_urls {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .app_data(repos.clone())
            .app_data(storage.clone())
            .app_data(database.clone())
            .app_data(config.clone())
            .configure(handlers::health_config)
            .configure(handlers::configure)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
            .route("/", web::get().to(|| async {
                HttpResponse::Ok().json(serde_json::json!({
                    "name": "Task Tracker API",
                    "version": env!("CARGO_PKG_VERSION"),
                    "description": "REST API for tracking tasks"
                }))
            }))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
