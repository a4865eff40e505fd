//! Fixtures shared by the unit and endpoint tests.

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::web;

use crate::config::AppConfig;
use crate::models::auth::{NewUser, Principal, User};
use crate::models::task::{Category, Status};
use crate::repository::Repositories;
use crate::services::auth::issue_token;
use crate::services::storage::memory::MemoryImageStorage;
use crate::services::storage::ImageStorage;

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://localhost/unused".to_string(),
        jwt_secret: "test-secret".to_string(),
        environment: "test".to_string(),
        port: 0,
        frontend_urls: vec!["http://localhost:3000".to_string()],
        jwt_expiration_hours: 1,
        media_root: PathBuf::from("media"),
        media_url: "/media/".to_string(),
        page_size: 10,
        max_upload_bytes: 1024 * 1024,
    }
}

pub async fn seed_user(repos: &Repositories, username: &str, is_staff: bool) -> User {
    repos
        .users
        .create(NewUser {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password_hash: bcrypt::hash("password123", 4).unwrap(),
            is_staff,
        })
        .await
        .unwrap()
}

pub fn principal(user: &User) -> Principal {
    Principal::from(user)
}

pub fn bearer(config: &AppConfig, user: &User) -> (&'static str, String) {
    let token = issue_token(config, user).unwrap();
    ("Authorization", format!("Bearer {}", token))
}

pub async fn seed_category(repos: &Repositories, name: &str) -> Category {
    repos.categories.create(name).await.unwrap()
}

pub async fn seed_status(repos: &Repositories, name: &str) -> Status {
    repos.statuses.create(name).await.unwrap()
}

/// App data for endpoint tests: in-memory rows and image storage.
pub struct TestState {
    pub repos: web::Data<Repositories>,
    pub config: web::Data<AppConfig>,
    pub storage: Arc<MemoryImageStorage>,
}

impl TestState {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        TestState {
            repos: web::Data::new(Repositories::in_memory()),
            config: web::Data::new(config),
            storage: Arc::new(MemoryImageStorage::default()),
        }
    }

    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        let storage: Arc<dyn ImageStorage> = self.storage.clone();
        cfg.app_data(self.repos.clone())
            .app_data(self.config.clone())
            .app_data(web::Data::from(storage));
        crate::handlers::configure(cfg);
    }
}
