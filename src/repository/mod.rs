//! Persistence interfaces, one per entity.
//!
//! Services only see these traits. [`Repositories`] bundles the handles that
//! are shared with the handlers through `web::Data`.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::auth::{AvatarImage, NewUser, User};
use crate::models::image::{NewTaskImage, TaskImage};
use crate::models::task::{
    Category, NamedEntity, NewTask, Status, Task, TaskCompletion, TaskFilter, TaskListItem,
    TaskPatch,
};
use crate::utils::errors::ServiceError;
use crate::utils::pagination::PageRequest;

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> Result<Option<User>, ServiceError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, ServiceError>;
    async fn create(&self, user: NewUser) -> Result<User, ServiceError>;
    async fn find_avatar(&self, id: i32) -> Result<Option<AvatarImage>, ServiceError>;
    /// Records a new avatar image and points the user at it.
    async fn set_avatar(
        &self,
        user_id: i32,
        image_path: &str,
    ) -> Result<AvatarImage, ServiceError>;
    async fn delete_avatar(&self, id: i32) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait NamedRepository<T: NamedEntity>: Send + Sync {
    /// One page of rows ordered by id, plus the total matching count.
    async fn list(
        &self,
        name_contains: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<T>, i64), ServiceError>;
    async fn find(&self, id: i32) -> Result<Option<T>, ServiceError>;
    async fn create(&self, name: &str) -> Result<T, ServiceError>;
    async fn update(&self, id: i32, name: &str) -> Result<Option<T>, ServiceError>;
    async fn delete(&self, id: i32) -> Result<bool, ServiceError>;
    async fn is_referenced(&self, id: i32) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: NewTask) -> Result<Task, ServiceError>;
    async fn find(&self, id: i32) -> Result<Option<Task>, ServiceError>;
    async fn list(&self, filter: &TaskFilter) -> Result<Vec<TaskListItem>, ServiceError>;
    /// Applies the supplied fields and refreshes `edited_at`.
    async fn update(&self, id: i32, patch: &TaskPatch) -> Result<Option<Task>, ServiceError>;
    /// Deletes the task together with its images and completion, but only if
    /// `user_id` owns it. Returns the removed image paths, `None` if nothing matched.
    async fn delete_owned(
        &self,
        id: i32,
        user_id: i32,
    ) -> Result<Option<Vec<String>>, ServiceError>;
}

#[async_trait]
pub trait TaskImageRepository: Send + Sync {
    async fn create(&self, image: NewTaskImage) -> Result<TaskImage, ServiceError>;
    async fn find(&self, id: i32) -> Result<Option<TaskImage>, ServiceError>;
    async fn ids_for_task(&self, task_id: i32) -> Result<Vec<i32>, ServiceError>;
    async fn delete(&self, id: i32) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait TaskCompletionRepository: Send + Sync {
    async fn find_for_task(&self, task_id: i32) -> Result<Option<TaskCompletion>, ServiceError>;
    async fn create(&self, task_id: i32, user_id: i32) -> Result<TaskCompletion, ServiceError>;
}

#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub categories: Arc<dyn NamedRepository<Category>>,
    pub statuses: Arc<dyn NamedRepository<Status>>,
    pub tasks: Arc<dyn TaskRepository>,
    pub task_images: Arc<dyn TaskImageRepository>,
    pub completions: Arc<dyn TaskCompletionRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(postgres::PgRepository::new(pool));
        Repositories {
            users: store.clone(),
            categories: store.clone(),
            statuses: store.clone(),
            tasks: store.clone(),
            task_images: store.clone(),
            completions: store,
        }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryRepository::default());
        Repositories {
            users: store.clone(),
            categories: store.clone(),
            statuses: store.clone(),
            tasks: store.clone(),
            task_images: store.clone(),
            completions: store,
        }
    }
}

/// Selects the repository for a named lookup table.
pub trait NamedStore<T: NamedEntity> {
    fn named(&self) -> &dyn NamedRepository<T>;
}

impl NamedStore<Category> for Repositories {
    fn named(&self) -> &dyn NamedRepository<Category> {
        self.categories.as_ref()
    }
}

impl NamedStore<Status> for Repositories {
    fn named(&self) -> &dyn NamedRepository<Status> {
        self.statuses.as_ref()
    }
}

/// `ILIKE` pattern matching `needle` anywhere, with wildcards in it taken literally.
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
