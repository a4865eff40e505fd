//! In-memory repositories for tests. Mirrors the relational constraints the
//! Postgres schema enforces (foreign keys, unique username, one completion per task).

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::models::auth::{AvatarImage, NewUser, User};
use crate::models::image::{NewTaskImage, TaskImage};
use crate::models::task::{
    NamedEntity, NewTask, Task, TaskCompletion, TaskFilter, TaskListItem, TaskPatch,
};
use crate::repository::{
    NamedRepository, TaskCompletionRepository, TaskImageRepository, TaskRepository,
    UserRepository,
};
use crate::utils::errors::ServiceError;
use crate::utils::pagination::PageRequest;

#[derive(Default)]
struct Tables {
    next_id: i32,
    users: BTreeMap<i32, User>,
    avatars: BTreeMap<i32, AvatarImage>,
    named: HashMap<&'static str, BTreeMap<i32, String>>,
    tasks: BTreeMap<i32, Task>,
    images: BTreeMap<i32, TaskImage>,
    completions: BTreeMap<i32, TaskCompletion>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn named_name(&self, table: &str, id: i32) -> Option<&String> {
        self.named.get(table).and_then(|rows| rows.get(&id))
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }
}

#[async_trait]
impl UserRepository for MemoryRepository {
    async fn find_by_id(&self, id: i32) -> Result<Option<User>, ServiceError> {
        Ok(self.tables().users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, ServiceError> {
        let mut tables = self.tables();
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(ServiceError::ValidationError(
                "duplicate key value violates unique constraint \"users_username_key\"".to_string(),
            ));
        }

        let id = tables.next_id();
        let user = User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            is_active: true,
            is_staff: user.is_staff,
            avatar_id: None,
            date_joined: Utc::now(),
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_avatar(&self, id: i32) -> Result<Option<AvatarImage>, ServiceError> {
        Ok(self.tables().avatars.get(&id).cloned())
    }

    async fn set_avatar(
        &self,
        user_id: i32,
        image_path: &str,
    ) -> Result<AvatarImage, ServiceError> {
        let mut tables = self.tables();
        if !tables.users.contains_key(&user_id) {
            return Err(ServiceError::NotFound("Record not found".to_string()));
        }

        let id = tables.next_id();
        let avatar = AvatarImage {
            id,
            image_path: image_path.to_string(),
            date_uploaded: Utc::now().date_naive(),
        };
        tables.avatars.insert(id, avatar.clone());
        if let Some(user) = tables.users.get_mut(&user_id) {
            user.avatar_id = Some(id);
        }
        Ok(avatar)
    }

    async fn delete_avatar(&self, id: i32) -> Result<bool, ServiceError> {
        let mut tables = self.tables();
        if tables.avatars.remove(&id).is_none() {
            return Ok(false);
        }
        // ON DELETE SET NULL
        for user in tables.users.values_mut() {
            if user.avatar_id == Some(id) {
                user.avatar_id = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl<T: NamedEntity> NamedRepository<T> for MemoryRepository {
    async fn list(
        &self,
        name_contains: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<T>, i64), ServiceError> {
        let tables = self.tables();
        let matching: Vec<T> = tables
            .named
            .get(T::TABLE)
            .map(|rows| {
                rows.iter()
                    .filter(|(_, name)| {
                        name_contains.map_or(true, |n| contains_ignore_case(name, n))
                    })
                    .map(|(id, name)| T::new(*id, name.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let count = matching.len() as i64;
        let rows = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok((rows, count))
    }

    async fn find(&self, id: i32) -> Result<Option<T>, ServiceError> {
        Ok(self
            .tables()
            .named_name(T::TABLE, id)
            .map(|name| T::new(id, name.clone())))
    }

    async fn create(&self, name: &str) -> Result<T, ServiceError> {
        let mut tables = self.tables();
        let id = tables.next_id();
        tables
            .named
            .entry(T::TABLE)
            .or_default()
            .insert(id, name.to_string());
        Ok(T::new(id, name.to_string()))
    }

    async fn update(&self, id: i32, name: &str) -> Result<Option<T>, ServiceError> {
        let mut tables = self.tables();
        let row = tables.named.entry(T::TABLE).or_default().get_mut(&id);
        Ok(row.map(|stored| {
            *stored = name.to_string();
            T::new(id, name.to_string())
        }))
    }

    async fn delete(&self, id: i32) -> Result<bool, ServiceError> {
        let mut tables = self.tables();
        let referenced = tables.tasks.values().any(|t| match T::TASK_COLUMN {
            "category_id" => t.category_id == id,
            _ => t.status_id == id,
        });
        if referenced {
            return Err(ServiceError::ValidationError(
                "update or delete violates foreign key constraint".to_string(),
            ));
        }
        Ok(tables
            .named
            .entry(T::TABLE)
            .or_default()
            .remove(&id)
            .is_some())
    }

    async fn is_referenced(&self, id: i32) -> Result<bool, ServiceError> {
        Ok(self.tables().tasks.values().any(|t| match T::TASK_COLUMN {
            "category_id" => t.category_id == id,
            _ => t.status_id == id,
        }))
    }
}

#[async_trait]
impl TaskRepository for MemoryRepository {
    async fn create(&self, task: NewTask) -> Result<Task, ServiceError> {
        let mut tables = self.tables();
        if tables.named_name("categories", task.category_id).is_none()
            || tables.named_name("statuses", task.status_id).is_none()
        {
            return Err(ServiceError::ValidationError(
                "Referenced object does not exist".to_string(),
            ));
        }

        let id = tables.next_id();
        let now = Utc::now();
        let task = Task {
            id,
            title: task.title,
            category_id: task.category_id,
            status_id: task.status_id,
            user_id: task.user_id,
            text: task.text,
            available: task.available,
            created_at: now,
            edited_at: now,
        };
        tables.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn find(&self, id: i32) -> Result<Option<Task>, ServiceError> {
        Ok(self.tables().tasks.get(&id).cloned())
    }

    async fn list(&self, filter: &TaskFilter) -> Result<Vec<TaskListItem>, ServiceError> {
        let tables = self.tables();
        let items = tables
            .tasks
            .values()
            .filter_map(|task| {
                let category = tables.named_name("categories", task.category_id)?.clone();
                let status = tables.named_name("statuses", task.status_id)?.clone();
                let user = tables.users.get(&task.user_id)?.username.clone();

                let keep = filter.available.map_or(true, |a| task.available == a)
                    && filter
                        .category_name
                        .as_deref()
                        .map_or(true, |n| contains_ignore_case(&category, n))
                    && filter
                        .status_name
                        .as_deref()
                        .map_or(true, |n| contains_ignore_case(&status, n));

                keep.then(|| TaskListItem {
                    id: task.id,
                    title: task.title.clone(),
                    category,
                    status,
                    user,
                    available: task.available,
                })
            })
            .collect();
        Ok(items)
    }

    async fn update(&self, id: i32, patch: &TaskPatch) -> Result<Option<Task>, ServiceError> {
        let mut tables = self.tables();
        let category_missing = patch
            .category
            .map_or(false, |c| tables.named_name("categories", c).is_none());
        let status_missing = patch
            .status
            .map_or(false, |s| tables.named_name("statuses", s).is_none());
        if category_missing || status_missing {
            return Err(ServiceError::ValidationError(
                "Referenced object does not exist".to_string(),
            ));
        }

        Ok(tables.tasks.get_mut(&id).map(|task| {
            if let Some(ref title) = patch.title {
                task.title = title.clone();
            }
            if let Some(category) = patch.category {
                task.category_id = category;
            }
            if let Some(status) = patch.status {
                task.status_id = status;
            }
            if let Some(ref text) = patch.text {
                task.text = text.clone();
            }
            if let Some(available) = patch.available {
                task.available = available;
            }
            task.edited_at = Utc::now();
            task.clone()
        }))
    }

    async fn delete_owned(
        &self,
        id: i32,
        user_id: i32,
    ) -> Result<Option<Vec<String>>, ServiceError> {
        let mut tables = self.tables();
        match tables.tasks.get(&id) {
            Some(task) if task.user_id == user_id => {}
            _ => return Ok(None),
        }

        tables.tasks.remove(&id);
        tables.completions.retain(|_, c| c.task_id != id);

        let image_ids: Vec<i32> = tables
            .images
            .values()
            .filter(|image| image.task_id == id)
            .map(|image| image.id)
            .collect();
        let paths = image_ids
            .into_iter()
            .filter_map(|image_id| tables.images.remove(&image_id))
            .map(|image| image.image_path)
            .collect();

        Ok(Some(paths))
    }
}

#[async_trait]
impl TaskImageRepository for MemoryRepository {
    async fn create(&self, image: NewTaskImage) -> Result<TaskImage, ServiceError> {
        let mut tables = self.tables();
        if !tables.tasks.contains_key(&image.task_id) {
            return Err(ServiceError::ValidationError(
                "Referenced object does not exist".to_string(),
            ));
        }

        let id = tables.next_id();
        let image = TaskImage {
            id,
            title: image.title,
            image_path: image.image_path,
            created_at: Utc::now(),
            task_id: image.task_id,
        };
        tables.images.insert(id, image.clone());
        Ok(image)
    }

    async fn find(&self, id: i32) -> Result<Option<TaskImage>, ServiceError> {
        Ok(self.tables().images.get(&id).cloned())
    }

    async fn ids_for_task(&self, task_id: i32) -> Result<Vec<i32>, ServiceError> {
        Ok(self
            .tables()
            .images
            .values()
            .filter(|image| image.task_id == task_id)
            .map(|image| image.id)
            .collect())
    }

    async fn delete(&self, id: i32) -> Result<bool, ServiceError> {
        Ok(self.tables().images.remove(&id).is_some())
    }
}

#[async_trait]
impl TaskCompletionRepository for MemoryRepository {
    async fn find_for_task(&self, task_id: i32) -> Result<Option<TaskCompletion>, ServiceError> {
        Ok(self
            .tables()
            .completions
            .values()
            .find(|c| c.task_id == task_id)
            .cloned())
    }

    async fn create(&self, task_id: i32, user_id: i32) -> Result<TaskCompletion, ServiceError> {
        let mut tables = self.tables();
        if tables.completions.values().any(|c| c.task_id == task_id) {
            return Err(ServiceError::ValidationError(
                "duplicate key value violates unique constraint \"task_completions_task_id_key\""
                    .to_string(),
            ));
        }

        let id = tables.next_id();
        let completion = TaskCompletion {
            id,
            task_id,
            user_id,
            completed_at: Utc::now(),
        };
        tables.completions.insert(id, completion.clone());
        Ok(completion)
    }
}
