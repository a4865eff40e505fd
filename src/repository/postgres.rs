use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::auth::{AvatarImage, NewUser, User};
use crate::models::image::{NewTaskImage, TaskImage};
use crate::models::task::{
    NamedEntity, NewTask, Task, TaskCompletion, TaskFilter, TaskListItem, TaskPatch,
};
use crate::repository::{
    like_pattern, NamedRepository, TaskCompletionRepository, TaskImageRepository,
    TaskRepository, UserRepository,
};
use crate::utils::errors::ServiceError;
use crate::utils::pagination::PageRequest;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, is_active, is_staff, avatar_id, date_joined";
const TASK_COLUMNS: &str =
    "id, title, category_id, status_id, user_id, text, available, created_at, edited_at";
const TASK_IMAGE_COLUMNS: &str = "id, title, image_path, created_at, task_id";
const COMPLETION_COLUMNS: &str = "id, task_id, user_id, completed_at";

// Logs the failing action, then converts through `From<sqlx::Error>`
fn db_error(action: &'static str) -> impl FnOnce(sqlx::Error) -> ServiceError {
    move |e| {
        log::error!("Database error {}: {}", action, e);
        ServiceError::from(e)
    }
}

pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        PgRepository { pool }
    }
}

#[async_trait]
impl UserRepository for PgRepository {
    async fn find_by_id(&self, id: i32) -> Result<Option<User>, ServiceError> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetching user"))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetching user by username"))
    }

    async fn create(&self, user: NewUser) -> Result<User, ServiceError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash, is_active, is_staff, date_joined)
             VALUES ($1, $2, $3, TRUE, $4, NOW())
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_staff)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("creating user"))
    }

    async fn find_avatar(&self, id: i32) -> Result<Option<AvatarImage>, ServiceError> {
        sqlx::query_as::<_, AvatarImage>(
            "SELECT id, image_path, date_uploaded FROM avatar_images WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetching avatar"))
    }

    async fn set_avatar(
        &self,
        user_id: i32,
        image_path: &str,
    ) -> Result<AvatarImage, ServiceError> {
        let mut tx = self.pool.begin().await.map_err(db_error("beginning transaction"))?;

        let avatar = sqlx::query_as::<_, AvatarImage>(
            "INSERT INTO avatar_images (image_path, date_uploaded) VALUES ($1, CURRENT_DATE)
             RETURNING id, image_path, date_uploaded",
        )
        .bind(image_path)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("creating avatar"))?;

        sqlx::query("UPDATE users SET avatar_id = $1 WHERE id = $2")
            .bind(avatar.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("assigning avatar"))?;

        tx.commit().await.map_err(db_error("committing avatar"))?;
        Ok(avatar)
    }

    async fn delete_avatar(&self, id: i32) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM avatar_images WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("deleting avatar"))?;

        Ok(result.rows_affected() > 0)
    }
}

fn push_name_filter<'a>(builder: &mut QueryBuilder<'a, Postgres>, name_contains: Option<&str>) {
    if let Some(name) = name_contains {
        builder.push(" WHERE name ILIKE ").push_bind(like_pattern(name));
    }
}

#[async_trait]
impl<T: NamedEntity> NamedRepository<T> for PgRepository {
    async fn list(
        &self,
        name_contains: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<T>, i64), ServiceError> {
        let mut count_query =
            QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {}", T::TABLE));
        push_name_filter(&mut count_query, name_contains);
        let count = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("counting rows"))?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT id, name FROM {}", T::TABLE));
        push_name_filter(&mut query, name_contains);
        query
            .push(" ORDER BY id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = query
            .build_query_as::<T>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("listing rows"))?;

        Ok((rows, count))
    }

    async fn find(&self, id: i32) -> Result<Option<T>, ServiceError> {
        sqlx::query_as::<_, T>(&format!("SELECT id, name FROM {} WHERE id = $1", T::TABLE))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetching row"))
    }

    async fn create(&self, name: &str) -> Result<T, ServiceError> {
        sqlx::query_as::<_, T>(&format!(
            "INSERT INTO {} (name) VALUES ($1) RETURNING id, name",
            T::TABLE
        ))
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("creating row"))
    }

    async fn update(&self, id: i32, name: &str) -> Result<Option<T>, ServiceError> {
        sqlx::query_as::<_, T>(&format!(
            "UPDATE {} SET name = $1 WHERE id = $2 RETURNING id, name",
            T::TABLE
        ))
        .bind(name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("updating row"))
    }

    async fn delete(&self, id: i32) -> Result<bool, ServiceError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", T::TABLE))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("deleting row"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_referenced(&self, id: i32) -> Result<bool, ServiceError> {
        sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE {} = $1)",
            T::TASK_COLUMN
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("checking task references"))
    }
}

#[async_trait]
impl TaskRepository for PgRepository {
    async fn create(&self, task: NewTask) -> Result<Task, ServiceError> {
        sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks
                 (title, category_id, status_id, user_id, text, available, created_at, edited_at)
             VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
             RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(&task.title)
        .bind(task.category_id)
        .bind(task.status_id)
        .bind(task.user_id)
        .bind(&task.text)
        .bind(task.available)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("creating task"))
    }

    async fn find(&self, id: i32) -> Result<Option<Task>, ServiceError> {
        sqlx::query_as::<_, Task>(&format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetching task"))
    }

    async fn list(&self, filter: &TaskFilter) -> Result<Vec<TaskListItem>, ServiceError> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT t.id, t.title, c.name AS category, s.name AS status,
                    u.username AS \"user\", t.available
             FROM tasks t
             JOIN categories c ON c.id = t.category_id
             JOIN statuses s ON s.id = t.status_id
             JOIN users u ON u.id = t.user_id
             WHERE TRUE",
        );

        if let Some(available) = filter.available {
            query.push(" AND t.available = ").push_bind(available);
        }
        if let Some(ref name) = filter.category_name {
            query.push(" AND c.name ILIKE ").push_bind(like_pattern(name));
        }
        if let Some(ref name) = filter.status_name {
            query.push(" AND s.name ILIKE ").push_bind(like_pattern(name));
        }
        query.push(" ORDER BY t.id");

        query
            .build_query_as::<TaskListItem>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("listing tasks"))
    }

    async fn update(&self, id: i32, patch: &TaskPatch) -> Result<Option<Task>, ServiceError> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE tasks SET edited_at = NOW()");

        if let Some(ref title) = patch.title {
            query.push(", title = ").push_bind(title.clone());
        }
        if let Some(category) = patch.category {
            query.push(", category_id = ").push_bind(category);
        }
        if let Some(status) = patch.status {
            query.push(", status_id = ").push_bind(status);
        }
        if let Some(ref text) = patch.text {
            query.push(", text = ").push_bind(text.clone());
        }
        if let Some(available) = patch.available {
            query.push(", available = ").push_bind(available);
        }

        query.push(" WHERE id = ").push_bind(id);
        query.push(format!(" RETURNING {}", TASK_COLUMNS));

        query
            .build_query_as::<Task>()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("updating task"))
    }

    async fn delete_owned(
        &self,
        id: i32,
        user_id: i32,
    ) -> Result<Option<Vec<String>>, ServiceError> {
        let mut tx = self.pool.begin().await.map_err(db_error("beginning transaction"))?;

        let owned = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM tasks WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("locking task"))?;

        if owned.is_none() {
            return Ok(None);
        }

        let image_paths = sqlx::query_scalar::<_, String>(
            "DELETE FROM task_images WHERE task_id = $1 RETURNING image_path",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("deleting task images"))?;

        sqlx::query("DELETE FROM task_completions WHERE task_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("deleting task completion"))?;

        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("deleting task"))?;

        tx.commit().await.map_err(db_error("committing task delete"))?;
        Ok(Some(image_paths))
    }
}

#[async_trait]
impl TaskImageRepository for PgRepository {
    async fn create(&self, image: NewTaskImage) -> Result<TaskImage, ServiceError> {
        sqlx::query_as::<_, TaskImage>(&format!(
            "INSERT INTO task_images (title, image_path, task_id, created_at)
             VALUES ($1, $2, $3, NOW())
             RETURNING {}",
            TASK_IMAGE_COLUMNS
        ))
        .bind(&image.title)
        .bind(&image.image_path)
        .bind(image.task_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("creating task image"))
    }

    async fn find(&self, id: i32) -> Result<Option<TaskImage>, ServiceError> {
        sqlx::query_as::<_, TaskImage>(&format!(
            "SELECT {} FROM task_images WHERE id = $1",
            TASK_IMAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetching task image"))
    }

    async fn ids_for_task(&self, task_id: i32) -> Result<Vec<i32>, ServiceError> {
        sqlx::query_scalar::<_, i32>("SELECT id FROM task_images WHERE task_id = $1 ORDER BY id")
            .bind(task_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("listing task images"))
    }

    async fn delete(&self, id: i32) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM task_images WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("deleting task image"))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TaskCompletionRepository for PgRepository {
    async fn find_for_task(&self, task_id: i32) -> Result<Option<TaskCompletion>, ServiceError> {
        sqlx::query_as::<_, TaskCompletion>(&format!(
            "SELECT {} FROM task_completions WHERE task_id = $1",
            COMPLETION_COLUMNS
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetching task completion"))
    }

    async fn create(&self, task_id: i32, user_id: i32) -> Result<TaskCompletion, ServiceError> {
        sqlx::query_as::<_, TaskCompletion>(&format!(
            "INSERT INTO task_completions (task_id, user_id, completed_at)
             VALUES ($1, $2, NOW())
             RETURNING {}",
            COMPLETION_COLUMNS
        ))
        .bind(task_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("creating task completion"))
    }
}
