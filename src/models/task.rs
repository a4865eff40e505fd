use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::FromRow;
use chrono::{DateTime, Utc};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::utils::errors::ServiceError;

/// Fields a task owner may change through a partial update.
pub const TASK_UPDATE_FIELDS: [&str; 5] = ["title", "category", "status", "text", "available"];

/// Lookup tables that only carry a name (categories, statuses).
pub trait NamedEntity:
    Clone + Serialize + Send + Sync + Unpin + 'static + for<'r> FromRow<'r, PgRow>
{
    const TABLE: &'static str;
    /// Column in `tasks` that references this table.
    const TASK_COLUMN: &'static str;
    const LABEL: &'static str;

    fn new(id: i32, name: String) -> Self;
    fn id(&self) -> i32;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: i32,
    pub name: String,
}

impl NamedEntity for Category {
    const TABLE: &'static str = "categories";
    const TASK_COLUMN: &'static str = "category_id";
    const LABEL: &'static str = "Category";

    fn new(id: i32, name: String) -> Self {
        Category { id, name }
    }

    fn id(&self) -> i32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Status {
    pub id: i32,
    pub name: String,
}

impl NamedEntity for Status {
    const TABLE: &'static str = "statuses";
    const TASK_COLUMN: &'static str = "status_id";
    const LABEL: &'static str = "Status";

    fn new(id: i32, name: String) -> Self {
        Status { id, name }
    }

    fn id(&self) -> i32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NamedRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NamedListQuery {
    /// Case-insensitive substring of the name
    pub name: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Task {
    pub id: i32,
    pub title: String,
    pub category_id: i32,
    pub status_id: i32,
    pub user_id: i32,
    pub text: String,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub category_id: i32,
    pub status_id: i32,
    pub user_id: i32,
    pub text: String,
    pub available: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct TaskCompletion {
    pub id: i32,
    pub task_id: i32,
    pub user_id: i32,
    pub completed_at: DateTime<Utc>,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
    pub category: i32,
    pub status: i32,
    #[validate(length(min = 1, message = "Text may not be blank"))]
    pub text: String,
    #[serde(default = "default_available")]
    pub available: bool,
}

impl CreateTaskRequest {
    /// Trims text fields and runs the field rules.
    pub fn normalized(mut self) -> Result<Self, ServiceError> {
        self.title = self.title.trim().to_string();
        self.text = self.text.trim().to_string();
        self.validate()?;
        Ok(self)
    }
}

/// Partial update of a task. Only the fields present are applied.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TaskPatch {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,
    pub category: Option<i32>,
    pub status: Option<i32>,
    #[validate(length(min = 1, message = "Text may not be blank"))]
    pub text: Option<String>,
    pub available: Option<bool>,
}

impl TaskPatch {
    /// Builds a patch from raw body fields, checking every name against
    /// [`TASK_UPDATE_FIELDS`] before looking at the values.
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self, ServiceError> {
        if let Some(unknown) = fields
            .keys()
            .find(|key| !TASK_UPDATE_FIELDS.contains(&key.as_str()))
        {
            return Err(ServiceError::ValidationError(format!(
                "Unknown field '{}'",
                unknown
            )));
        }

        if let Some((key, _)) = fields.iter().find(|(_, value)| value.is_null()) {
            return Err(ServiceError::ValidationError(format!(
                "Field '{}' may not be null",
                key
            )));
        }

        let mut patch: TaskPatch = serde_json::from_value(Value::Object(fields))
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        patch.title = patch.title.map(|t| t.trim().to_string());
        patch.text = patch.text.map(|t| t.trim().to_string());
        patch.validate()?;

        Ok(patch)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub available: Option<bool>,
    pub category_name: Option<String>,
    pub status_name: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TaskListQuery {
    pub available: Option<String>,
    #[serde(rename = "category__name")]
    pub category_name: Option<String>,
    #[serde(rename = "status__name")]
    pub status_name: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl TaskListQuery {
    pub fn into_filter(self) -> Result<TaskFilter, ServiceError> {
        let available = match non_empty(self.available) {
            None => None,
            Some(raw) => match raw.to_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => {
                    return Err(ServiceError::ValidationError(format!(
                        "'{}' is not a valid value for available",
                        raw
                    )))
                }
            },
        };

        Ok(TaskFilter {
            available,
            category_name: non_empty(self.category_name),
            status_name: non_empty(self.status_name),
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct TaskListItem {
    pub id: i32,
    pub title: String,
    pub category: String,
    pub status: String,
    pub user: String,
    pub available: bool,
}

/// A task with the related rows its detail view needs.
#[derive(Debug, Clone)]
pub struct TaskDetail {
    pub task: Task,
    pub category: String,
    pub status: String,
    pub image_ids: Vec<i32>,
    pub completion: Option<TaskCompletion>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskCreatedResponse {
    pub id: i32,
    pub title: String,
    pub category: String,
    pub status: String,
    pub user: i32,
    pub text: String,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

impl From<TaskDetail> for TaskCreatedResponse {
    fn from(detail: TaskDetail) -> Self {
        let task = detail.task;
        TaskCreatedResponse {
            id: task.id,
            title: task.title,
            category: detail.category,
            status: detail.status,
            user: task.user_id,
            text: task.text,
            available: task.available,
            created_at: task.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskDetailResponse {
    pub id: i32,
    pub title: String,
    pub category: String,
    pub status: String,
    pub user: i32,
    pub text: String,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub edited_at: DateTime<Utc>,
    /// Links to the task's images
    pub images: Vec<String>,
    pub completion: Option<TaskCompletion>,
}

impl TaskDetailResponse {
    pub fn new(detail: TaskDetail, images: Vec<String>) -> Self {
        let task = detail.task;
        TaskDetailResponse {
            id: task.id,
            title: task.title,
            category: detail.category,
            status: detail.status,
            user: task.user_id,
            text: task.text,
            available: task.available,
            created_at: task.created_at,
            edited_at: task.edited_at,
            images,
            completion: detail.completion,
        }
    }
}
