use sqlx::{PgPool, Row};
use anyhow::{Result, Context};

const TABLES: [&str; 7] = [
    "avatar_images",
    "categories",
    "statuses",
    "task_completions",
    "task_images",
    "tasks",
    "users",
];

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        log::info!("🔗 Connecting to database...");

        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to the database")?;

        log::info!("✅ Database connection established");

        Ok(Database { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let one: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Failed to execute health check query")?;

        anyhow::ensure!(one == 1, "Database health check returned {}", one);
        Ok(())
    }

    /// Logs which of the expected tables are present. Missing tables are a warning, not an error.
    pub async fn check_tables(&self) -> Result<Vec<String>> {
        log::info!("📋 Checking database tables...");

        let rows = sqlx::query(
            r#"
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = ANY($1)
            ORDER BY table_name
            "#,
        )
        .bind(&TABLES[..])
        .fetch_all(&self.pool)
        .await
        .context("Failed to check database tables")?;

        let found: Vec<String> = rows
            .iter()
            .map(|row| row.get::<String, _>("table_name"))
            .collect();
        let missing: Vec<&str> = TABLES
            .iter()
            .copied()
            .filter(|t| !found.iter().any(|f| f == t))
            .collect();

        if missing.is_empty() {
            log::info!("✅ All required tables exist");
        } else {
            log::warn!("⚠️  Missing tables: {:?}", missing);
            log::warn!("   Apply db/schema.sql to create them");
        }

        Ok(missing.into_iter().map(str::to_string).collect())
    }

    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let stats = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) as user_count,
                (SELECT COUNT(*) FROM categories) as category_count,
                (SELECT COUNT(*) FROM statuses) as status_count,
                (SELECT COUNT(*) FROM tasks) as task_count,
                (SELECT COUNT(*) FROM task_images) as image_count,
                (SELECT COUNT(*) FROM task_completions) as completion_count
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to get database statistics")?;

        Ok(DatabaseStats {
            users: stats.get::<i64, _>("user_count"),
            categories: stats.get::<i64, _>("category_count"),
            statuses: stats.get::<i64, _>("status_count"),
            tasks: stats.get::<i64, _>("task_count"),
            images: stats.get::<i64, _>("image_count"),
            completions: stats.get::<i64, _>("completion_count"),
        })
    }
}

#[derive(Debug, Default, serde::Serialize, utoipa::ToSchema)]
pub struct DatabaseStats {
    pub users: i64,
    pub categories: i64,
    pub statuses: i64,
    pub tasks: i64,
    pub images: i64,
    pub completions: i64,
}

impl DatabaseStats {
    pub fn log_stats(&self) {
        log::info!("📈 Database Statistics:");
        log::info!("   👥 Users: {}", self.users);
        log::info!("   🗂️  Categories: {}", self.categories);
        log::info!("   🏷️  Statuses: {}", self.statuses);
        log::info!("   📋 Tasks: {}", self.tasks);
        log::info!("   🖼️  Images: {}", self.images);
        log::info!("   ✔️  Completions: {}", self.completions);
    }
}
