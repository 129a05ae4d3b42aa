use std::{str::FromStr, sync::Arc, time::Duration};

use sqlx::{
    migrate::{MigrateError, Migrator},
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};
use tokio::sync::OnceCell;

use crate::{
    error::AppError,
    models::{NewUser, User},
    provider::Provider,
};

const USER_COLUMNS: &str =
    "id, github_id, facebook_id, google_id, display_name, email, created_at";

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connects and migrates, failing if the store is unreachable.
    pub async fn new(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        tracing::info!("Running database migrations");
        MIGRATOR.run(&pool).await?;

        Ok(Database { pool })
    }

    /// Connects lazily. A store that cannot be reached at startup is logged
    /// and the server keeps running; requests needing it fail until the
    /// store comes back, at which point `UserRepository` migrates it.
    pub async fn connect_lenient(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_lazy_with(options);

        match MIGRATOR.run(&pool).await {
            Ok(()) => tracing::info!("Database {} ready", database_url),
            Err(e) => tracing::error!(
                "Error connecting to database {}: {}; continuing without it",
                database_url,
                e
            ),
        }

        Ok(Database { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
    // Set once migrations have succeeded against this pool
    schema_ready: Arc<OnceCell<()>>,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    /// Runs pending migrations the first time the store is reachable.
    async fn ensure_schema(&self) -> Result<(), AppError> {
        self.schema_ready
            .get_or_try_init(|| async {
                MIGRATOR.run(&self.pool).await.map_err(|e| match e {
                    // An unreachable store surfaces as a plain database error
                    MigrateError::Execute(db_error) => AppError::Database(db_error),
                    other => AppError::Migration(other),
                })?;
                tracing::debug!("User schema is up to date");
                Ok::<(), AppError>(())
            })
            .await?;
        Ok(())
    }

    pub async fn find_by_provider_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<User>, AppError> {
        self.ensure_schema().await?;

        let query = format!(
            "SELECT {} FROM users WHERE {} = ?",
            USER_COLUMNS,
            provider.id_column()
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        self.ensure_schema().await?;
        let now = chrono::Utc::now();

        let query = format!(
            "INSERT INTO users ({}, display_name, email, created_at) VALUES (?, ?, ?, ?)",
            user.provider.id_column()
        );

        let result = sqlx::query(&query)
            .bind(&user.external_id)
            .bind(&user.display_name)
            .bind(&user.email)
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;

        let created_user = self.find_by_id(result.last_insert_rowid()).await?;
        created_user.ok_or(AppError::Database(sqlx::Error::RowNotFound))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);

        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }
}

/// True when the error is a violated `UNIQUE` constraint.
pub fn is_unique_violation(error: &AppError) -> bool {
    match error {
        AppError::Database(sqlx::Error::Database(db_error)) => db_error.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
impl UserRepository {
    pub async fn count_by_provider_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<i64, AppError> {
        let query = format!(
            "SELECT COUNT(*) FROM users WHERE {} = ?",
            provider.id_column()
        );

        let count: i64 = sqlx::query_scalar(&query)
            .bind(external_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let database_url = format!("sqlite:{}", temp_dir.path().join("users.db").display());
        let db = Database::new(&database_url).await.unwrap();
        (db, temp_dir)
    }

    fn new_user(provider: Provider, external_id: &str, name: &str) -> NewUser {
        NewUser {
            provider,
            external_id: external_id.to_string(),
            display_name: name.to_string(),
            email: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let (db, _dir) = setup_test_db().await;
        let repo = UserRepository::new(db.pool().clone());

        let create_user = NewUser {
            provider: Provider::GitHub,
            external_id: "12345".to_string(),
            display_name: "Test User".to_string(),
            email: Some("test@example.com".to_string()),
        };

        let created_user = repo.create_user(create_user).await.unwrap();
        assert!(created_user.id > 0);
        assert_eq!(created_user.github_id.as_deref(), Some("12345"));
        assert_eq!(created_user.facebook_id, None);
        assert_eq!(created_user.google_id, None);
        assert_eq!(created_user.display_name, "Test User");
        assert_eq!(created_user.email.as_deref(), Some("test@example.com"));

        let found_user = repo
            .find_by_provider_id(Provider::GitHub, "12345")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found_user, created_user);
    }

    #[tokio::test]
    async fn test_find_nonexistent_user() {
        let (db, _dir) = setup_test_db().await;
        let repo = UserRepository::new(db.pool().clone());

        let result = repo
            .find_by_provider_id(Provider::Google, "nonexistent")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_lookup_is_scoped_to_provider_column() {
        let (db, _dir) = setup_test_db().await;
        let repo = UserRepository::new(db.pool().clone());

        repo.create_user(new_user(Provider::Facebook, "sameid", "fb"))
            .await
            .unwrap();

        let github = repo
            .find_by_provider_id(Provider::GitHub, "sameid")
            .await
            .unwrap();
        assert!(github.is_none());

        let github_created = repo
            .create_user(new_user(Provider::GitHub, "sameid", "gh"))
            .await
            .unwrap();
        assert_eq!(github_created.github_id.as_deref(), Some("sameid"));
        assert_eq!(github_created.facebook_id, None);
    }

    #[tokio::test]
    async fn test_unique_constraint() {
        let (db, _dir) = setup_test_db().await;
        let repo = UserRepository::new(db.pool().clone());

        repo.create_user(new_user(Provider::GitHub, "duplicate", "user1"))
            .await
            .unwrap();

        let result = repo
            .create_user(new_user(Provider::GitHub, "duplicate", "user2"))
            .await;
        let error = result.unwrap_err();
        assert!(is_unique_violation(&error));

        let count = repo
            .count_by_provider_id(Provider::GitHub, "duplicate")
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_check_constraint_requires_one_provider_id() {
        let (db, _dir) = setup_test_db().await;

        let result = sqlx::query(
            "INSERT INTO users (github_id, google_id, display_name, created_at)
             VALUES ('1', '2', 'both', '2024-01-01T00:00:00+00:00')",
        )
        .execute(db.pool())
        .await;
        assert!(result.is_err());

        let result = sqlx::query(
            "INSERT INTO users (display_name, created_at)
             VALUES ('none', '2024-01-01T00:00:00+00:00')",
        )
        .execute(db.pool())
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_lenient_connect_survives_unreachable_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let database_url = format!(
            "sqlite:{}",
            temp_dir.path().join("missing").join("users.db").display()
        );

        let db = Database::connect_lenient(&database_url).await.unwrap();
        let repo = UserRepository::new(db.pool().clone());

        let result = repo.find_by_provider_id(Provider::GitHub, "1").await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[tokio::test]
    async fn test_store_reachable_after_startup_is_migrated_on_use() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store_dir = temp_dir.path().join("late");
        let database_url = format!("sqlite:{}", store_dir.join("users.db").display());

        let db = Database::connect_lenient(&database_url).await.unwrap();
        let repo = UserRepository::new(db.pool().clone());
        assert!(repo.find_by_provider_id(Provider::GitHub, "1").await.is_err());

        std::fs::create_dir_all(&store_dir).unwrap();

        let created = repo
            .create_user(new_user(Provider::GitHub, "1", "late"))
            .await
            .unwrap();
        let found = repo
            .find_by_provider_id(Provider::GitHub, "1")
            .await
            .unwrap();
        assert_eq!(found, Some(created));
    }
}
