use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{
    CourseRepository, ExamRepository, QuestionRepository, Storage, UserRepository,
};

mod course_repo;
mod exam_repo;
mod mapping;
mod migrate;
mod question_repo;
mod user_repo;

const POOL_SIZE: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// `sqlite::memory:` and `mode=memory` URLs name databases that vanish once
/// their last connection closes.
fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

impl SqliteRepository {
    /// Connect to `SQLite` using the given URL.
    ///
    /// File databases run in WAL mode. In-memory databases keep one pooled
    /// connection open for the lifetime of the pool so the schema and data
    /// outlive idle periods.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL is malformed or the connection
    /// cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let in_memory = is_in_memory(database_url);
        let mut options = SqliteConnectOptions::from_str(database_url)?
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(POOL_SIZE)
            .acquire_timeout(BUSY_TIMEOUT);
        if in_memory {
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = pool_options.connect_with(options).await?;
        tracing::debug!(url = database_url, in_memory, "sqlite pool ready");
        Ok(Self { pool })
    }

    /// Bring the schema up to the latest version.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }

    /// Serve every repository contract from this one pool.
    #[must_use]
    pub fn into_storage(self) -> Storage {
        let shared = Arc::new(self);
        Storage {
            courses: Arc::clone(&shared) as Arc<dyn CourseRepository>,
            users: Arc::clone(&shared) as Arc<dyn UserRepository>,
            questions: Arc::clone(&shared) as Arc<dyn QuestionRepository>,
            exams: shared as Arc<dyn ExamRepository>,
        }
    }
}

impl Storage {
    /// Open (and migrate) an `SQLite` database.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo.into_storage())
    }
}
