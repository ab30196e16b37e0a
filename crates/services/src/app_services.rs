use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::config::PracticeConfig;
use crate::course_service::CourseService;
use crate::error::AppServicesError;
use crate::import_service::ImportService;
use crate::practice_service::PracticeService;
use crate::stats_service::StatsService;

/// Assembles every service over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    courses: Arc<CourseService>,
    practice: Arc<PracticeService>,
    stats: Arc<StatsService>,
    import: Arc<ImportService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: PracticeConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, config))
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, config: PracticeConfig) -> Self {
        let courses = Arc::new(CourseService::new(
            Arc::clone(&storage.courses),
            Arc::clone(&storage.users),
        ));
        let practice = Arc::new(
            PracticeService::new(
                clock,
                Arc::clone(&storage.courses),
                Arc::clone(&storage.questions),
                Arc::clone(&storage.exams),
            )
            .with_config(config),
        );
        let stats = Arc::new(StatsService::new(
            Arc::clone(&storage.users),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.exams),
        ));
        let import = Arc::new(ImportService::new(
            Arc::clone(&storage.courses),
            Arc::clone(&storage.questions),
        ));

        Self {
            courses,
            practice,
            stats,
            import,
        }
    }

    #[must_use]
    pub fn courses(&self) -> Arc<CourseService> {
        Arc::clone(&self.courses)
    }

    #[must_use]
    pub fn practice(&self) -> Arc<PracticeService> {
        Arc::clone(&self.practice)
    }

    #[must_use]
    pub fn stats(&self) -> Arc<StatsService> {
        Arc::clone(&self.stats)
    }

    #[must_use]
    pub fn import(&self) -> Arc<ImportService> {
        Arc::clone(&self.import)
    }
}
