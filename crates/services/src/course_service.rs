use std::sync::Arc;

use exam_core::model::{Course, CourseId, User};
use storage::repository::{CourseRepository, NewCourse, StorageError, UserRepository};

use crate::error::CourseServiceError;

/// Manages courses and the users who practise in them.
#[derive(Clone)]
pub struct CourseService {
    courses: Arc<dyn CourseRepository>,
    users: Arc<dyn UserRepository>,
}

impl CourseService {
    #[must_use]
    pub fn new(courses: Arc<dyn CourseRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { courses, users }
    }

    /// Create a course and persist it.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::Course` for a blank title.
    /// Returns `CourseServiceError::Storage` if persistence fails.
    pub async fn create_course(
        &self,
        title: String,
        description: Option<String>,
    ) -> Result<CourseId, CourseServiceError> {
        let draft = Course::new(CourseId::new(0), title, description)?;
        let id = self
            .courses
            .insert_course(&NewCourse {
                title: draft.title().to_string(),
                description: draft.description().map(str::to_owned),
            })
            .await?;
        tracing::info!(course = %id, title = draft.title(), "created course");
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::Storage` if repository access fails.
    pub async fn list_courses(&self) -> Result<Vec<Course>, CourseServiceError> {
        Ok(self.courses.list_courses().await?)
    }

    /// Fetch a course by ID.
    ///
    /// Returns `Ok(None)` when the course does not exist.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::Storage` if repository access fails.
    pub async fn get_course(&self, id: CourseId) -> Result<Option<Course>, CourseServiceError> {
        Ok(self.courses.get_course(id).await?)
    }

    /// Rename a course, keeping its description.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::Course` if the new title is blank.
    /// Returns `CourseServiceError::Storage` if the course is missing or persistence fails.
    pub async fn rename_course(&self, id: CourseId, title: String) -> Result<(), CourseServiceError> {
        let course = self
            .courses
            .get_course(id)
            .await?
            .ok_or(StorageError::NotFound)?;
        let updated = Course::new(id, title, course.description().map(str::to_owned))?;
        self.courses.upsert_course(&updated).await?;
        Ok(())
    }

    /// Register or update a user profile.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::Storage` if persistence fails.
    pub async fn save_user(&self, user: &User) -> Result<(), CourseServiceError> {
        self.users.upsert_user(user).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use exam_core::model::{CourseError, UserId, UserRole};
    use storage::repository::InMemoryRepository;

    fn service(repo: &InMemoryRepository) -> CourseService {
        CourseService::new(Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn create_and_rename_course() {
        let repo = InMemoryRepository::new();
        let service = service(&repo);
        let id = service
            .create_course("  Anatomy ".into(), Some("Body".into()))
            .await
            .unwrap();

        service.rename_course(id, "Anatomy II".into()).await.unwrap();
        let course = service.get_course(id).await.unwrap().unwrap();
        assert_eq!(course.title(), "Anatomy II");
        assert_eq!(course.description(), Some("Body"));
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let repo = InMemoryRepository::new();
        let err = service(&repo)
            .create_course("   ".into(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CourseServiceError::Course(CourseError::EmptyTitle)));
        assert!(service(&repo).list_courses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn renaming_missing_course_fails() {
        let repo = InMemoryRepository::new();
        let err = service(&repo)
            .rename_course(CourseId::new(8), "X".into())
            .await
            .unwrap_err();
        assert!(matches!(err, CourseServiceError::Storage(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn users_are_saved() {
        let repo = InMemoryRepository::new();
        let user = User::new(UserId::new(4), Some("Lu".into()), UserRole::Admin);
        service(&repo).save_user(&user).await.unwrap();
        assert_eq!(repo.get_user(UserId::new(4)).await.unwrap(), Some(user));
    }
}
