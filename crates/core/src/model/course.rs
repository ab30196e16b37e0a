use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,
}

/// A subject whose question pools users practise against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    id: CourseId,
    title: String,
    description: Option<String>,
}

impl Course {
    /// # Errors
    ///
    /// Returns `CourseError::EmptyTitle` if the title is blank.
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Result<Self, CourseError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(CourseError::EmptyTitle);
        }
        Ok(Self {
            id,
            title,
            description: description.filter(|d| !d.trim().is_empty()),
        })
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Student,
    Admin,
}

impl UserRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Admin => "admin",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw == "admin" {
            UserRole::Admin
        } else {
            UserRole::Student
        }
    }
}

/// Identity of someone taking exams. Authentication lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: Option<String>,
    pub role: UserRole,
}

impl User {
    #[must_use]
    pub fn new(id: UserId, name: Option<String>, role: UserRole) -> Self {
        Self { id, name, role }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_title_is_trimmed_and_required() {
        let course = Course::new(CourseId::new(1), "  Anatomy ", Some(" ".into())).unwrap();
        assert_eq!(course.title(), "Anatomy");
        assert_eq!(course.description(), None);

        let err = Course::new(CourseId::new(2), "   ", None).unwrap_err();
        assert_eq!(err, CourseError::EmptyTitle);
    }

    #[test]
    fn role_parsing_defaults_to_student() {
        assert_eq!(UserRole::parse("admin"), UserRole::Admin);
        assert_eq!(UserRole::parse("tutor"), UserRole::Student);
    }
}
