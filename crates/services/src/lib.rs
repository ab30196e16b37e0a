#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod course_service;
pub mod error;
pub mod import_service;
pub mod practice_service;
pub mod stats_service;

pub use exam_core::Clock;

pub use app_services::AppServices;
pub use config::PracticeConfig;
pub use course_service::CourseService;
pub use error::{
    AppServicesError, ConfigError, CourseServiceError, ImportError, PracticeError, StatsError,
};
pub use import_service::{ImportBatch, ImportIssue, ImportReport, ImportService, ImportedQuestion};
pub use practice_service::{ExamOutcome, ExamRequest, PracticeService};
pub use stats_service::{DEFAULT_LEADERBOARD_LIMIT, StatsService};
