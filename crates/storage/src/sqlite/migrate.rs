use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL CHECK (length(trim(title)) > 0),
            description TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            name TEXT,
            role TEXT NOT NULL DEFAULT 'student' CHECK (role IN ('student', 'admin'))
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            source TEXT NOT NULL CHECK (source IN ('previous', 'ai', 'kahoots')),
            text TEXT NOT NULL,
            answers TEXT NOT NULL,
            theme TEXT,
            explanation TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS exam_results (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            source TEXT NOT NULL CHECK (source IN ('previous', 'ai', 'kahoots')),
            grade_tenths INTEGER NOT NULL CHECK (grade_tenths BETWEEN 0 AND 200),
            total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
            correct_count INTEGER NOT NULL CHECK (correct_count >= 0),
            created_at TEXT NOT NULL,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS exam_answers (
            id INTEGER PRIMARY KEY,
            exam_result_id INTEGER NOT NULL,
            question_id INTEGER NOT NULL,
            selected_text TEXT,
            answer_value TEXT NOT NULL,
            FOREIGN KEY (exam_result_id) REFERENCES exam_results(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_questions_course_source
            ON questions (course_id, source, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_exam_results_user_course_created
            ON exam_results (user_id, course_id, created_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_exam_answers_result
            ON exam_answers (exam_result_id, question_id);
    ",
];

/// Runs the versioned schema migrations.
///
/// Version 1 creates courses, users, question pools, exam results with their
/// per-question answers, and the lookup indexes.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
