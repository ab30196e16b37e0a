use exam_core::model::{User, UserId, UserRole};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, push_placeholders, ser, user_id_from_i64};
use crate::repository::{StorageError, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn upsert_user(&self, user: &User) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO users (id, name, role)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                role = excluded.role
            ",
        )
        .bind(id_to_i64("user_id", user.id.value())?)
        .bind(user.name.as_deref())
        .bind(user.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query("SELECT id, name, role FROM users WHERE id = ?1")
            .bind(id_to_i64("user_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from("SELECT id, name, role FROM users WHERE id IN (");
        push_placeholders(&mut sql, 1, ids.len());
        sql.push_str(") ORDER BY id ASC");

        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(id_to_i64("user_id", id.value())?);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(conn)?;
        rows.iter().map(user_from_row).collect()
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User, StorageError> {
    let role: String = row.try_get("role").map_err(ser)?;
    Ok(User::new(
        user_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get("name").map_err(ser)?,
        UserRole::parse(&role),
    ))
}
