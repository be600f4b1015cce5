//! User cache operations

use crate::DbPool;
use reparto_core::{AppError, User, UserId, UserRole};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};

async fn insert_user<'e, E>(executor: E, user: &User) -> Result<(), AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT OR REPLACE INTO users (id, name, email, role, phone) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(user.role.as_wire_str())
    .bind(&user.phone)
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to store user", e))?;

    Ok(())
}

/// Inserts or replaces a user
pub async fn upsert_user(pool: &DbPool, user: &User) -> Result<(), AppError> {
    insert_user(pool, user).await
}

/// Replaces the whole user table
pub async fn replace_users(pool: &DbPool, users: &[User]) -> Result<(), AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin transaction", e))?;

    sqlx::query("DELETE FROM users")
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database("Failed to clear users", e))?;

    for user in users {
        insert_user(&mut *tx, user).await?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit users", e))?;

    Ok(())
}

/// Gets a user by ID
pub async fn get_user(pool: &DbPool, id: UserId) -> Result<User, AppError> {
    let row = sqlx::query("SELECT id, name, email, role, phone FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch user", e))?
        .ok_or_else(|| AppError::cache_miss("User", id))?;

    row_to_user(row)
}

/// Lists cached users by name
pub async fn list_users(pool: &DbPool) -> Result<Vec<User>, AppError> {
    let rows = sqlx::query(
        "SELECT id, name, email, role, phone FROM users ORDER BY name COLLATE NOCASE",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list users", e))?;

    rows.into_iter().map(row_to_user).collect()
}

/// Lists cached users holding `role`
pub async fn list_users_by_role(pool: &DbPool, role: UserRole) -> Result<Vec<User>, AppError> {
    let rows = sqlx::query(
        "SELECT id, name, email, role, phone FROM users WHERE role = ? ORDER BY name COLLATE NOCASE",
    )
    .bind(role.as_wire_str())
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list users by role", e))?;

    rows.into_iter().map(row_to_user).collect()
}

/// Deletes a user
pub async fn delete_user(pool: &DbPool, id: UserId) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete user", e))?;

    Ok(result.rows_affected() > 0)
}

/// Number of cached users
pub async fn count_users(pool: &DbPool) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count users", e))
}

fn row_to_user(row: SqliteRow) -> Result<User, AppError> {
    let role: String = row
        .try_get("role")
        .map_err(|e| AppError::database("Missing role", e))?;

    Ok(User {
        id: row
            .try_get("id")
            .map_err(|e| AppError::database("Missing user id", e))?,
        name: row
            .try_get("name")
            .map_err(|e| AppError::database("Missing name", e))?,
        email: row
            .try_get("email")
            .map_err(|e| AppError::database("Missing email", e))?,
        role: UserRole::parse(&role).unwrap_or(UserRole::Customer),
        phone: row.try_get("phone").ok().flatten(),
    })
}
