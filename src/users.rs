//! User entity operations.

use crate::auth::{hash_password, verify_password};
use crate::db::{is_unique_violation, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, ReceivedMessage, SentMessage, UserDetail, UserSummary};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

/// Hash the password and insert the user. A taken username surfaces as the
/// store's unique-constraint violation and becomes [`AppError::Conflict`].
pub async fn register(pool: &DbPool, user: NewUser, bcrypt_cost: u32) -> AppResult<UserDetail> {
    let hashed = hash_password(user.password, bcrypt_cost).await?;
    let now = Utc::now();

    let result = sqlx::query_as::<_, UserDetail>(
        r#"
        INSERT INTO users (username, password, first_name, last_name, phone, join_at, last_login_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING username, first_name, last_name, phone, join_at, last_login_at
        "#,
    )
    .bind(&user.username)
    .bind(&hashed)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.phone)
    .bind(now)
    .bind(now)
    .fetch_one(pool.as_ref())
    .await;

    match result {
        Ok(created) => {
            tracing::info!(username = %created.username, "registered user");
            Ok(created)
        }
        Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(format!(
            "user already exists: {}",
            user.username
        ))),
        Err(e) => Err(e.into()),
    }
}

/// `Ok(false)` on a wrong password; `NotFound` when the user does not exist.
pub async fn authenticate(pool: &DbPool, username: &str, password: &str) -> AppResult<bool> {
    let hash: Option<String> = sqlx::query_scalar("SELECT password FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool.as_ref())
        .await?;

    let hash = hash.ok_or_else(|| AppError::no_such_user(username))?;
    verify_password(password.to_string(), hash).await
}

pub async fn touch_login(pool: &DbPool, username: &str) -> AppResult<()> {
    let result = sqlx::query("UPDATE users SET last_login_at = ? WHERE username = ?")
        .bind(Utc::now())
        .bind(username)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::no_such_user(username));
    }
    Ok(())
}

pub async fn list_all(pool: &DbPool) -> AppResult<Vec<UserSummary>> {
    let users = sqlx::query_as::<_, UserSummary>(
        "SELECT username, first_name, last_name, phone FROM users ORDER BY username",
    )
    .fetch_all(pool.as_ref())
    .await?;

    Ok(users)
}

pub async fn get_by_username(pool: &DbPool, username: &str) -> AppResult<UserDetail> {
    sqlx::query_as::<_, UserDetail>(
        r#"
        SELECT username, first_name, last_name, phone, join_at, last_login_at
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(pool.as_ref())
    .await?
    .ok_or_else(|| AppError::no_such_user(username))
}

/// Messages sent by `username`, each with the recipient's public profile.
pub async fn messages_from(pool: &DbPool, username: &str) -> AppResult<Vec<SentMessage>> {
    let rows = sqlx::query(
        r#"
        SELECT m.id, m.body, m.sent_at, m.read_at,
            u.username, u.first_name, u.last_name, u.phone
        FROM messages m
        JOIN users u ON u.username = m.to_username
        WHERE m.from_username = ?
        ORDER BY m.id
        "#,
    )
    .bind(username)
    .fetch_all(pool.as_ref())
    .await?;

    rows.iter()
        .map(|row| {
            let (id, body, sent_at, read_at) = message_columns(row)?;
            Ok(SentMessage {
                id,
                body,
                sent_at,
                read_at,
                to_user: joined_user(row)?,
            })
        })
        .collect()
}

/// Messages received by `username`, each with the sender's public profile.
pub async fn messages_to(pool: &DbPool, username: &str) -> AppResult<Vec<ReceivedMessage>> {
    let rows = sqlx::query(
        r#"
        SELECT m.id, m.body, m.sent_at, m.read_at,
            u.username, u.first_name, u.last_name, u.phone
        FROM messages m
        JOIN users u ON u.username = m.from_username
        WHERE m.to_username = ?
        ORDER BY m.id
        "#,
    )
    .bind(username)
    .fetch_all(pool.as_ref())
    .await?;

    rows.iter()
        .map(|row| {
            let (id, body, sent_at, read_at) = message_columns(row)?;
            Ok(ReceivedMessage {
                id,
                body,
                sent_at,
                read_at,
                from_user: joined_user(row)?,
            })
        })
        .collect()
}

type MessageColumns = (i64, String, DateTime<Utc>, Option<DateTime<Utc>>);

fn message_columns(row: &SqliteRow) -> AppResult<MessageColumns> {
    Ok((
        row.try_get("id")?,
        row.try_get("body")?,
        row.try_get("sent_at")?,
        row.try_get("read_at")?,
    ))
}

fn joined_user(row: &SqliteRow) -> AppResult<UserSummary> {
    Ok(UserSummary {
        username: row.try_get("username")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        phone: row.try_get("phone")?,
    })
}
