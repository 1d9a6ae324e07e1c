//! Message entity operations. Authorization is the caller's job.

use crate::db::{is_foreign_key_violation, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::{Message, MessageDetail, ReadReceipt, UserSummary};
use chrono::Utc;
use sqlx::Row;

pub async fn create(
    pool: &DbPool,
    from_username: &str,
    to_username: &str,
    body: &str,
) -> AppResult<Message> {
    let result = sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages (from_username, to_username, body, sent_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, from_username, to_username, body, sent_at
        "#,
    )
    .bind(from_username)
    .bind(to_username)
    .bind(body)
    .bind(Utc::now())
    .fetch_one(pool.as_ref())
    .await;

    match result {
        Ok(message) => {
            tracing::info!(id = message.id, from = from_username, to = to_username, "message sent");
            Ok(message)
        }
        // The sender comes from a verified token, so the dangling reference is the recipient.
        Err(e) if is_foreign_key_violation(&e) => Err(AppError::no_such_user(to_username)),
        Err(e) => Err(e.into()),
    }
}

pub async fn get_by_id(pool: &DbPool, id: i64) -> AppResult<MessageDetail> {
    let row = sqlx::query(
        r#"
        SELECT m.id, m.body, m.sent_at, m.read_at,
            f.username AS from_username,
            f.first_name AS from_first_name,
            f.last_name AS from_last_name,
            f.phone AS from_phone,
            t.username AS to_username,
            t.first_name AS to_first_name,
            t.last_name AS to_last_name,
            t.phone AS to_phone
        FROM messages m
        JOIN users f ON f.username = m.from_username
        JOIN users t ON t.username = m.to_username
        WHERE m.id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await?
    .ok_or_else(|| AppError::no_such_message(id))?;

    Ok(MessageDetail {
        id: row.try_get("id")?,
        body: row.try_get("body")?,
        sent_at: row.try_get("sent_at")?,
        read_at: row.try_get("read_at")?,
        from_user: UserSummary {
            username: row.try_get("from_username")?,
            first_name: row.try_get("from_first_name")?,
            last_name: row.try_get("from_last_name")?,
            phone: row.try_get("from_phone")?,
        },
        to_user: UserSummary {
            username: row.try_get("to_username")?,
            first_name: row.try_get("to_first_name")?,
            last_name: row.try_get("to_last_name")?,
            phone: row.try_get("to_phone")?,
        },
    })
}

/// Stamp `read_at` once. Later calls leave the first timestamp in place.
pub async fn mark_read(pool: &DbPool, id: i64) -> AppResult<ReadReceipt> {
    let receipt = sqlx::query_as::<_, ReadReceipt>(
        r#"
        UPDATE messages
        SET read_at = COALESCE(read_at, ?)
        WHERE id = ?
        RETURNING id, read_at
        "#,
    )
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await?
    .ok_or_else(|| AppError::no_such_message(id))?;

    tracing::info!(id, "message read");
    Ok(receipt)
}
