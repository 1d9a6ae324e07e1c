use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

pub type DbPool = Arc<SqlitePool>;

pub async fn init_db(database_url: &str) -> Result<DbPool, sqlx::Error> {
    tracing::info!("Connecting to database: {}", database_url);

    let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool_options = SqlitePoolOptions::new();
    // An in-memory database lives only as long as its last connection, so pin
    // a single connection that never expires.
    let pool_options = if is_in_memory(database_url) {
        pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        if let Some(dir) = parent_dir(connect_options.get_filename()) {
            std::fs::create_dir_all(dir).map_err(sqlx::Error::Io)?;
        }
        pool_options.max_connections(5)
    };

    let pool = pool_options.connect_with(connect_options).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            username TEXT PRIMARY KEY,
            password TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            phone TEXT NOT NULL,
            join_at TEXT NOT NULL,
            last_login_at TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            from_username TEXT NOT NULL REFERENCES users(username),
            to_username TEXT NOT NULL REFERENCES users(username),
            body TEXT NOT NULL,
            sent_at TEXT NOT NULL,
            read_at TEXT
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_from_username ON messages(from_username)")
        .execute(&pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_to_username ON messages(to_username)")
        .execute(&pool)
        .await?;

    tracing::info!("Database ready");

    Ok(Arc::new(pool))
}

// sqlx keeps its parsed `in_memory` flag private; these are the two URL forms it honours.
fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

fn parent_dir(filename: &Path) -> Option<&Path> {
    filename.parent().filter(|dir| !dir.as_os_str().is_empty())
}

/// True when the store rejected a write for breaking a UNIQUE/PRIMARY KEY constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}
