pub mod auth;
pub mod messages;
pub mod users;

pub async fn health_check() -> &'static str {
    "OK"
}
