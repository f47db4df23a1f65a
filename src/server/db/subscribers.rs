//! Subscriber database operations

use sqlx::PgPool;
use crate::models::Subscriber;

pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(
        r#"
        SELECT id, user_name, phone_number, sip_uri, sip_password, greeting_url, endpoint_id, created_at
        FROM subscribers
        WHERE id = $1
        "#
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn get_by_phone_number(pool: &PgPool, phone_number: &str) -> Result<Option<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(
        r#"
        SELECT id, user_name, phone_number, sip_uri, sip_password, greeting_url, endpoint_id, created_at
        FROM subscribers
        WHERE phone_number = $1
        "#
    )
    .bind(phone_number)
    .fetch_optional(pool)
    .await
}

pub async fn get_by_sip_uri(pool: &PgPool, sip_uri: &str) -> Result<Option<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(
        r#"
        SELECT id, user_name, phone_number, sip_uri, sip_password, greeting_url, endpoint_id, created_at
        FROM subscribers
        WHERE sip_uri = $1
        "#
    )
    .bind(sip_uri)
    .fetch_optional(pool)
    .await
}

/// Set or clear (`None`) the custom greeting.
pub async fn set_greeting(pool: &PgPool, id: i64, greeting_url: Option<&str>) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE subscribers SET greeting_url = $2 WHERE id = $1")
        .bind(id)
        .bind(greeting_url)
        .execute(pool)
        .await?;
    Ok(())
}
