//! Active-call registry operations
//!
//! Rows are only inserted; a trigger removes rows older than two hours.
//! Reads apply the same window so a stale row is never matched before the
//! trigger has run.

use sqlx::PgPool;
use crate::models::{ActiveCall, NewActiveCall};

/// Insert a leg. A redelivered insert for a live call id is ignored.
pub async fn insert(pool: &PgPool, call: &NewActiveCall) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO active_calls (call_id, bridge_id, subscriber_id, from_number, to_number, created_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        ON CONFLICT (call_id) DO UPDATE
        SET bridge_id = EXCLUDED.bridge_id,
            subscriber_id = EXCLUDED.subscriber_id,
            from_number = EXCLUDED.from_number,
            to_number = EXCLUDED.to_number,
            created_at = EXCLUDED.created_at
        WHERE active_calls.created_at < NOW() - make_interval(secs => $6)
        "#
    )
    .bind(&call.call_id)
    .bind(&call.bridge_id)
    .bind(call.subscriber_id)
    .bind(&call.from_number)
    .bind(&call.to_number)
    .bind(super::RETENTION_SECS as f64)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_by_call_id(pool: &PgPool, call_id: &str) -> Result<Option<ActiveCall>, sqlx::Error> {
    sqlx::query_as::<_, ActiveCall>(
        r#"
        SELECT call_id, bridge_id, subscriber_id, from_number, to_number, created_at
        FROM active_calls
        WHERE call_id = $1 AND created_at >= NOW() - make_interval(secs => $2)
        "#
    )
    .bind(call_id)
    .bind(super::RETENTION_SECS as f64)
    .fetch_optional(pool)
    .await
}

pub async fn get_by_bridge_id(pool: &PgPool, bridge_id: &str) -> Result<Vec<ActiveCall>, sqlx::Error> {
    sqlx::query_as::<_, ActiveCall>(
        r#"
        SELECT call_id, bridge_id, subscriber_id, from_number, to_number, created_at
        FROM active_calls
        WHERE bridge_id = $1 AND created_at >= NOW() - make_interval(secs => $2)
        ORDER BY created_at
        "#
    )
    .bind(bridge_id)
    .bind(super::RETENTION_SECS as f64)
    .fetch_all(pool)
    .await
}
