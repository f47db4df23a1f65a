//! Voicemail message database operations

use sqlx::PgPool;
use crate::models::{NewVoicemailMessage, VoicemailMessage};

/// Store a message. Returns `None` when a message for the same recording
/// already exists.
pub async fn insert(pool: &PgPool, message: &NewVoicemailMessage) -> Result<Option<VoicemailMessage>, sqlx::Error> {
    sqlx::query_as::<_, VoicemailMessage>(
        r#"
        INSERT INTO voice_messages (subscriber_id, recording_id, media_url, start_time, end_time, from_number, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        ON CONFLICT (recording_id) WHERE recording_id IS NOT NULL DO NOTHING
        RETURNING id, subscriber_id, recording_id, media_url, start_time, end_time, from_number, created_at
        "#
    )
    .bind(message.subscriber_id)
    .bind(&message.recording_id)
    .bind(&message.media_url)
    .bind(message.start_time)
    .bind(message.end_time)
    .bind(&message.from_number)
    .fetch_optional(pool)
    .await
}

pub async fn get_by_subscriber(pool: &PgPool, subscriber_id: i64) -> Result<Vec<VoicemailMessage>, sqlx::Error> {
    sqlx::query_as::<_, VoicemailMessage>(
        r#"
        SELECT id, subscriber_id, recording_id, media_url, start_time, end_time, from_number, created_at
        FROM voice_messages
        WHERE subscriber_id = $1
        ORDER BY start_time DESC
        "#
    )
    .bind(subscriber_id)
    .fetch_all(pool)
    .await
}

pub async fn get_by_id(pool: &PgPool, subscriber_id: i64, id: i64) -> Result<Option<VoicemailMessage>, sqlx::Error> {
    sqlx::query_as::<_, VoicemailMessage>(
        r#"
        SELECT id, subscriber_id, recording_id, media_url, start_time, end_time, from_number, created_at
        FROM voice_messages
        WHERE subscriber_id = $1 AND id = $2
        "#
    )
    .bind(subscriber_id)
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Returns `false` when there was nothing to delete.
pub async fn delete(pool: &PgPool, subscriber_id: i64, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM voice_messages WHERE subscriber_id = $1 AND id = $2")
        .bind(subscriber_id)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
