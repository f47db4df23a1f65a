//! Database access layer using sqlx with PostgreSQL
//!
//! Flows see the database through the [`Store`] traits; [`PgStore`] is the
//! production implementation over the query modules below.

pub mod subscribers;
pub mod active_calls;
pub mod voicemail;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use thiserror::Error;

use crate::models::{ActiveCall, NewActiveCall, NewVoicemailMessage, Subscriber, VoicemailMessage};

/// How long an active-call row stays visible. Matches the purge trigger.
pub const RETENTION_SECS: i64 = 2 * 60 * 60;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Initialize the database connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

#[async_trait]
pub trait SubscriberStore: Send + Sync {
    async fn subscriber(&self, id: i64) -> Result<Option<Subscriber>, StoreError>;
    async fn subscriber_by_phone_number(&self, phone_number: &str) -> Result<Option<Subscriber>, StoreError>;
    async fn subscriber_by_sip_uri(&self, sip_uri: &str) -> Result<Option<Subscriber>, StoreError>;
    async fn set_greeting(&self, id: i64, greeting_url: Option<&str>) -> Result<(), StoreError>;
}

/// Correlates call legs with bridges and subscribers across webhook deliveries.
#[async_trait]
pub trait ActiveCallRegistry: Send + Sync {
    async fn insert_call(&self, call: &NewActiveCall) -> Result<(), StoreError>;
    async fn call(&self, call_id: &str) -> Result<Option<ActiveCall>, StoreError>;
    async fn calls_in_bridge(&self, bridge_id: &str) -> Result<Vec<ActiveCall>, StoreError>;
}

#[async_trait]
pub trait VoicemailStore: Send + Sync {
    /// `None` when the recording was already stored.
    async fn insert_message(&self, message: &NewVoicemailMessage) -> Result<Option<VoicemailMessage>, StoreError>;
    async fn messages(&self, subscriber_id: i64) -> Result<Vec<VoicemailMessage>, StoreError>;
    async fn message(&self, subscriber_id: i64, id: i64) -> Result<Option<VoicemailMessage>, StoreError>;
    async fn delete_message(&self, subscriber_id: i64, id: i64) -> Result<bool, StoreError>;
}

pub trait Store: SubscriberStore + ActiveCallRegistry + VoicemailStore {}

impl<T: SubscriberStore + ActiveCallRegistry + VoicemailStore> Store for T {}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberStore for PgStore {
    async fn subscriber(&self, id: i64) -> Result<Option<Subscriber>, StoreError> {
        Ok(subscribers::get_by_id(&self.pool, id).await?)
    }

    async fn subscriber_by_phone_number(&self, phone_number: &str) -> Result<Option<Subscriber>, StoreError> {
        Ok(subscribers::get_by_phone_number(&self.pool, phone_number).await?)
    }

    async fn subscriber_by_sip_uri(&self, sip_uri: &str) -> Result<Option<Subscriber>, StoreError> {
        Ok(subscribers::get_by_sip_uri(&self.pool, sip_uri).await?)
    }

    async fn set_greeting(&self, id: i64, greeting_url: Option<&str>) -> Result<(), StoreError> {
        Ok(subscribers::set_greeting(&self.pool, id, greeting_url).await?)
    }
}

#[async_trait]
impl ActiveCallRegistry for PgStore {
    async fn insert_call(&self, call: &NewActiveCall) -> Result<(), StoreError> {
        Ok(active_calls::insert(&self.pool, call).await?)
    }

    async fn call(&self, call_id: &str) -> Result<Option<ActiveCall>, StoreError> {
        Ok(active_calls::get_by_call_id(&self.pool, call_id).await?)
    }

    async fn calls_in_bridge(&self, bridge_id: &str) -> Result<Vec<ActiveCall>, StoreError> {
        Ok(active_calls::get_by_bridge_id(&self.pool, bridge_id).await?)
    }
}

#[async_trait]
impl VoicemailStore for PgStore {
    async fn insert_message(&self, message: &NewVoicemailMessage) -> Result<Option<VoicemailMessage>, StoreError> {
        Ok(voicemail::insert(&self.pool, message).await?)
    }

    async fn messages(&self, subscriber_id: i64) -> Result<Vec<VoicemailMessage>, StoreError> {
        Ok(voicemail::get_by_subscriber(&self.pool, subscriber_id).await?)
    }

    async fn message(&self, subscriber_id: i64, id: i64) -> Result<Option<VoicemailMessage>, StoreError> {
        Ok(voicemail::get_by_id(&self.pool, subscriber_id, id).await?)
    }

    async fn delete_message(&self, subscriber_id: i64, id: i64) -> Result<bool, StoreError> {
        Ok(voicemail::delete(&self.pool, subscriber_id, id).await?)
    }
}
