//! In-memory store used by flow and route tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::*;

#[derive(Default)]
struct Tables {
    subscribers: Vec<Subscriber>,
    active_calls: Vec<ActiveCall>,
    messages: Vec<VoicemailMessage>,
    next_message_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subscriber(&self, id: i64, phone_number: &str, sip_uri: &str) -> Subscriber {
        let subscriber = Subscriber {
            id,
            user_name: format!("user{}", id),
            phone_number: phone_number.to_string(),
            sip_uri: sip_uri.to_string(),
            sip_password: "secret".to_string(),
            greeting_url: None,
            endpoint_id: Some(format!("e{}", id)),
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().subscribers.push(subscriber.clone());
        subscriber
    }

    /// Make every subsequent call fail.
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Age a registry row by `seconds`.
    pub fn age_call(&self, call_id: &str, seconds: i64) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(call) = tables.active_calls.iter_mut().find(|c| c.call_id == call_id) {
            call.created_at -= Duration::seconds(seconds);
        }
    }

    pub fn all_calls(&self) -> Vec<ActiveCall> {
        self.tables.lock().unwrap().active_calls.clone()
    }

    pub fn all_messages(&self) -> Vec<VoicemailMessage> {
        self.tables.lock().unwrap().messages.clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".to_string()));
        }
        Ok(())
    }

    fn is_live(call: &ActiveCall) -> bool {
        call.created_at >= Utc::now() - Duration::seconds(RETENTION_SECS)
    }
}

#[async_trait]
impl SubscriberStore for MemoryStore {
    async fn subscriber(&self, id: i64) -> Result<Option<Subscriber>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.subscribers.iter().find(|s| s.id == id).cloned())
    }

    async fn subscriber_by_phone_number(&self, phone_number: &str) -> Result<Option<Subscriber>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.subscribers.iter().find(|s| s.phone_number == phone_number).cloned())
    }

    async fn subscriber_by_sip_uri(&self, sip_uri: &str) -> Result<Option<Subscriber>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.subscribers.iter().find(|s| s.sip_uri == sip_uri).cloned())
    }

    async fn set_greeting(&self, id: i64, greeting_url: Option<&str>) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if let Some(subscriber) = tables.subscribers.iter_mut().find(|s| s.id == id) {
            subscriber.greeting_url = greeting_url.map(str::to_string);
        }
        Ok(())
    }
}

#[async_trait]
impl ActiveCallRegistry for MemoryStore {
    async fn insert_call(&self, call: &NewActiveCall) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        tables.active_calls.retain(MemoryStore::is_live);
        if tables.active_calls.iter().any(|c| c.call_id == call.call_id) {
            return Ok(());
        }
        tables.active_calls.push(ActiveCall {
            call_id: call.call_id.clone(),
            bridge_id: call.bridge_id.clone(),
            subscriber_id: call.subscriber_id,
            from_number: call.from_number.clone(),
            to_number: call.to_number.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn call(&self, call_id: &str) -> Result<Option<ActiveCall>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .active_calls
            .iter()
            .find(|c| c.call_id == call_id && MemoryStore::is_live(c))
            .cloned())
    }

    async fn calls_in_bridge(&self, bridge_id: &str) -> Result<Vec<ActiveCall>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .active_calls
            .iter()
            .filter(|c| c.bridge_id.as_deref() == Some(bridge_id) && MemoryStore::is_live(c))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl VoicemailStore for MemoryStore {
    async fn insert_message(&self, message: &NewVoicemailMessage) -> Result<Option<VoicemailMessage>, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if message.recording_id.is_some()
            && tables.messages.iter().any(|m| m.recording_id == message.recording_id)
        {
            return Ok(None);
        }
        tables.next_message_id += 1;
        let stored = VoicemailMessage {
            id: tables.next_message_id,
            subscriber_id: message.subscriber_id,
            recording_id: message.recording_id.clone(),
            media_url: message.media_url.clone(),
            start_time: message.start_time,
            end_time: message.end_time,
            from_number: message.from_number.clone(),
            created_at: Utc::now(),
        };
        tables.messages.push(stored.clone());
        Ok(Some(stored))
    }

    async fn messages(&self, subscriber_id: i64) -> Result<Vec<VoicemailMessage>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let mut messages: Vec<_> = tables
            .messages
            .iter()
            .filter(|m| m.subscriber_id == subscriber_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(messages)
    }

    async fn message(&self, subscriber_id: i64, id: i64) -> Result<Option<VoicemailMessage>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .messages
            .iter()
            .find(|m| m.subscriber_id == subscriber_id && m.id == id)
            .cloned())
    }

    async fn delete_message(&self, subscriber_id: i64, id: i64) -> Result<bool, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let before = tables.messages.len();
        tables.messages.retain(|m| !(m.subscriber_id == subscriber_id && m.id == id));
        Ok(tables.messages.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_call(call_id: &str, bridge_id: Option<&str>) -> NewActiveCall {
        NewActiveCall {
            call_id: call_id.to_string(),
            bridge_id: bridge_id.map(str::to_string),
            subscriber_id: None,
            from_number: String::new(),
            to_number: String::new(),
        }
    }

    #[tokio::test]
    async fn test_expired_calls_are_invisible_and_reusable() {
        let store = MemoryStore::new();
        store.insert_call(&new_call("C1", Some("B1"))).await.unwrap();
        store.age_call("C1", RETENTION_SECS + 1);

        assert!(store.call("C1").await.unwrap().is_none());
        assert!(store.calls_in_bridge("B1").await.unwrap().is_empty());

        store.insert_call(&new_call("C1", Some("B2"))).await.unwrap();
        let call = store.call("C1").await.unwrap().unwrap();
        assert_eq!(call.bridge_id.as_deref(), Some("B2"));
    }

    #[tokio::test]
    async fn test_duplicate_insert_keeps_first_row() {
        let store = MemoryStore::new();
        store.insert_call(&new_call("C1", Some("B1"))).await.unwrap();
        store.insert_call(&new_call("C1", Some("B2"))).await.unwrap();
        assert_eq!(store.all_calls().len(), 1);
        assert_eq!(store.call("C1").await.unwrap().unwrap().bridge_id.as_deref(), Some("B1"));
    }
}
