use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// A registered subscriber: one public phone number and one SIP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscriber {
    pub id: i64,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    #[serde(rename = "sipUri")]
    pub sip_uri: String,
    #[serde(skip_serializing)]
    pub sip_password: String,
    #[serde(rename = "greetingUrl")]
    pub greeting_url: Option<String>,
    /// Provider endpoint backing the SIP account, used to mint WebRTC tokens.
    #[serde(skip_serializing)]
    pub endpoint_id: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Subscriber {
    /// Custom greeting media, if one has been recorded. An empty value means default.
    pub fn greeting(&self) -> Option<&str> {
        self.greeting_url.as_deref().filter(|url| !url.is_empty())
    }

    /// Sentence spoken when the subscriber has no custom greeting.
    pub fn default_greeting(&self) -> String {
        format!(
            "Hello. You have called to {}. Please leave a message after beep.",
            self.phone_number
        )
    }
}
