//! Service configuration
//!
//! Everything is read from the environment (a `.env` file is loaded first by
//! the binary).

use std::time::Duration;

use super::flows::FlowConfig;

const DEFAULT_API_URL: &str = "https://api.catapult.inetwork.com/v1";
const DEFAULT_BEEP_URL: &str = "https://s3.amazonaws.com/bwdemos/beep.mp3";
const DEFAULT_JWT_SECRET: &str = "your-secret-key";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,

    /// Catapult account the calls are placed on
    pub catapult_user_id: String,
    pub catapult_api_token: String,
    pub catapult_api_secret: String,
    pub catapult_api_url: String,
    /// SIP domain of the subscribers' endpoints; only needed for `/api/sip-data`
    pub catapult_domain_id: String,

    /// Public URL of `/api/webhooks/calls`, handed to the provider as the
    /// callback of every call we create
    pub webhook_url: String,

    pub jwt_secret: String,

    /// Ring time of a subscriber's device before voicemail (seconds)
    pub answer_timeout_secs: u64,

    /// Ring time of a call dialed from a subscriber's device (seconds)
    pub outbound_answer_timeout_secs: u64,

    pub ringback_url: String,
    pub beep_url: String,
}

impl AppConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).unwrap_or_default();
        let number = |name: &str, default: u64| {
            lookup(name)
                .and_then(|value| value.parse().ok())
                .unwrap_or(default)
        };

        Self {
            database_url: var("DATABASE_URL"),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            catapult_user_id: var("CATAPULT_USER_ID"),
            catapult_api_token: var("CATAPULT_API_TOKEN"),
            catapult_api_secret: var("CATAPULT_API_SECRET"),
            catapult_api_url: lookup("CATAPULT_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            catapult_domain_id: var("CATAPULT_DOMAIN_ID"),
            webhook_url: var("WEBHOOK_URL"),
            jwt_secret: lookup("JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string()),
            answer_timeout_secs: number("ANSWER_TIMEOUT_SECS", 15),
            outbound_answer_timeout_secs: number("OUTBOUND_ANSWER_TIMEOUT_SECS", 60),
            ringback_url: var("RINGBACK_URL"),
            beep_url: lookup("BEEP_URL").unwrap_or_else(|| DEFAULT_BEEP_URL.to_string()),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.database_url.is_empty() {
            return Err("DATABASE_URL is required".to_string());
        }
        if self.catapult_user_id.is_empty() {
            return Err("CATAPULT_USER_ID is required".to_string());
        }
        if self.catapult_api_token.is_empty() || self.catapult_api_secret.is_empty() {
            return Err("CATAPULT_API_TOKEN and CATAPULT_API_SECRET are required".to_string());
        }
        if self.webhook_url.is_empty() {
            return Err("WEBHOOK_URL is required".to_string());
        }
        if self.answer_timeout_secs == 0 || self.outbound_answer_timeout_secs == 0 {
            return Err("Answer timeouts must be positive".to_string());
        }
        Ok(())
    }

    pub fn uses_default_jwt_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }

    pub fn flow_config(&self) -> FlowConfig {
        FlowConfig {
            webhook_url: self.webhook_url.clone(),
            answer_timeout: Duration::from_secs(self.answer_timeout_secs),
            outbound_answer_timeout: Duration::from_secs(self.outbound_answer_timeout_secs),
            ringback_url: self.ringback_url.clone(),
            beep_url: self.beep_url.clone(),
        }
    }
}
