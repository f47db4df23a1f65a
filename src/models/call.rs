use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// One call leg known to the active-call registry.
///
/// Legs sharing a `bridge_id` are torn down together. The subscriber is
/// `None` for the far end of a bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActiveCall {
    #[serde(rename = "callId")]
    pub call_id: String,
    #[serde(rename = "bridgeId")]
    pub bridge_id: Option<String>,
    #[serde(rename = "subscriberId")]
    pub subscriber_id: Option<i64>,
    #[serde(rename = "from")]
    pub from_number: String,
    #[serde(rename = "to")]
    pub to_number: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewActiveCall {
    pub call_id: String,
    pub bridge_id: Option<String>,
    pub subscriber_id: Option<i64>,
    pub from_number: String,
    pub to_number: String,
}

/// Call state as reported by the call-control provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallState {
    Started,
    Active,
    Transferring,
    Completed,
    Rejected,
    Error,
    Other(String),
}

impl CallState {
    pub fn parse(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "started" => CallState::Started,
            "active" => CallState::Active,
            "transferring" => CallState::Transferring,
            "completed" => CallState::Completed,
            "rejected" => CallState::Rejected,
            "error" => CallState::Error,
            _ => CallState::Other(state.to_string()),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, CallState::Active)
    }

    /// The leg is gone; a hang-up command would be redundant.
    pub fn is_terminated(&self) -> bool {
        matches!(self, CallState::Completed | CallState::Rejected | CallState::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_state_parse() {
        assert_eq!(CallState::parse("started"), CallState::Started);
        assert_eq!(CallState::parse("ACTIVE"), CallState::Active);
        assert_eq!(CallState::parse("parked"), CallState::Other("parked".to_string()));
    }

    #[test]
    fn test_terminated_states() {
        assert!(CallState::parse("completed").is_terminated());
        assert!(CallState::parse("rejected").is_terminated());
        assert!(!CallState::parse("started").is_terminated());
        assert!(!CallState::parse("active").is_terminated());
    }
}
