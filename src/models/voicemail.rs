use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// A captured voicemail message.
///
/// The serialized form is what listeners and the list route see; media is
/// fetched through its own route, so the URL stays server side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct VoicemailMessage {
    pub id: i64,
    #[serde(skip_serializing)]
    pub subscriber_id: i64,
    #[serde(skip_serializing)]
    pub recording_id: Option<String>,
    #[serde(skip_serializing)]
    pub media_url: String,
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "endTime")]
    pub end_time: DateTime<Utc>,
    #[serde(rename = "from")]
    pub from_number: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl VoicemailMessage {
    /// Last path segment of the media URL, used to download the file.
    pub fn media_name(&self) -> &str {
        self.media_url.rsplit('/').next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewVoicemailMessage {
    pub subscriber_id: i64,
    pub recording_id: Option<String>,
    pub media_url: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub from_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(media_url: &str) -> VoicemailMessage {
        VoicemailMessage {
            id: 7,
            subscriber_id: 1,
            recording_id: Some("r1".to_string()),
            media_url: media_url.to_string(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            from_number: "+15551234567".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_media_name() {
        assert_eq!(message("https://api.example.com/v1/users/u/media/m1").media_name(), "m1");
        assert_eq!(message("m1").media_name(), "m1");
    }

    #[test]
    fn test_serialized_fields() {
        let json = serde_json::to_value(message("http://host/m1")).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["from"], "+15551234567");
        assert!(json.get("startTime").is_some());
        assert!(json.get("endTime").is_some());
        assert!(json.get("media_url").is_none());
    }
}
