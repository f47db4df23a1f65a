//! Flattened call-control webhook event

use std::collections::HashMap;

use serde::Deserialize;

use super::tag::CallTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Answer,
    Playback,
    Speak,
    Gather,
    Recording,
    Timeout,
    Hangup,
    Unknown,
}

impl EventType {
    pub fn parse(event_type: &str) -> Self {
        match event_type {
            "answer" => EventType::Answer,
            "playback" => EventType::Playback,
            "speak" => EventType::Speak,
            "gather" => EventType::Gather,
            "recording" => EventType::Recording,
            "timeout" => EventType::Timeout,
            "hangup" => EventType::Hangup,
            _ => EventType::Unknown,
        }
    }
}

/// One webhook delivery. Missing fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallEvent {
    pub call_id: String,
    pub event_type: String,
    pub from: String,
    pub to: String,
    pub tag: String,
    pub digits: String,
    pub state: String,
    pub recording_id: String,
    pub status: String,
}

impl CallEvent {
    pub fn kind(&self) -> EventType {
        EventType::parse(&self.event_type)
    }

    pub fn call_tag(&self) -> CallTag {
        CallTag::parse(&self.tag)
    }

    /// Best-effort extraction from a JSON body.
    ///
    /// Non-string scalars are stringified and anything unreadable is left
    /// empty, so a malformed payload still yields an event.
    pub fn from_json(body: &[u8]) -> Self {
        match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(map)) => {
                let pairs = map
                    .into_iter()
                    .filter_map(|(key, value)| {
                        let value = match value {
                            serde_json::Value::String(s) => s,
                            serde_json::Value::Number(n) => n.to_string(),
                            serde_json::Value::Bool(b) => b.to_string(),
                            _ => return None,
                        };
                        Some((key, value))
                    })
                    .collect();
                Self::from_pairs(&pairs)
            }
            _ => Self::default(),
        }
    }

    /// Build from query-string or form pairs.
    pub fn from_pairs(pairs: &HashMap<String, String>) -> Self {
        let field = |name: &str| pairs.get(name).cloned().unwrap_or_default();
        Self {
            call_id: field("callId"),
            event_type: field("eventType"),
            from: field("from"),
            to: field("to"),
            tag: field("tag"),
            digits: field("digits"),
            state: field("state"),
            recording_id: field("recordingId"),
            status: field("status"),
        }
    }

    /// Fill fields missing from `self` with those of `other`.
    pub fn merge(mut self, other: CallEvent) -> Self {
        fn fill(target: &mut String, source: String) {
            if target.is_empty() {
                *target = source;
            }
        }
        fill(&mut self.call_id, other.call_id);
        fill(&mut self.event_type, other.event_type);
        fill(&mut self.from, other.from);
        fill(&mut self.to, other.to);
        fill(&mut self.tag, other.tag);
        fill(&mut self.digits, other.digits);
        fill(&mut self.state, other.state);
        fill(&mut self.recording_id, other.recording_id);
        fill(&mut self.status, other.status);
        self
    }
}
