//! Catapult call-control API client
//!
//! Every flow talks to the provider through the [`CallControl`] trait so the
//! state machines can run against a fake in tests.

pub mod event;
pub mod tag;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::CallState;

pub use event::{CallEvent, EventType};
pub use tag::{CallTag, IvrStep, VoicemailStep};

#[derive(Error, Debug)]
pub enum CatapultError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Missing Location header in response to {0}")]
    MissingLocation(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// Commands the flows issue to the call-control provider.
#[async_trait]
pub trait CallControl: Send + Sync {
    /// Place a new call leg, returning its id.
    async fn create_call(&self, call: &CreateCall) -> Result<String, CatapultError>;

    /// Create a bridge holding the given legs, returning its id.
    async fn create_bridge(&self, call_ids: &[String], bridge_audio: bool) -> Result<String, CatapultError>;

    /// Update a leg. Returns the id of the resulting leg (a new one for transfers).
    async fn update_call(&self, call_id: &str, update: &UpdateCall) -> Result<String, CatapultError>;

    async fn play_audio(&self, call_id: &str, audio: &PlayAudio) -> Result<(), CatapultError>;

    async fn create_gather(&self, call_id: &str, gather: &CreateGather) -> Result<String, CatapultError>;

    async fn get_call(&self, call_id: &str) -> Result<CallInfo, CatapultError>;

    async fn get_call_recordings(&self, call_id: &str) -> Result<Vec<Recording>, CatapultError>;

    async fn get_recording(&self, recording_id: &str) -> Result<Recording, CatapultError>;

    /// Hang up a leg. Hanging up a leg that is already gone is not an error.
    async fn hangup(&self, call_id: &str) -> Result<(), CatapultError>;

    async fn download_media(&self, name: &str) -> Result<MediaFile, CatapultError>;

    /// Short-lived token the subscriber's WebRTC phone registers with.
    async fn create_sip_auth_token(&self, endpoint_id: &str) -> Result<SipAuthToken, CatapultError>;

    /// Stop whatever audio is playing on the leg.
    async fn stop_audio(&self, call_id: &str) -> Result<(), CatapultError> {
        self.play_audio(call_id, &PlayAudio::stop()).await
    }
}

#[derive(Clone)]
pub struct CatapultClient {
    client: Client,
    api_token: String,
    api_secret: String,
    base_url: String,
    domain_id: String,
}

impl CatapultClient {
    pub fn new(api_url: &str, user_id: &str, api_token: String, api_secret: String) -> Self {
        Self {
            client: Client::new(),
            api_token,
            api_secret,
            base_url: format!("{}/users/{}", api_url.trim_end_matches('/'), user_id),
            domain_id: String::new(),
        }
    }

    /// SIP domain holding the subscribers' endpoints.
    pub fn with_domain(mut self, domain_id: &str) -> Self {
        self.domain_id = domain_id.to_string();
        self
    }

    async fn send<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response, CatapultError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .basic_auth(&self.api_token, Some(&self.api_secret))
            .json(body)
            .send()
            .await?;
        check(response).await
    }

    /// POST and read the id of the created resource from the Location header.
    async fn create<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<String, CatapultError> {
        let response = self.send(path, body).await?;
        location_id(&response).ok_or_else(|| CatapultError::MissingLocation(path.to_string()))
    }

    async fn get<R: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<R, CatapultError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .basic_auth(&self.api_token, Some(&self.api_secret))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

async fn check(response: Response) -> Result<Response, CatapultError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(CatapultError::Api { status: status.as_u16(), message });
    }
    Ok(response)
}

fn location_id(response: &Response) -> Option<String> {
    let location = response.headers().get(reqwest::header::LOCATION)?.to_str().ok()?;
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl CallControl for CatapultClient {
    async fn create_call(&self, call: &CreateCall) -> Result<String, CatapultError> {
        self.create("/calls", call).await
    }

    async fn create_bridge(&self, call_ids: &[String], bridge_audio: bool) -> Result<String, CatapultError> {
        let request = BridgeRequest { call_ids, bridge_audio };
        self.create("/bridges", &request).await
    }

    async fn update_call(&self, call_id: &str, update: &UpdateCall) -> Result<String, CatapultError> {
        let response = self.send(&format!("/calls/{}", call_id), update).await?;
        // Transfers answer with the new leg in Location; plain updates keep the id.
        Ok(location_id(&response).unwrap_or_else(|| call_id.to_string()))
    }

    async fn play_audio(&self, call_id: &str, audio: &PlayAudio) -> Result<(), CatapultError> {
        self.send(&format!("/calls/{}/audio", call_id), audio).await?;
        Ok(())
    }

    async fn create_gather(&self, call_id: &str, gather: &CreateGather) -> Result<String, CatapultError> {
        self.create(&format!("/calls/{}/gather", call_id), gather).await
    }

    async fn get_call(&self, call_id: &str) -> Result<CallInfo, CatapultError> {
        self.get(&format!("/calls/{}", call_id)).await
    }

    async fn get_call_recordings(&self, call_id: &str) -> Result<Vec<Recording>, CatapultError> {
        self.get(&format!("/calls/{}/recordings", call_id)).await
    }

    async fn get_recording(&self, recording_id: &str) -> Result<Recording, CatapultError> {
        self.get(&format!("/recordings/{}", recording_id)).await
    }

    async fn hangup(&self, call_id: &str) -> Result<(), CatapultError> {
        match self.update_call(call_id, &UpdateCall::state("completed")).await {
            Ok(_) => Ok(()),
            // The provider refuses to complete a leg that already ended.
            Err(CatapultError::Api { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() || status == StatusCode::CONFLICT.as_u16() =>
            {
                tracing::debug!("Call {} already ended", call_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn download_media(&self, name: &str) -> Result<MediaFile, CatapultError> {
        let response = self
            .client
            .get(format!("{}/media/{}", self.base_url, name))
            .basic_auth(&self.api_token, Some(&self.api_secret))
            .send()
            .await?;
        let response = check(response).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = response.bytes().await?.to_vec();
        Ok(MediaFile { content_type, data })
    }

    async fn create_sip_auth_token(&self, endpoint_id: &str) -> Result<SipAuthToken, CatapultError> {
        if self.domain_id.is_empty() {
            return Err(CatapultError::NotConfigured("CATAPULT_DOMAIN_ID"));
        }
        let path = format!("/domains/{}/endpoints/{}/tokens", self.domain_id, endpoint_id);
        let response = self.send(&path, &serde_json::json!({})).await?;
        Ok(response.json().await?)
    }
}

// Request/Response types

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCall {
    pub from: String,
    pub to: String,
    pub callback_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_caller_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl UpdateCall {
    pub fn state(state: &str) -> Self {
        Self { state: Some(state.to_string()), ..Default::default() }
    }

    pub fn recording(enabled: bool) -> Self {
        Self { recording_enabled: Some(enabled), ..Default::default() }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BridgeRequest<'a> {
    call_ids: &'a [String],
    bridge_audio: bool,
}

/// Audio file or spoken sentence played to a leg.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayAudio {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub loop_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl PlayAudio {
    pub fn file(url: &str) -> Self {
        Self { file_url: Some(url.to_string()), ..Default::default() }
    }

    pub fn sentence(text: &str) -> Self {
        Self {
            sentence: Some(text.to_string()),
            gender: Some("female".to_string()),
            locale: Some("en_US".to_string()),
            voice: Some("julie".to_string()),
            ..Default::default()
        }
    }

    /// An empty file URL stops the current playback.
    pub fn stop() -> Self {
        Self::file("")
    }

    pub fn looped(mut self) -> Self {
        self.loop_enabled = true;
        self
    }

    pub fn tagged(mut self, tag: &CallTag) -> Self {
        self.tag = Some(tag.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGather {
    pub max_digits: u32,
    pub inter_digit_timeout: u32,
    pub prompt: GatherPrompt,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatherPrompt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

impl CreateGather {
    /// Single-digit gather spoken with the default voice.
    pub fn spoken(sentence: &str, tag: &CallTag) -> Self {
        Self {
            max_digits: 1,
            inter_digit_timeout: 60,
            prompt: GatherPrompt {
                sentence: Some(sentence.to_string()),
                gender: Some("female".to_string()),
                voice: Some("julie".to_string()),
                file_url: None,
            },
            tag: Some(tag.to_string()),
        }
    }

    /// Single-digit gather prompted by an audio file.
    pub fn played(file_url: &str, tag: &CallTag) -> Self {
        Self {
            max_digits: 1,
            inter_digit_timeout: 60,
            prompt: GatherPrompt { file_url: Some(file_url.to_string()), ..Default::default() },
            tag: Some(tag.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallInfo {
    pub id: String,
    pub state: String,
    pub from: String,
    pub to: String,
    pub tag: Option<String>,
}

impl CallInfo {
    pub fn call_state(&self) -> CallState {
        CallState::parse(&self.state)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recording {
    pub id: String,
    pub media: String,
    pub start_time: String,
    pub end_time: String,
    pub state: String,
}

impl Recording {
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        parse_time(&self.start_time)
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        parse_time(&self.end_time)
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SipAuthToken {
    pub token: String,
    /// Lifetime in seconds.
    pub expires: i64,
}

#[derive(Debug, Clone)]
pub struct MediaFile {
    pub content_type: String,
    pub data: Vec<u8>,
}
