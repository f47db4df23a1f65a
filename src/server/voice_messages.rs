//! Subscriber-facing voicemail and greeting API handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::{DateTime, Duration, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::models::VoicemailMessage;
use crate::server::{auth::AuthSubscriber, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GreetingCallResponse {
    pub call_id: String,
}

/// Ring the subscriber's device with the greeting-management menu
pub async fn record_greeting(
    State(state): State<Arc<AppState>>,
    AuthSubscriber(subscriber): AuthSubscriber,
) -> Result<Json<GreetingCallResponse>, StatusCode> {
    let call_id = state
        .orchestrator
        .place_greeting_call(&subscriber)
        .await
        .map_err(|e| {
            tracing::error!("Failed to place greeting call for subscriber {}: {}", subscriber.id, e);
            StatusCode::BAD_GATEWAY
        })?;

    Ok(Json(GreetingCallResponse { call_id }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SipDataResponse {
    pub phone_number: String,
    pub sip_uri: String,
    /// Shown to the subscriber for desk phones; the WebRTC phone uses the token.
    pub sip_password: String,
    pub token: String,
    pub expire: DateTime<Utc>,
}

/// SIP account details plus a fresh registration token for the browser phone
pub async fn sip_data(
    State(state): State<Arc<AppState>>,
    AuthSubscriber(subscriber): AuthSubscriber,
) -> Result<Json<SipDataResponse>, StatusCode> {
    let Some(endpoint_id) = subscriber.endpoint_id.as_deref() else {
        tracing::warn!("Subscriber {} has no SIP endpoint", subscriber.id);
        return Err(StatusCode::NOT_FOUND);
    };

    let token = state
        .orchestrator
        .calls()
        .create_sip_auth_token(endpoint_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create SIP token for subscriber {}: {}", subscriber.id, e);
            StatusCode::BAD_GATEWAY
        })?;

    Ok(Json(SipDataResponse {
        expire: Utc::now() + Duration::seconds(token.expires),
        token: token.token,
        phone_number: subscriber.phone_number,
        sip_uri: subscriber.sip_uri,
        sip_password: subscriber.sip_password,
    }))
}

/// List the subscriber's messages, newest first
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    AuthSubscriber(subscriber): AuthSubscriber,
) -> Result<Json<Vec<VoicemailMessage>>, StatusCode> {
    state
        .orchestrator
        .store()
        .messages(subscriber.id)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!("Failed to list messages of subscriber {}: {}", subscriber.id, e);
            StatusCode::BAD_GATEWAY
        })
}

/// Proxy a message's audio from the provider
pub async fn download_message(
    State(state): State<Arc<AppState>>,
    AuthSubscriber(subscriber): AuthSubscriber,
    Path(id): Path<i64>,
) -> Result<Response, StatusCode> {
    let message = state
        .orchestrator
        .store()
        .message(subscriber.id, id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get message {}: {}", id, e);
            StatusCode::BAD_GATEWAY
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let media = state
        .orchestrator
        .calls()
        .download_media(message.media_name())
        .await
        .map_err(|e| {
            tracing::error!("Failed to download media of message {}: {}", id, e);
            StatusCode::BAD_GATEWAY
        })?;

    Ok(([(header::CONTENT_TYPE, media.content_type)], media.data).into_response())
}

/// Delete a message. A message that is already gone is a 404.
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    AuthSubscriber(subscriber): AuthSubscriber,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let deleted = state
        .orchestrator
        .store()
        .delete_message(subscriber.id, id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete message {}: {}", id, e);
            StatusCode::BAD_GATEWAY
        })?;

    if !deleted {
        return Err(StatusCode::NOT_FOUND);
    }
    tracing::info!("Subscriber {} deleted message {}", subscriber.id, id);
    Ok(StatusCode::OK)
}

/// Server-sent events carrying each new message as it is saved
pub async fn stream_messages(
    State(state): State<Arc<AppState>>,
    AuthSubscriber(subscriber): AuthSubscriber,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let bus = state.orchestrator.bus();
    let subscription = bus.subscribe(subscriber.id);
    tracing::info!(
        "Subscriber {} opened message stream {} ({} open)",
        subscriber.id,
        subscription.id(),
        bus.subscriber_count(subscriber.id)
    );

    let events = subscription.map(|message| Event::default().event("message").json_data(&message));
    Sse::new(events).keep_alive(KeepAlive::default())
}
