//! Call-control webhook endpoint

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
};

use crate::server::catapult::CallEvent;
use crate::server::AppState;

/// Every delivery is acknowledged with an empty 200, whatever happened,
/// since any other status makes the provider retry.
pub async fn handle_call_event(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> StatusCode {
    let event = CallEvent::from_json(&body).merge(CallEvent::from_pairs(&params));
    tracing::info!("Received call event: {} for {}", event.event_type, event.call_id);

    if let Err(e) = state.orchestrator.handle_event(&event).await {
        tracing::error!(
            "Failed to handle {} event for call {}: {}",
            event.event_type,
            event.call_id,
            e
        );
    }

    StatusCode::OK
}
