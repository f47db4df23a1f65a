//! Hangup handling: bridge teardown and voicemail finalization

use std::collections::HashSet;

use super::voicemail::is_greeting_call;
use super::{CallOrchestrator, FlowError};
use crate::models::ActiveCall;
use crate::server::catapult::{CallEvent, CallTag};
use crate::server::db::{ActiveCallRegistry, SubscriberStore};

impl CallOrchestrator {
    pub(super) async fn on_hangup(&self, event: &CallEvent) -> Result<(), FlowError> {
        // A second leg that hangs up before answering was declined.
        if let CallTag::AnotherLeg { .. } = event.call_tag() {
            if let Some(pending) = self.watches.take(&event.call_id) {
                tracing::info!("Leg {} declined", event.call_id);
                return self.no_answer(pending).await;
            }
        }

        // The caller gave up while the second leg was still ringing.
        if let Some(pending) = self.watches.take_by_origin(&event.call_id) {
            tracing::info!("Call {} hung up while {} was ringing", event.call_id, pending.leg_id);
            if let Err(e) = self.hangup_unless_terminated(&pending.leg_id).await {
                tracing::warn!("Failed to hang up ringing leg {}: {}", pending.leg_id, e);
            }
        }

        let Some(record) = self.store.call(&event.call_id).await? else {
            tracing::debug!("Hangup of unmanaged call {}", event.call_id);
            return Ok(());
        };

        let teardown = self.tear_down_bridge(&record).await;
        let finalize = self.finalize_after_hangup(&record).await;
        teardown.and(finalize)
    }

    /// Hang up every other leg sharing the bridge, each at most once. Keeps
    /// going past failures and reports the first one.
    async fn tear_down_bridge(&self, record: &ActiveCall) -> Result<(), FlowError> {
        let Some(bridge_id) = record.bridge_id.as_deref() else {
            return Ok(());
        };

        let mut seen = HashSet::new();
        let siblings: Vec<String> = self
            .store
            .calls_in_bridge(bridge_id)
            .await?
            .into_iter()
            .map(|call| call.call_id)
            .filter(|call_id| *call_id != record.call_id && seen.insert(call_id.clone()))
            .collect();

        let mut first_error = None;
        for call_id in &siblings {
            tracing::info!("Tearing down leg {} of bridge {}", call_id, bridge_id);
            if let Err(e) = self.hangup_unless_terminated(call_id).await {
                tracing::warn!("Failed to hang up leg {}: {}", call_id, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn finalize_after_hangup(&self, record: &ActiveCall) -> Result<(), FlowError> {
        let Some(subscriber_id) = record.subscriber_id else {
            return Ok(());
        };
        let Some(subscriber) = self.store.subscriber(subscriber_id).await? else {
            return Ok(());
        };
        if is_greeting_call(record, &subscriber) {
            return Ok(());
        }
        self.finalize_voicemail(record, subscriber.id).await
    }
}
