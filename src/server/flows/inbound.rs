//! Bridging of answered calls to a second leg, and the no-answer transition

use std::time::Duration;

use super::watch::{NoAnswer, PendingAnswer};
use super::{CallOrchestrator, FlowError};
use crate::models::{NewActiveCall, Subscriber};
use crate::server::catapult::{CallControl, CallEvent, CallTag, CreateCall, PlayAudio};
use crate::server::db::{ActiveCallRegistry, SubscriberStore};

/// Where the second leg of a bridge goes.
struct BridgeTarget {
    subscriber: Subscriber,
    to: String,
    caller_id: String,
    on_no_answer: NoAnswer,
    timeout: Duration,
}

impl CallOrchestrator {
    /// `answer` on a leg with no flow tag: a new call for a subscriber, from
    /// a subscriber's device, or nothing we manage.
    pub(super) async fn on_answer(&self, event: &CallEvent) -> Result<(), FlowError> {
        if self.store.call(&event.call_id).await?.is_some() {
            tracing::debug!("Call {} already bridged, ignoring repeated answer", event.call_id);
            return Ok(());
        }

        if let Some(subscriber) = self.store.subscriber_by_phone_number(&event.to).await? {
            let caller_id = self.resolve_caller_id(&event.from).await?;
            let target = BridgeTarget {
                to: subscriber.sip_uri.clone(),
                caller_id,
                on_no_answer: NoAnswer::Voicemail { subscriber_id: subscriber.id },
                timeout: self.config.answer_timeout,
                subscriber,
            };
            return self.bridge(event, target).await;
        }

        if let Some(subscriber) = self.store.subscriber_by_sip_uri(&event.from).await? {
            let target = BridgeTarget {
                to: event.to.clone(),
                caller_id: subscriber.phone_number.clone(),
                on_no_answer: NoAnswer::HangUp,
                timeout: self.config.outbound_answer_timeout,
                subscriber,
            };
            return self.bridge(event, target).await;
        }

        tracing::debug!("Call {} from {} to {} is not for a subscriber", event.call_id, event.from, event.to);
        Ok(())
    }

    async fn bridge(&self, event: &CallEvent, target: BridgeTarget) -> Result<(), FlowError> {
        let origin_leg = event.call_id.clone();

        self.calls
            .play_audio(&origin_leg, &PlayAudio::file(&self.config.ringback_url).looped())
            .await?;

        let bridge_id = self.calls.create_bridge(&[origin_leg.clone()], true).await?;

        self.store
            .insert_call(&NewActiveCall {
                call_id: origin_leg.clone(),
                bridge_id: Some(bridge_id.clone()),
                subscriber_id: Some(target.subscriber.id),
                from_number: event.from.clone(),
                to_number: event.to.clone(),
            })
            .await?;

        let leg_id = self
            .calls
            .create_call(&CreateCall {
                from: target.caller_id,
                to: target.to.clone(),
                callback_url: self.config.webhook_url.clone(),
                bridge_id: Some(bridge_id.clone()),
                tag: Some(CallTag::another_leg(&origin_leg, &bridge_id).to_string()),
            })
            .await?;

        tracing::info!(
            "Bridged call {} into {}; ringing {} on leg {}",
            origin_leg,
            bridge_id,
            target.to,
            leg_id
        );

        let pending = PendingAnswer {
            leg_id,
            origin_leg,
            bridge_id,
            on_no_answer: target.on_no_answer,
        };
        let orchestrator = self.clone();
        self.watches.schedule(pending, target.timeout, move |pending| async move {
            if let Err(e) = orchestrator.on_answer_timeout(pending).await {
                tracing::error!("Answer timeout handling failed: {}", e);
            }
        });
        Ok(())
    }

    /// The second leg of a bridge answered. Without a pending watch the
    /// answer is either a repeat or arrived after the attempt was given up;
    /// neither may touch the originating leg, which may be in voicemail.
    pub(super) async fn on_another_leg_answer(
        &self,
        event: &CallEvent,
        origin_leg: &str,
        bridge_id: &str,
    ) -> Result<(), FlowError> {
        if self.watches.take(&event.call_id).is_none() {
            if self.store.call(&event.call_id).await?.is_some() {
                tracing::debug!("Leg {} already connected, ignoring repeated answer", event.call_id);
                return Ok(());
            }
            let leg = self.calls.get_call(&event.call_id).await?;
            if leg.call_state().is_terminated() {
                tracing::info!("Leg {} answered after its attempt was abandoned", event.call_id);
                return Ok(());
            }
        }

        self.store
            .insert_call(&NewActiveCall {
                call_id: event.call_id.clone(),
                bridge_id: Some(bridge_id.to_string()),
                subscriber_id: None,
                from_number: event.from.clone(),
                to_number: event.to.clone(),
            })
            .await?;

        self.calls.stop_audio(origin_leg).await?;
        tracing::info!("Leg {} answered, bridge {} connected", event.call_id, bridge_id);
        Ok(())
    }

    /// A `timeout` event on a second leg. Runs the no-answer transition
    /// unless the watch already did.
    pub(super) async fn on_second_leg_unanswered(&self, leg_id: &str) -> Result<(), FlowError> {
        match self.watches.take(leg_id) {
            Some(pending) => self.no_answer(pending).await,
            None => Ok(()),
        }
    }

    /// Timer callback. The leg may have answered without the answer webhook
    /// reaching us yet, so its state is checked first.
    async fn on_answer_timeout(&self, pending: PendingAnswer) -> Result<(), FlowError> {
        let leg = self.calls.get_call(&pending.leg_id).await?;
        if leg.call_state().is_active() {
            tracing::debug!("Leg {} is active, nothing to do", pending.leg_id);
            return Ok(());
        }
        self.no_answer(pending).await
    }

    pub(super) async fn no_answer(&self, pending: PendingAnswer) -> Result<(), FlowError> {
        tracing::info!("Leg {} was not answered", pending.leg_id);
        self.calls.stop_audio(&pending.origin_leg).await?;
        self.hangup_unless_terminated(&pending.leg_id).await?;

        match pending.on_no_answer {
            NoAnswer::Voicemail { subscriber_id } => {
                let Some(subscriber) = self.store.subscriber(subscriber_id).await? else {
                    tracing::warn!("Subscriber {} disappeared before voicemail", subscriber_id);
                    return Ok(());
                };
                self.play_greeting(&pending.origin_leg, &subscriber).await
            }
            NoAnswer::HangUp => {
                self.calls.hangup(&pending.origin_leg).await?;
                Ok(())
            }
        }
    }

    /// Hang up `call_id` unless the provider reports it already ended. When
    /// the state cannot be read the hangup is still attempted.
    pub(super) async fn hangup_unless_terminated(&self, call_id: &str) -> Result<(), FlowError> {
        match self.calls.get_call(call_id).await {
            Ok(call) if call.call_state().is_terminated() => {
                tracing::debug!("Call {} already {}", call_id, call.state);
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Could not read state of call {}: {}", call_id, e),
        }
        self.calls.hangup(call_id).await?;
        Ok(())
    }
}
