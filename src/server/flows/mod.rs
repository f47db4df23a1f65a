//! Call-event orchestration
//!
//! Every webhook is routed by event type and tag to one of the flows below.
//! Handlers re-derive what they need from the store on every event instead
//! of keeping per-call state in memory; the only in-process state is the
//! table of pending answer-timeout watches.

mod greeting;
mod hangup;
mod inbound;
mod voicemail;
pub mod watch;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::catapult::{CallControl, CallEvent, CallTag, CatapultError, EventType, IvrStep, VoicemailStep};
use super::db::{Store, StoreError};
use super::notifications::NotificationBus;
use watch::AnswerWatches;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Call control error: {0}")]
    Provider(#[from] CatapultError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Settings the flows need at run time.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Callback URL given to every call this service creates.
    pub webhook_url: String,
    /// How long a subscriber's device rings before the caller goes to voicemail.
    pub answer_timeout: Duration,
    /// How long an outbound attempt rings before it is abandoned.
    pub outbound_answer_timeout: Duration,
    pub ringback_url: String,
    pub beep_url: String,
}

#[derive(Clone)]
pub struct CallOrchestrator {
    calls: Arc<dyn CallControl>,
    store: Arc<dyn Store>,
    bus: NotificationBus,
    watches: AnswerWatches,
    config: Arc<FlowConfig>,
}

impl CallOrchestrator {
    pub fn new(
        calls: Arc<dyn CallControl>,
        store: Arc<dyn Store>,
        bus: NotificationBus,
        config: FlowConfig,
    ) -> Self {
        Self {
            calls,
            store,
            bus,
            watches: AnswerWatches::new(),
            config: Arc::new(config),
        }
    }

    pub fn calls(&self) -> &dyn CallControl {
        self.calls.as_ref()
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    #[cfg(test)]
    pub fn watches(&self) -> &AnswerWatches {
        &self.watches
    }

    /// Route one webhook event to its handler.
    pub async fn handle_event(&self, event: &CallEvent) -> Result<(), FlowError> {
        match event.kind() {
            EventType::Answer => match event.call_tag() {
                // Must win over the inbound matching below.
                CallTag::AnotherLeg { leg_id, bridge_id } => {
                    self.on_another_leg_answer(event, &leg_id, &bridge_id).await
                }
                CallTag::GreetingIvr(_) => self.on_greeting_call_answer(event).await,
                CallTag::Voicemail(VoicemailStep::Redirect(subscriber_id)) => {
                    self.on_voicemail_redirect(event, subscriber_id).await
                }
                _ => self.on_answer(event).await,
            },
            EventType::Playback | EventType::Speak => {
                if event.status != "done" {
                    return Ok(());
                }
                match event.call_tag() {
                    CallTag::Voicemail(VoicemailStep::Greeting) => self.play_beep(&event.call_id).await,
                    CallTag::Voicemail(VoicemailStep::Beep) => self.start_recording(&event.call_id).await,
                    _ => Ok(()),
                }
            }
            EventType::Gather => {
                if event.state != "completed" {
                    return Ok(());
                }
                match event.call_tag() {
                    CallTag::GreetingIvr(IvrStep::Menu) => self.on_menu_choice(event).await,
                    CallTag::GreetingIvr(IvrStep::Record) => self.on_greeting_recording_ended(event).await,
                    _ => Ok(()),
                }
            }
            EventType::Recording => {
                if event.state != "complete" {
                    return Ok(());
                }
                self.on_recording_complete(event).await
            }
            EventType::Timeout => match event.call_tag() {
                CallTag::AnotherLeg { .. } => self.on_second_leg_unanswered(&event.call_id).await,
                _ => Ok(()),
            },
            EventType::Hangup => self.on_hangup(event).await,
            EventType::Unknown => {
                tracing::debug!("Ignoring event {:?} for call {}", event.event_type, event.call_id);
                Ok(())
            }
        }
    }

    /// Caller id shown for `from`: a subscriber's SIP URI is replaced by
    /// that subscriber's phone number.
    async fn resolve_caller_id(&self, from: &str) -> Result<String, FlowError> {
        if from.starts_with("sip:") {
            if let Some(caller) = self.store.subscriber_by_sip_uri(from).await? {
                return Ok(caller.phone_number);
            }
        }
        Ok(from.to_string())
    }
}
