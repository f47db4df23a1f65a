//! Voicemail capture: greeting, beep, recording and message persistence

use chrono::Utc;

use super::{CallOrchestrator, FlowError};
use crate::models::{ActiveCall, NewActiveCall, NewVoicemailMessage, Subscriber};
use crate::server::catapult::{CallControl, CallEvent, CallTag, PlayAudio, Recording, UpdateCall, VoicemailStep};
use crate::server::db::{ActiveCallRegistry, SubscriberStore};

impl CallOrchestrator {
    /// Play the subscriber's greeting, or the default sentence, tagged so
    /// its completion starts the beep.
    pub(super) async fn play_greeting(&self, call_id: &str, subscriber: &Subscriber) -> Result<(), FlowError> {
        let audio = match subscriber.greeting() {
            Some(url) => PlayAudio::file(url),
            None => PlayAudio::sentence(&subscriber.default_greeting()),
        };
        self.calls
            .play_audio(call_id, &audio.tagged(&CallTag::Voicemail(VoicemailStep::Greeting)))
            .await?;
        tracing::info!("Playing voicemail greeting of subscriber {} on {}", subscriber.id, call_id);
        Ok(())
    }

    pub(super) async fn play_beep(&self, call_id: &str) -> Result<(), FlowError> {
        let beep = PlayAudio::file(&self.config.beep_url).tagged(&CallTag::Voicemail(VoicemailStep::Beep));
        self.calls.play_audio(call_id, &beep).await?;
        Ok(())
    }

    pub(super) async fn start_recording(&self, call_id: &str) -> Result<(), FlowError> {
        self.calls.update_call(call_id, &UpdateCall::recording(true)).await?;
        tracing::info!("Recording started on {}", call_id);
        Ok(())
    }

    /// `answer` on a leg tagged for a subscriber's voicemail: skip the
    /// bridge and go straight to the greeting.
    pub(super) async fn on_voicemail_redirect(&self, event: &CallEvent, subscriber_id: i64) -> Result<(), FlowError> {
        if self.store.call(&event.call_id).await?.is_some() {
            tracing::debug!("Call {} already in voicemail, ignoring repeated answer", event.call_id);
            return Ok(());
        }

        let Some(subscriber) = self.store.subscriber(subscriber_id).await? else {
            tracing::debug!("Voicemail redirect for unknown subscriber {}", subscriber_id);
            return Ok(());
        };

        self.store
            .insert_call(&NewActiveCall {
                call_id: event.call_id.clone(),
                bridge_id: None,
                subscriber_id: Some(subscriber.id),
                from_number: event.from.clone(),
                to_number: event.to.clone(),
            })
            .await?;

        self.play_greeting(&event.call_id, &subscriber).await
    }

    /// `recording` completed on a leg. Greeting calls store a new greeting,
    /// everything else owned by a subscriber becomes a voicemail message.
    pub(super) async fn on_recording_complete(&self, event: &CallEvent) -> Result<(), FlowError> {
        let Some(record) = self.store.call(&event.call_id).await? else {
            tracing::debug!("Recording on unmanaged call {}", event.call_id);
            return Ok(());
        };
        let Some(subscriber_id) = record.subscriber_id else {
            return Ok(());
        };
        let Some(subscriber) = self.store.subscriber(subscriber_id).await? else {
            return Ok(());
        };

        if matches!(event.call_tag(), CallTag::GreetingIvr(_)) || is_greeting_call(&record, &subscriber) {
            return self.save_greeting(event, &subscriber).await;
        }

        if event.recording_id.is_empty() {
            return self.finalize_voicemail(&record, subscriber.id).await;
        }
        let recording = self.calls.get_recording(&event.recording_id).await?;
        self.save_voicemail(&record, subscriber.id, &recording, &event.recording_id).await
    }

    /// Store the first recording of the leg, if any, as a voicemail message.
    pub(super) async fn finalize_voicemail(&self, record: &ActiveCall, subscriber_id: i64) -> Result<(), FlowError> {
        let recordings = self.calls.get_call_recordings(&record.call_id).await?;
        match recordings.first() {
            Some(recording) => {
                let recording_id = if recording.id.is_empty() { &recording.media } else { &recording.id };
                self.save_voicemail(record, subscriber_id, recording, recording_id).await
            }
            None => {
                tracing::debug!("No recording on call {}, no voicemail", record.call_id);
                Ok(())
            }
        }
    }

    /// Persist a message for `recording` and publish it. Stores at most one
    /// message per `recording_id`; repeats are ignored.
    async fn save_voicemail(
        &self,
        record: &ActiveCall,
        subscriber_id: i64,
        recording: &Recording,
        recording_id: &str,
    ) -> Result<(), FlowError> {
        if recording.media.is_empty() {
            tracing::warn!("Recording {} on call {} has no media", recording_id, record.call_id);
            return Ok(());
        }

        let start_time = recording.started_at().unwrap_or_else(Utc::now);
        let message = NewVoicemailMessage {
            subscriber_id,
            recording_id: Some(recording_id.to_string()),
            media_url: recording.media.clone(),
            start_time,
            end_time: recording.ended_at().unwrap_or(start_time),
            from_number: self.resolve_caller_id(&record.from_number).await?,
        };

        match self.store.insert_message(&message).await? {
            Some(stored) => {
                let delivered = self.bus.publish(subscriber_id, &stored);
                tracing::info!(
                    "Saved voicemail {} for subscriber {} ({} live listeners)",
                    stored.id,
                    subscriber_id,
                    delivered
                );
            }
            None => tracing::debug!("Recording {} already saved", recording_id),
        }
        Ok(())
    }
}

/// A subscriber calling their own device from their own number is the
/// greeting IVR, never a voicemail.
pub(super) fn is_greeting_call(record: &ActiveCall, subscriber: &Subscriber) -> bool {
    record.from_number == subscriber.phone_number && record.to_number == subscriber.sip_uri
}
