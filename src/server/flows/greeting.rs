//! Greeting-management IVR
//!
//! A subscriber calls their own device and picks from a one-digit menu:
//! listen to the current greeting, record a new one, or reset to default.

use super::voicemail::is_greeting_call;
use super::{CallOrchestrator, FlowError};
use crate::models::{NewActiveCall, Subscriber};
use crate::server::catapult::{CallControl, CallEvent, CallTag, CreateCall, CreateGather, IvrStep, PlayAudio, UpdateCall};
use crate::server::db::{ActiveCallRegistry, SubscriberStore};

const MENU: &str = "Press 1 to listen to your current greeting. \
    Press 2 to record new greeting. Press 3 to set greeting to default.";
const RECORD_PROMPT: &str = "Say your greeting after beep. Press any key to complete recording.";
const RESET_CONFIRMATION: &str = "Your greeting has been set to default.";
const SAVED_CONFIRMATION: &str = "Your greeting has been saved.";

impl CallOrchestrator {
    /// Call the subscriber's device from their own number to start the IVR.
    pub async fn place_greeting_call(&self, subscriber: &Subscriber) -> Result<String, FlowError> {
        let call_id = self
            .calls
            .create_call(&CreateCall {
                from: subscriber.phone_number.clone(),
                to: subscriber.sip_uri.clone(),
                callback_url: self.config.webhook_url.clone(),
                bridge_id: None,
                tag: Some(CallTag::GreetingIvr(IvrStep::Call).to_string()),
            })
            .await?;

        self.store
            .insert_call(&NewActiveCall {
                call_id: call_id.clone(),
                bridge_id: None,
                subscriber_id: Some(subscriber.id),
                from_number: subscriber.phone_number.clone(),
                to_number: subscriber.sip_uri.clone(),
            })
            .await?;

        tracing::info!("Placed greeting call {} for subscriber {}", call_id, subscriber.id);
        Ok(call_id)
    }

    pub(super) async fn on_greeting_call_answer(&self, event: &CallEvent) -> Result<(), FlowError> {
        self.present_menu(&event.call_id).await
    }

    async fn present_menu(&self, call_id: &str) -> Result<(), FlowError> {
        let gather = CreateGather::spoken(MENU, &CallTag::GreetingIvr(IvrStep::Menu));
        self.calls.create_gather(call_id, &gather).await?;
        Ok(())
    }

    pub(super) async fn on_menu_choice(&self, event: &CallEvent) -> Result<(), FlowError> {
        let Some(subscriber) = self.greeting_call_owner(&event.call_id).await? else {
            tracing::debug!("Menu choice on unmanaged call {}", event.call_id);
            return Ok(());
        };
        let call_id = event.call_id.as_str();

        match event.digits.as_str() {
            "1" => {
                let audio = match subscriber.greeting() {
                    Some(url) => PlayAudio::file(url),
                    None => PlayAudio::sentence(&subscriber.default_greeting()),
                };
                self.calls.play_audio(call_id, &audio).await?;
                self.present_menu(call_id).await
            }
            "2" => {
                self.calls.play_audio(call_id, &PlayAudio::sentence(RECORD_PROMPT)).await?;
                let gather = CreateGather::played(&self.config.beep_url, &CallTag::GreetingIvr(IvrStep::Record));
                self.calls.create_gather(call_id, &gather).await?;
                self.calls.update_call(call_id, &UpdateCall::recording(true)).await?;
                Ok(())
            }
            "3" => {
                self.store.set_greeting(subscriber.id, None).await?;
                tracing::info!("Greeting of subscriber {} reset to default", subscriber.id);
                self.calls.play_audio(call_id, &PlayAudio::sentence(RESET_CONFIRMATION)).await?;
                self.present_menu(call_id).await
            }
            _ => self.present_menu(call_id).await,
        }
    }

    /// Any key ends a greeting recording.
    pub(super) async fn on_greeting_recording_ended(&self, event: &CallEvent) -> Result<(), FlowError> {
        self.calls.update_call(&event.call_id, &UpdateCall::recording(false)).await?;
        Ok(())
    }

    /// Store the finished recording as the subscriber's greeting and, if the
    /// caller is still on the line, confirm and return to the menu.
    pub(super) async fn save_greeting(&self, event: &CallEvent, subscriber: &Subscriber) -> Result<(), FlowError> {
        let recording = if event.recording_id.is_empty() {
            match self.calls.get_call_recordings(&event.call_id).await?.into_iter().next() {
                Some(recording) => recording,
                None => return Ok(()),
            }
        } else {
            self.calls.get_recording(&event.recording_id).await?
        };

        self.store.set_greeting(subscriber.id, Some(&recording.media)).await?;
        tracing::info!("Saved new greeting for subscriber {}", subscriber.id);

        let call = self.calls.get_call(&event.call_id).await?;
        if call.call_state().is_active() {
            self.calls.play_audio(&event.call_id, &PlayAudio::sentence(SAVED_CONFIRMATION)).await?;
            self.present_menu(&event.call_id).await?;
        }
        Ok(())
    }

    async fn greeting_call_owner(&self, call_id: &str) -> Result<Option<Subscriber>, FlowError> {
        let Some(record) = self.store.call(call_id).await? else {
            return Ok(None);
        };
        let Some(subscriber_id) = record.subscriber_id else {
            return Ok(None);
        };
        let subscriber = self.store.subscriber(subscriber_id).await?;
        Ok(subscriber.filter(|subscriber| is_greeting_call(&record, subscriber)))
    }
}
