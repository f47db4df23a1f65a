//! Recording fake of the call-control provider for flow and route tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::server::catapult::{
    CallControl, CallInfo, CatapultError, CreateCall, CreateGather, MediaFile, PlayAudio, Recording, SipAuthToken,
    UpdateCall,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateCall(CreateCall),
    CreateBridge(Vec<String>),
    UpdateCall(String, UpdateCall),
    PlayAudio(String, PlayAudio),
    CreateGather(String, CreateGather),
    GetCall(String),
    GetCallRecordings(String),
    GetRecording(String),
    Hangup(String),
    DownloadMedia(String),
    CreateSipAuthToken(String),
}

#[derive(Default)]
struct FakeState {
    commands: Vec<Command>,
    next_call: u32,
    next_bridge: u32,
    call_states: HashMap<String, String>,
    call_recordings: HashMap<String, Vec<Recording>>,
    recordings: HashMap<String, Recording>,
    failing: bool,
}

/// Hands out ids `L1, L2, ...` for calls and `B1, B2, ...` for bridges.
/// Calls with no state set report `started`.
#[derive(Default)]
pub struct FakeCallControl {
    state: Mutex<FakeState>,
}

impl FakeCallControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.state.lock().unwrap().commands.clone()
    }

    /// Commands other than reads.
    pub fn writes(&self) -> Vec<Command> {
        self.commands()
            .into_iter()
            .filter(|command| {
                !matches!(
                    command,
                    Command::GetCall(_) | Command::GetCallRecordings(_) | Command::GetRecording(_)
                )
            })
            .collect()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().commands.clear();
    }

    pub fn set_call_state(&self, call_id: &str, state: &str) {
        self.state.lock().unwrap().call_states.insert(call_id.to_string(), state.to_string());
    }

    pub fn add_call_recording(&self, call_id: &str, recording: Recording) {
        self.state
            .lock()
            .unwrap()
            .call_recordings
            .entry(call_id.to_string())
            .or_default()
            .push(recording);
    }

    pub fn add_recording(&self, recording: Recording) {
        self.state.lock().unwrap().recordings.insert(recording.id.clone(), recording);
    }

    /// Serve `recording` under `recording_id`, whatever id its body carries.
    pub fn add_recording_at(&self, recording_id: &str, recording: Recording) {
        self.state.lock().unwrap().recordings.insert(recording_id.to_string(), recording);
    }

    /// Make every subsequent command fail with a 500.
    pub fn fail(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    pub fn hangups(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter_map(|command| match command {
                Command::Hangup(call_id) => Some(call_id),
                _ => None,
            })
            .collect()
    }

    pub fn created_calls(&self) -> Vec<CreateCall> {
        self.commands()
            .into_iter()
            .filter_map(|command| match command {
                Command::CreateCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    pub fn played(&self, call_id: &str) -> Vec<PlayAudio> {
        self.commands()
            .into_iter()
            .filter_map(|command| match command {
                Command::PlayAudio(id, audio) if id == call_id => Some(audio),
                _ => None,
            })
            .collect()
    }

    fn record(&self, command: Command) -> Result<(), CatapultError> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command);
        if state.failing {
            return Err(CatapultError::Api { status: 500, message: "provider unavailable".to_string() });
        }
        Ok(())
    }
}

#[async_trait]
impl CallControl for FakeCallControl {
    async fn create_call(&self, call: &CreateCall) -> Result<String, CatapultError> {
        self.record(Command::CreateCall(call.clone()))?;
        let mut state = self.state.lock().unwrap();
        state.next_call += 1;
        let call_id = format!("L{}", state.next_call);
        state.call_states.insert(call_id.clone(), "started".to_string());
        Ok(call_id)
    }

    async fn create_bridge(&self, call_ids: &[String], _bridge_audio: bool) -> Result<String, CatapultError> {
        self.record(Command::CreateBridge(call_ids.to_vec()))?;
        let mut state = self.state.lock().unwrap();
        state.next_bridge += 1;
        Ok(format!("B{}", state.next_bridge))
    }

    async fn update_call(&self, call_id: &str, update: &UpdateCall) -> Result<String, CatapultError> {
        self.record(Command::UpdateCall(call_id.to_string(), update.clone()))?;
        Ok(call_id.to_string())
    }

    async fn play_audio(&self, call_id: &str, audio: &PlayAudio) -> Result<(), CatapultError> {
        self.record(Command::PlayAudio(call_id.to_string(), audio.clone()))
    }

    async fn create_gather(&self, call_id: &str, gather: &CreateGather) -> Result<String, CatapultError> {
        self.record(Command::CreateGather(call_id.to_string(), gather.clone()))?;
        Ok(format!("G-{}", call_id))
    }

    async fn get_call(&self, call_id: &str) -> Result<CallInfo, CatapultError> {
        self.record(Command::GetCall(call_id.to_string()))?;
        let state = self.state.lock().unwrap();
        Ok(CallInfo {
            id: call_id.to_string(),
            state: state.call_states.get(call_id).cloned().unwrap_or_else(|| "started".to_string()),
            ..Default::default()
        })
    }

    async fn get_call_recordings(&self, call_id: &str) -> Result<Vec<Recording>, CatapultError> {
        self.record(Command::GetCallRecordings(call_id.to_string()))?;
        let state = self.state.lock().unwrap();
        Ok(state.call_recordings.get(call_id).cloned().unwrap_or_default())
    }

    async fn get_recording(&self, recording_id: &str) -> Result<Recording, CatapultError> {
        self.record(Command::GetRecording(recording_id.to_string()))?;
        let state = self.state.lock().unwrap();
        state
            .recordings
            .get(recording_id)
            .cloned()
            .ok_or_else(|| CatapultError::Api { status: 404, message: "no such recording".to_string() })
    }

    async fn hangup(&self, call_id: &str) -> Result<(), CatapultError> {
        self.record(Command::Hangup(call_id.to_string()))?;
        self.set_call_state(call_id, "completed");
        Ok(())
    }

    async fn download_media(&self, name: &str) -> Result<MediaFile, CatapultError> {
        self.record(Command::DownloadMedia(name.to_string()))?;
        Ok(MediaFile { content_type: "audio/wav".to_string(), data: name.as_bytes().to_vec() })
    }

    async fn create_sip_auth_token(&self, endpoint_id: &str) -> Result<SipAuthToken, CatapultError> {
        self.record(Command::CreateSipAuthToken(endpoint_id.to_string()))?;
        Ok(SipAuthToken { token: format!("token-{}", endpoint_id), expires: 3600 })
    }
}
