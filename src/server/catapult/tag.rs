//! Correlation state carried in the provider's single opaque tag field.

use std::fmt;

/// Voicemail capture steps that round-trip through playback tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoicemailStep {
    /// The leg was sent straight to voicemail for this subscriber.
    Redirect(i64),
    Greeting,
    Beep,
}

/// Greeting-management IVR steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvrStep {
    /// Tag of the IVR call itself.
    Call,
    /// Main menu gather.
    Menu,
    /// Gather that ends a greeting recording.
    Record,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CallTag {
    #[default]
    Idle,
    /// Second leg of a bridge, placed on behalf of `leg_id`.
    AnotherLeg { leg_id: String, bridge_id: String },
    Voicemail(VoicemailStep),
    GreetingIvr(IvrStep),
}

const ANOTHER_LEG: &str = "AnotherLeg";
const VOICEMAIL: &str = "VoiceMail";

impl CallTag {
    pub fn another_leg(leg_id: &str, bridge_id: &str) -> Self {
        CallTag::AnotherLeg { leg_id: leg_id.to_string(), bridge_id: bridge_id.to_string() }
    }

    /// Parse a wire tag. Anything unrecognized is `Idle`.
    pub fn parse(tag: &str) -> Self {
        let mut parts = tag.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(ANOTHER_LEG), Some(leg_id), Some(bridge_id)) if !leg_id.is_empty() && !bridge_id.is_empty() => {
                CallTag::another_leg(leg_id, bridge_id)
            }
            (Some(VOICEMAIL), Some(subscriber_id), None) => subscriber_id
                .parse()
                .map(|id| CallTag::Voicemail(VoicemailStep::Redirect(id)))
                .unwrap_or_default(),
            (Some("Greeting"), None, None) => CallTag::Voicemail(VoicemailStep::Greeting),
            (Some("Beep"), None, None) => CallTag::Voicemail(VoicemailStep::Beep),
            (Some("GreetingIvr"), None, None) => CallTag::GreetingIvr(IvrStep::Call),
            (Some("Menu"), None, None) => CallTag::GreetingIvr(IvrStep::Menu),
            (Some("Record"), None, None) => CallTag::GreetingIvr(IvrStep::Record),
            _ => CallTag::Idle,
        }
    }
}

impl fmt::Display for CallTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallTag::Idle => Ok(()),
            CallTag::AnotherLeg { leg_id, bridge_id } => write!(f, "{}:{}:{}", ANOTHER_LEG, leg_id, bridge_id),
            CallTag::Voicemail(VoicemailStep::Redirect(id)) => write!(f, "{}:{}", VOICEMAIL, id),
            CallTag::Voicemail(VoicemailStep::Greeting) => write!(f, "Greeting"),
            CallTag::Voicemail(VoicemailStep::Beep) => write!(f, "Beep"),
            CallTag::GreetingIvr(IvrStep::Call) => write!(f, "GreetingIvr"),
            CallTag::GreetingIvr(IvrStep::Menu) => write!(f, "Menu"),
            CallTag::GreetingIvr(IvrStep::Record) => write!(f, "Record"),
        }
    }
}
