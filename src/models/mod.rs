pub mod subscriber;
pub mod call;
pub mod voicemail;

pub use subscriber::*;
pub use call::*;
pub use voicemail::*;
