//! Relay loops - pass inbound message text to a chatterbot and send the reply back.

pub mod im;
pub mod message;
pub mod normalize;
pub mod seen;
pub mod sms;


use thiserror::Error;

use crate::chatterbot::ChatBotError;
use crate::transport::TransportError;

pub use im::{Exit, ImEvent, ImRelay, ImRelayConfig, ImTransport};
pub use message::{Correspondent, InboundMessage, MessageId, MessageKind, SmsMessage};
pub use normalize::ReplyNormalization;
pub use seen::SeenPolicy;
pub use sms::{SmsInbox, SmsRelay, SmsRelayConfig};

/// A failure that stops a relay. Nothing is retried at this level.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("chatterbot: {0}")]
    ChatBot(#[from] ChatBotError),
}
