//! Chatterbot backends - third-party conversational agents behind a text-in/text-out session.

pub mod factory;
pub mod pandorabots;
pub mod session;
pub mod webservice;

pub use factory::{ChatBotFactory, Endpoints, Provider};
pub use session::{ChatBotError, ChatSession};
