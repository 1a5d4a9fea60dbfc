use async_trait::async_trait;
use thiserror::Error;

/// Errors a chatterbot backend can produce while thinking.
#[derive(Debug, Error)]
pub enum ChatBotError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed reply: {0}")]
    Malformed(String),
}

/// A conversation with one chatterbot, bound for the lifetime of the process.
///
/// Whatever state the backend needs to carry the conversation forward
/// (customer ids, form variables, cookies) lives inside the session.
#[async_trait]
pub trait ChatSession: Send {
    /// Send one utterance, get one reply.
    async fn think(&mut self, utterance: &str) -> Result<String, ChatBotError>;
}

#[async_trait]
impl<T: ChatSession + ?Sized> ChatSession for Box<T> {
    async fn think(&mut self, utterance: &str) -> Result<String, ChatBotError> {
        (**self).think(utterance).await
    }
}
