//! Backend selection. The provider is picked once at startup and never switched.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chatterbot::pandorabots::{self, PandorabotsSession};
use crate::chatterbot::session::{ChatBotError, ChatSession};
use crate::chatterbot::webservice::{self, WebServiceSession};

/// HTTP timeout for a single think round-trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The supported chatterbot backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Provider {
    /// Pandorabots needs the id of the hosted bot to talk to.
    Pandorabots { bot_id: String },
    Cleverbot,
    Jabberwacky,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Pandorabots { .. } => "Pandorabots",
            Provider::Cleverbot => "Cleverbot",
            Provider::Jabberwacky => "Jabberwacky",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Pandorabots { bot_id } => write!(f, "Pandorabots (bot {bot_id})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Service URLs, overridable from config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub pandorabots: String,
    pub cleverbot: String,
    pub jabberwacky: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            pandorabots: pandorabots::DEFAULT_URL.to_string(),
            cleverbot: webservice::CLEVERBOT_URL.to_string(),
            jabberwacky: webservice::JABBERWACKY_URL.to_string(),
        }
    }
}

/// Builds chat sessions for a provider.
pub struct ChatBotFactory {
    endpoints: Endpoints,
}

impl ChatBotFactory {
    pub fn new(endpoints: Endpoints) -> Self {
        Self { endpoints }
    }

    /// Open a new session with the given provider.
    ///
    /// Each session gets its own HTTP client so cookies never leak between
    /// conversations.
    pub fn create(&self, provider: &Provider) -> Result<Box<dyn ChatSession>, ChatBotError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .cookie_store(true)
            .build()?;

        let session: Box<dyn ChatSession> = match provider {
            Provider::Pandorabots { bot_id } => Box::new(PandorabotsSession::new(
                http,
                &self.endpoints.pandorabots,
                bot_id,
            )),
            Provider::Cleverbot => Box::new(WebServiceSession::new(
                http,
                &self.endpoints.cleverbot,
                webservice::CLEVERBOT_END_INDEX,
            )),
            Provider::Jabberwacky => Box::new(WebServiceSession::new(
                http,
                &self.endpoints.jabberwacky,
                webservice::JABBERWACKY_END_INDEX,
            )),
        };
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_json() {
        let p: Provider = serde_json::from_str(r#"{"kind": "pandorabots", "bot_id": "abc"}"#).unwrap();
        assert_eq!(p, Provider::Pandorabots { bot_id: "abc".to_string() });

        let p: Provider = serde_json::from_str(r#"{"kind": "jabberwacky"}"#).unwrap();
        assert_eq!(p, Provider::Jabberwacky);
    }

    #[test]
    fn test_provider_unknown_kind() {
        assert!(serde_json::from_str::<Provider>(r#"{"kind": "eliza"}"#).is_err());
    }

    #[test]
    fn test_provider_display() {
        assert_eq!(Provider::Cleverbot.to_string(), "Cleverbot");
        let p = Provider::Pandorabots { bot_id: "b0dafd24ee35a477".to_string() };
        assert_eq!(p.to_string(), "Pandorabots (bot b0dafd24ee35a477)");
    }

    #[test]
    fn test_endpoints_partial_override() {
        let e: Endpoints = serde_json::from_str(r#"{"cleverbot": "http://localhost:1/webservicemin"}"#).unwrap();
        assert_eq!(e.cleverbot, "http://localhost:1/webservicemin");
        assert_eq!(e.pandorabots, pandorabots::DEFAULT_URL);
    }

    #[tokio::test]
    async fn test_create_every_provider() {
        let factory = ChatBotFactory::new(Endpoints::default());
        for p in [
            Provider::Pandorabots { bot_id: "x".to_string() },
            Provider::Cleverbot,
            Provider::Jabberwacky,
        ] {
            assert!(factory.create(&p).is_ok(), "failed to create {p}");
        }
    }
}
