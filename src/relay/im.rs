//! Event-driven relay over an instant-messaging connection.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::chatterbot::ChatSession;
use crate::relay::RelayError;
use crate::relay::message::{Correspondent, InboundMessage, preview};
use crate::relay::normalize::ReplyNormalization;
use crate::transport::TransportError;

/// A message body that shuts the relay down instead of being answered.
pub const CLOSE_COMMAND: &str = "close";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImEvent {
    /// The session is up; emitted once after connecting.
    SessionStart,
    Message(InboundMessage),
}

/// A connected IM account delivering one event at a time.
#[async_trait]
pub trait ImTransport: Send {
    /// Ask the transport to reconnect on its own when the link drops.
    fn set_auto_reconnect(&mut self, enabled: bool);
    async fn connect(&mut self) -> Result<(), TransportError>;
    async fn announce_presence(&mut self) -> Result<(), TransportError>;
    async fn roster(&mut self) -> Result<Vec<Correspondent>, TransportError>;
    /// Next event, or `None` once the transport has shut down.
    async fn next_event(&mut self) -> Result<Option<ImEvent>, TransportError>;
    async fn reply(&mut self, to: &InboundMessage, text: &str) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImRelayConfig {
    pub auto_reconnect: bool,
    pub normalization: ReplyNormalization,
}

impl Default for ImRelayConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            normalization: ReplyNormalization::None,
        }
    }
}

/// Why the relay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Someone sent the close command.
    CloseRequested,
    /// The transport has no more events.
    Disconnected,
}

/// What handling one event amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    SessionStarted,
    Ignored,
    Replied,
    Close,
}

/// Answers conversational messages as they arrive. Holds no per-message state.
pub struct ImRelay<T, C> {
    transport: T,
    session: C,
    config: ImRelayConfig,
}

impl<T: ImTransport, C: ChatSession> ImRelay<T, C> {
    pub fn new(transport: T, session: C, config: ImRelayConfig) -> Self {
        Self {
            transport,
            session,
            config,
        }
    }

    /// Connect and handle events until close, disconnect, or a fatal error.
    pub async fn run(&mut self) -> Result<Exit, RelayError> {
        self.transport.set_auto_reconnect(self.config.auto_reconnect);
        self.transport.connect().await?;

        while let Some(event) = self.transport.next_event().await? {
            if self.handle_event(event).await? == Handled::Close {
                return Ok(Exit::CloseRequested);
            }
        }

        info!("Transport closed");
        Ok(Exit::Disconnected)
    }

    /// Handle one event to completion.
    pub async fn handle_event(&mut self, event: ImEvent) -> Result<Handled, RelayError> {
        match event {
            ImEvent::SessionStart => {
                self.on_session_start().await;
                Ok(Handled::SessionStarted)
            }
            ImEvent::Message(msg) => self.on_message(msg).await,
        }
    }

    /// Presence and roster are best-effort; failures don't end the session.
    async fn on_session_start(&mut self) {
        info!("🟢 Session started");

        if let Err(e) = self.transport.announce_presence().await {
            warn!("Failed to announce presence: {e}");
        }

        match self.transport.roster().await {
            Ok(contacts) => {
                info!("Roster has {} contact(s)", contacts.len());
                for contact in &contacts {
                    debug!("Contact: {contact}");
                }
            }
            Err(e) => warn!("Failed to fetch roster: {e}"),
        }
    }

    async fn on_message(&mut self, msg: InboundMessage) -> Result<Handled, RelayError> {
        if !msg.kind.is_conversational() {
            debug!("Ignoring {:?} message from {}", msg.kind, msg.from);
            return Ok(Handled::Ignored);
        }

        info!("📨 {}: \"{}\"", msg.from, preview(&msg.body));

        if msg.body == CLOSE_COMMAND {
            info!("Close requested by {}", msg.from);
            return Ok(Handled::Close);
        }

        let reply = self.session.think(&msg.body).await?;
        let reply = self.config.normalization.apply(&reply);

        self.transport.reply(&msg, &reply).await?;
        info!("📤 {}: \"{}\"", msg.from, preview(&reply));

        Ok(Handled::Replied)
    }
}

#[cfg(test)]
impl<T, C> ImRelay<T, C> {
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn session(&self) -> &C {
        &self.session
    }
}
