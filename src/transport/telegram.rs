//! Telegram bot account as an IM transport, using teloxide.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, MessageId, ReplyParameters, UpdateKind};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::relay::{Correspondent, ImEvent, ImTransport, InboundMessage, MessageKind};
use crate::transport::TransportError;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub token: String,
    /// Long-poll timeout for getUpdates, in seconds.
    pub poll_timeout_secs: u32,
    /// Chats reported as the roster on session start.
    pub roster: Vec<i64>,
}

/// Shape of the chat a message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatShape {
    Private,
    Group,
    Channel,
}

pub struct TelegramTransport {
    bot: Bot,
    config: TelegramConfig,
    auto_reconnect: bool,
    connected: bool,
    bot_username: Option<String>,
    /// Next update id to ask for.
    offset: i32,
    pending: VecDeque<ImEvent>,
}

impl TelegramTransport {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            bot: Bot::new(&config.token),
            config,
            auto_reconnect: false,
            connected: false,
            bot_username: None,
            offset: 0,
            pending: VecDeque::new(),
        }
    }

    /// getUpdates, retried with backoff when auto-reconnect is on.
    async fn poll_updates(&mut self) -> Result<Vec<Update>, TransportError> {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            let request = self
                .bot
                .get_updates()
                .offset(self.offset)
                .timeout(self.config.poll_timeout_secs)
                .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::ChannelPost]);

            match request.await {
                Ok(updates) => return Ok(updates),
                Err(e) if self.auto_reconnect => {
                    warn!("Polling failed: {e}; retrying in {backoff:?}");
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn to_inbound(&self, msg: &Message) -> InboundMessage {
        let shape = if msg.chat.is_private() {
            ChatShape::Private
        } else if msg.chat.is_channel() {
            ChatShape::Channel
        } else {
            ChatShape::Group
        };

        let (kind, body) = classify(shape, msg.text(), self.bot_username.as_deref());

        let name = msg
            .from
            .as_ref()
            .map(|u| u.username.clone().unwrap_or_else(|| u.first_name.clone()))
            .unwrap_or_else(|| "unknown".to_string());

        InboundMessage {
            kind,
            from: Correspondent { id: msg.chat.id.0, name },
            message_id: Some(msg.id.0 as i64),
            body,
        }
    }
}

/// Work out the message kind and the text to hand on.
///
/// In groups only messages that start by mentioning the bot are treated as
/// addressed to it; the mention is stripped from the body.
fn classify(shape: ChatShape, text: Option<&str>, bot_username: Option<&str>) -> (MessageKind, String) {
    let Some(text) = text else {
        return (MessageKind::System, String::new());
    };

    match shape {
        ChatShape::Private => (MessageKind::Chat, text.to_string()),
        ChatShape::Channel => (MessageKind::Headline, text.to_string()),
        ChatShape::Group => match bot_username.and_then(|name| strip_mention(text, name)) {
            Some(rest) => (MessageKind::Normal, rest.to_string()),
            None => (MessageKind::GroupChat, text.to_string()),
        },
    }
}

fn strip_mention<'a>(text: &'a str, bot_username: &str) -> Option<&'a str> {
    let mention = format!("@{bot_username}");
    let head = text.get(..mention.len())?;
    if !head.eq_ignore_ascii_case(&mention) {
        return None;
    }
    let rest = &text[mention.len()..];
    // "@bot_name_other" is somebody else
    if rest.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some(rest.trim_start_matches([',', ':']).trim())
}

#[async_trait]
impl ImTransport for TelegramTransport {
    fn set_auto_reconnect(&mut self, enabled: bool) {
        self.auto_reconnect = enabled;
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        // getUpdates is refused while a webhook is registered
        self.bot.delete_webhook().await?;
        self.connected = true;
        self.pending.push_back(ImEvent::SessionStart);
        info!("Connected to Telegram (long polling, auto-reconnect: {})", self.auto_reconnect);
        Ok(())
    }

    async fn announce_presence(&mut self) -> Result<(), TransportError> {
        let me = self.bot.get_me().await?;
        info!("Online as @{} ({})", me.username(), me.user.id);
        self.bot_username = Some(me.username().to_string());
        Ok(())
    }

    async fn roster(&mut self) -> Result<Vec<Correspondent>, TransportError> {
        let mut contacts = Vec::with_capacity(self.config.roster.len());
        for &id in &self.config.roster {
            let chat = self.bot.get_chat(ChatId(id)).await?;
            let name = chat
                .title()
                .or(chat.username())
                .or(chat.first_name())
                .unwrap_or("unknown")
                .to_string();
            contacts.push(Correspondent { id, name });
        }
        Ok(contacts)
    }

    async fn next_event(&mut self) -> Result<Option<ImEvent>, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }

        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            let updates = self.poll_updates().await?;
            for update in updates {
                self.offset = next_offset(update.id.0)?;
                match update.kind {
                    UpdateKind::Message(ref msg) | UpdateKind::ChannelPost(ref msg) => {
                        let inbound = self.to_inbound(msg);
                        self.pending.push_back(ImEvent::Message(inbound));
                    }
                    _ => debug!("Skipping update {}", update.id.0),
                }
            }
        }
    }

    async fn reply(&mut self, to: &InboundMessage, text: &str) -> Result<(), TransportError> {
        let mut request = self.bot.send_message(ChatId(to.from.id), text);

        // thread replies in groups so the asker can tell which is theirs
        if to.kind == MessageKind::Normal
            && let Some(id) = to.message_id
        {
            request = request.reply_parameters(ReplyParameters::new(MessageId(id as i32)));
        }

        request.await?;
        Ok(())
    }
}

/// Offset that acknowledges update `id` and everything before it.
fn next_offset(id: u32) -> Result<i32, TransportError> {
    i32::try_from(id)
        .ok()
        .and_then(|id| id.checked_add(1))
        .ok_or_else(|| TransportError::Protocol(format!("update id {id} out of range for offset")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_text_is_chat() {
        let (kind, body) = classify(ChatShape::Private, Some("hello"), Some("relaybot"));
        assert_eq!(kind, MessageKind::Chat);
        assert_eq!(body, "hello");
    }

    #[test]
    fn test_channel_post_is_headline() {
        let (kind, _) = classify(ChatShape::Channel, Some("news"), None);
        assert_eq!(kind, MessageKind::Headline);
    }

    #[test]
    fn test_non_text_is_system() {
        let (kind, body) = classify(ChatShape::Private, None, None);
        assert_eq!(kind, MessageKind::System);
        assert!(body.is_empty());
    }

    #[test]
    fn test_group_mention_is_normal() {
        let (kind, body) = classify(ChatShape::Group, Some("@RelayBot, how are you?"), Some("relaybot"));
        assert_eq!(kind, MessageKind::Normal);
        assert_eq!(body, "how are you?");
    }

    #[test]
    fn test_group_chatter_is_groupchat() {
        let (kind, body) = classify(ChatShape::Group, Some("hi all"), Some("relaybot"));
        assert_eq!(kind, MessageKind::GroupChat);
        assert_eq!(body, "hi all");
    }

    #[test]
    fn test_next_offset() {
        assert_eq!(next_offset(0).unwrap(), 1);
        assert_eq!(next_offset(41).unwrap(), 42);
        assert!(matches!(next_offset(i32::MAX as u32), Err(TransportError::Protocol(_))));
        assert!(matches!(next_offset(u32::MAX), Err(TransportError::Protocol(_))));
    }

    #[test]
    fn test_group_without_known_username() {
        let (kind, _) = classify(ChatShape::Group, Some("@relaybot hi"), None);
        assert_eq!(kind, MessageKind::GroupChat);
    }

    #[test]
    fn test_strip_mention() {
        assert_eq!(strip_mention("@relaybot close", "relaybot"), Some("close"));
        assert_eq!(strip_mention("@relaybot: hi", "relaybot"), Some("hi"));
        assert_eq!(strip_mention("@relaybot", "relaybot"), Some(""));
        assert_eq!(strip_mention("@relaybot_two hi", "relaybot"), None);
        assert_eq!(strip_mention("hey @relaybot", "relaybot"), None);
        assert_eq!(strip_mention("é", "relaybot"), None);
    }

    #[tokio::test]
    async fn test_next_event_requires_connect() {
        let mut transport = TelegramTransport::new(TelegramConfig {
            token: "123456789:ABCdef".into(),
            poll_timeout_secs: 10,
            roster: vec![],
        });
        assert!(matches!(transport.next_event().await, Err(TransportError::NotConnected)));
    }
}
