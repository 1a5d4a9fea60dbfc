//! Polling relay over an SMS inbox.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::chatterbot::ChatSession;
use crate::relay::RelayError;
use crate::relay::message::{MessageId, SmsMessage, preview};
use crate::relay::seen::{SeenPolicy, SeenSet};
use crate::transport::TransportError;

/// A message store that can be polled.
#[async_trait]
pub trait SmsInbox: Send {
    /// Identifiers of unread inbox messages, in the store's order.
    async fn list_unread_ids(&mut self) -> Result<Vec<MessageId>, TransportError>;
    async fn fetch_message(&mut self, id: MessageId) -> Result<SmsMessage, TransportError>;
    async fn send(&mut self, address: &str, body: &str) -> Result<(), TransportError>;
    async fn mark_read(&mut self, id: MessageId) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsRelayConfig {
    /// Sleep before every inbox scan.
    pub poll_interval: Duration,
    /// Mark answered messages read so they drop out of the unread listing.
    pub mark_read: bool,
    pub seen: SeenPolicy,
}

impl Default for SmsRelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            mark_read: false,
            seen: SeenPolicy::default(),
        }
    }
}

/// What one inbox scan did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub listed: usize,
    pub processed: usize,
    pub skipped: usize,
}

/// Polls an inbox and answers every message it has not answered before.
pub struct SmsRelay<I, C> {
    inbox: I,
    session: C,
    config: SmsRelayConfig,
    seen: SeenSet,
}

impl<I: SmsInbox, C: ChatSession> SmsRelay<I, C> {
    pub fn new(inbox: I, session: C, config: SmsRelayConfig) -> Self {
        let seen = SeenSet::new(config.seen);
        Self {
            inbox,
            session,
            config,
            seen,
        }
    }

    /// Poll forever. Only returns on a fatal error.
    pub async fn run(&mut self) -> Result<(), RelayError> {
        info!("📱 Polling SMS inbox every {:?}", self.config.poll_interval);
        loop {
            sleep(self.config.poll_interval).await;
            let report = self.poll_once().await?;
            if report.processed > 0 {
                info!(
                    "Answered {} message(s), {} already seen, {} tracked",
                    report.processed,
                    report.skipped,
                    self.seen.len()
                );
            } else {
                debug!("Nothing new ({} listed)", report.listed);
            }
        }
    }

    /// One inbox scan, without the sleep.
    ///
    /// An identifier enters the seen-set only once its reply has been sent,
    /// so a failure part-way leaves it eligible again.
    pub async fn poll_once(&mut self) -> Result<CycleReport, RelayError> {
        let evicted = self.seen.evict_expired();
        if evicted > 0 {
            debug!("Evicted {evicted} expired id(s)");
        }

        let ids = self.inbox.list_unread_ids().await?;
        let mut report = CycleReport {
            listed: ids.len(),
            ..CycleReport::default()
        };

        for id in ids {
            if self.seen.contains(&id) {
                report.skipped += 1;
                continue;
            }

            let message = self.inbox.fetch_message(id).await?;
            info!("📨 SMS {} from {}: \"{}\"", id, message.address, preview(&message.body));
            if let Some(at) = message.received_at {
                debug!("SMS {id} received {}", at.format("%Y-%m-%d %H:%M"));
            }

            let reply = self.session.think(&message.body).await?;
            self.inbox.send(&message.address, &reply).await?;
            info!("📤 Sent to {}: \"{}\"", message.address, preview(&reply));

            if self.config.mark_read {
                self.inbox.mark_read(id).await?;
            }
            self.seen.insert(id);
            report.processed += 1;
        }

        Ok(report)
    }
}

#[cfg(test)]
impl<I, C> SmsRelay<I, C> {
    pub fn inbox(&self) -> &I {
        &self.inbox
    }

    pub fn session(&self) -> &C {
        &self.session
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }
}
