//! Set of already-answered SMS identifiers.
//!
//! Unbounded by default: an identifier stays for the lifetime of the
//! process. A capacity and/or TTL can be configured for long-running
//! relays; the oldest entries are evicted first.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use crate::relay::message::MessageId;

/// Eviction policy. Both limits off means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeenPolicy {
    pub capacity: Option<usize>,
    pub ttl: Option<Duration>,
}

impl SeenPolicy {
    pub fn is_bounded(&self) -> bool {
        self.capacity.is_some() || self.ttl.is_some()
    }
}

#[derive(Debug, Default)]
pub struct SeenSet {
    policy: SeenPolicy,
    seen_at: HashMap<MessageId, Instant>,
    /// Insertion order, oldest first.
    order: VecDeque<MessageId>,
}

impl SeenSet {
    pub fn new(policy: SeenPolicy) -> Self {
        Self {
            policy,
            seen_at: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        match (self.seen_at.get(id), self.policy.ttl) {
            (Some(at), Some(ttl)) => at.elapsed() < ttl,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Record an identifier as fully processed.
    pub fn insert(&mut self, id: MessageId) {
        if self.seen_at.insert(id, Instant::now()).is_some() {
            self.order.retain(|other| *other != id);
        }
        self.order.push_back(id);

        if let Some(capacity) = self.policy.capacity {
            while self.order.len() > capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.seen_at.remove(&oldest);
                }
            }
        }
    }

    /// Drop entries older than the TTL. Returns how many were dropped.
    pub fn evict_expired(&mut self) -> usize {
        let Some(ttl) = self.policy.ttl else {
            return 0;
        };

        let mut evicted = 0;
        while let Some(oldest) = self.order.front() {
            let expired = self
                .seen_at
                .get(oldest)
                .is_none_or(|at| at.elapsed() >= ttl);
            if !expired {
                break;
            }
            if let Some(id) = self.order.pop_front() {
                self.seen_at.remove(&id);
                evicted += 1;
            }
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

#[cfg(test)]
impl SeenSet {
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_keeps_everything() {
        let mut seen = SeenSet::default();
        for i in 0..1000 {
            seen.insert(MessageId(i));
        }
        assert_eq!(seen.len(), 1000);
        assert!(seen.contains(&MessageId(0)));
        assert!(seen.contains(&MessageId(999)));
        assert!(!seen.contains(&MessageId(1000)));
    }

    #[test]
    fn test_reinsert_does_not_duplicate() {
        let mut seen = SeenSet::default();
        seen.insert(MessageId(1));
        seen.insert(MessageId(1));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut seen = SeenSet::new(SeenPolicy { capacity: Some(2), ttl: None });
        seen.insert(MessageId(1));
        seen.insert(MessageId(2));
        seen.insert(MessageId(3));

        assert_eq!(seen.len(), 2);
        assert!(!seen.contains(&MessageId(1)));
        assert!(seen.contains(&MessageId(2)));
        assert!(seen.contains(&MessageId(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expires_entries() {
        let mut seen = SeenSet::new(SeenPolicy { capacity: None, ttl: Some(Duration::from_secs(60)) });
        seen.insert(MessageId(1));
        tokio::time::advance(Duration::from_secs(30)).await;
        seen.insert(MessageId(2));

        assert!(seen.contains(&MessageId(1)));
        tokio::time::advance(Duration::from_secs(31)).await;

        // expired entries read as absent even before eviction runs
        assert!(!seen.contains(&MessageId(1)));
        assert!(seen.contains(&MessageId(2)));

        assert_eq!(seen.evict_expired(), 1);
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_policy_bounded() {
        assert!(!SeenPolicy::default().is_bounded());
        assert!(SeenPolicy { capacity: Some(10), ttl: None }.is_bounded());
    }
}
