// Chat platform boundary: inbound messages, outbound messages, and the sink
// that hands outbound messages to the connected gateway.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::SinkError;
use crate::metrics;

/// A message delivered by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub author_id: String,
    pub channel_id: String,
    pub content: String,
    /// Set when the bot itself authored the message.
    #[serde(default)]
    pub from_self: bool,
}

/// A message the gateway should post to a channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundMessage {
    pub channel_id: String,
    pub text: String,
    pub sent_at: chrono::DateTime<chrono::Utc>,
}

/// Destination for everything the bot says.
pub trait AnnouncementSink: Send + Sync {
    /// Whether `channel_id` can currently be posted to.
    fn resolve_channel(&self, channel_id: &str) -> bool;

    fn send(&self, channel_id: &str, text: &str) -> Result<(), SinkError>;

    /// Keep `channel_id` resolvable for as long as it is the spawn channel.
    fn pin_channel(&self, _channel_id: &str) {}
}

/// Mention markup for a user id.
pub fn mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}

/// How many recently active channels stay resolvable besides the pinned one.
pub const RECENT_CHANNEL_LIMIT: usize = 64;

#[derive(Debug, Default)]
struct KnownChannels {
    pinned: Option<String>,
    /// Least recently seen first.
    recent: VecDeque<String>,
}

impl KnownChannels {
    fn contains(&self, channel_id: &str) -> bool {
        self.pinned.as_deref() == Some(channel_id) || self.recent.iter().any(|c| c == channel_id)
    }

    fn touch(&mut self, channel_id: &str) {
        if let Some(pos) = self.recent.iter().position(|c| c == channel_id) {
            if let Some(existing) = self.recent.remove(pos) {
                self.recent.push_back(existing);
            }
            return;
        }
        self.recent.push_back(channel_id.to_string());
        while self.recent.len() > RECENT_CHANNEL_LIMIT {
            self.recent.pop_front();
        }
    }
}

/// Fans outbound messages out to every connected gateway over a broadcast
/// channel. Channels become resolvable once inbound traffic is seen on them;
/// only the most recent ones are remembered, plus the pinned spawn channel.
pub struct BroadcastSink {
    tx: broadcast::Sender<String>,
    known_channels: Mutex<KnownChannels>,
}

impl BroadcastSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            tx,
            known_channels: Mutex::new(KnownChannels::default()),
        }
    }

    /// Subscribe to outbound messages. Yields JSON-encoded `OutboundMessage`s.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn knows_channel(&self, channel_id: &str) -> bool {
        self.known_channels.lock().unwrap().contains(channel_id)
    }

    /// Record that the gateway delivered traffic from `channel_id`.
    pub fn observe_channel(&self, channel_id: &str) {
        self.known_channels.lock().unwrap().touch(channel_id);
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnouncementSink for BroadcastSink {
    fn resolve_channel(&self, channel_id: &str) -> bool {
        self.subscriber_count() > 0 && self.knows_channel(channel_id)
    }

    fn send(&self, channel_id: &str, text: &str) -> Result<(), SinkError> {
        if !self.knows_channel(channel_id) {
            return Err(SinkError::UnknownChannel(channel_id.to_string()));
        }
        let msg = OutboundMessage {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
            sent_at: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&msg).map_err(|_| SinkError::Disconnected)?;
        self.tx.send(json).map_err(|_| SinkError::Disconnected)?;
        metrics::OUTBOUND_MESSAGES_TOTAL.inc();
        Ok(())
    }

    fn pin_channel(&self, channel_id: &str) {
        self.known_channels.lock().unwrap().pinned = Some(channel_id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incoming_message_defaults() {
        let msg: IncomingMessage = serde_json::from_str(
            r#"{"author_id": "U1", "channel_id": "C1", "content": "pen"}"#,
        )
        .unwrap();
        assert!(!msg.from_self);
        assert_eq!(msg.content, "pen");
    }

    #[test]
    fn test_mention() {
        assert_eq!(mention("1234"), "<@1234>");
    }

    #[test]
    fn test_unknown_channel_is_unresolved() {
        let sink = BroadcastSink::new();
        let _rx = sink.subscribe();
        assert!(!sink.resolve_channel("C1"));
        assert_eq!(
            sink.send("C1", "hello"),
            Err(SinkError::UnknownChannel("C1".into()))
        );
    }

    #[test]
    fn test_send_without_subscribers() {
        let sink = BroadcastSink::new();
        sink.observe_channel("C1");
        assert!(!sink.resolve_channel("C1"));
        assert_eq!(sink.send("C1", "hello"), Err(SinkError::Disconnected));
    }

    #[test]
    fn test_recent_channels_are_bounded() {
        let sink = BroadcastSink::new();
        let _rx = sink.subscribe();
        sink.observe_channel("SPAWN");
        sink.pin_channel("SPAWN");
        for i in 0..RECENT_CHANNEL_LIMIT + 10 {
            sink.observe_channel(&format!("C{i}"));
        }
        // C10 onwards survive; C20 is seen again and moves to the back.
        sink.observe_channel("C20");
        for i in 0..10 {
            sink.observe_channel(&format!("N{i}"));
        }

        assert_eq!(
            sink.known_channels.lock().unwrap().recent.len(),
            RECENT_CHANNEL_LIMIT
        );
        assert!(sink.resolve_channel("SPAWN"));
        assert!(sink.resolve_channel("C20"));
        assert!(sink.resolve_channel("C21"));
        assert!(sink.resolve_channel("N9"));
        assert!(!sink.resolve_channel("C19"));
        assert!(!sink.resolve_channel("C0"));
        assert_eq!(
            sink.send("C0", "hello"),
            Err(SinkError::UnknownChannel("C0".into()))
        );
    }

    #[tokio::test]
    async fn test_send_reaches_subscriber() {
        let sink = BroadcastSink::new();
        sink.observe_channel("C1");
        let mut rx = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 1);
        assert!(sink.resolve_channel("C1"));

        sink.send("C1", "A King penguin has appeared!").unwrap();

        let raw = rx.recv().await.unwrap();
        let msg: OutboundMessage = serde_json::from_str(&raw).unwrap();
        assert_eq!(msg.channel_id, "C1");
        assert_eq!(msg.text, "A King penguin has appeared!");
    }
}
