//! 通知ファンアウトハブ
//!
//! オークションルーム・ユーザー個別・グローバルの3系統にイベントを配信する。
//! 配信はfire-and-forgetで、購読者がいなくても呼び出し元を失敗させない。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::broadcast;

/// 配信イベント
#[derive(Debug, Clone)]
pub struct FanoutEvent {
    pub id: u64,
    pub event_type: String,
    pub data: String,
}

/// ファンアウトハブ
pub struct EventHub {
    next_event_id: AtomicU64,
    auction_channels: RwLock<HashMap<String, broadcast::Sender<FanoutEvent>>>,
    user_channels: RwLock<HashMap<String, broadcast::Sender<FanoutEvent>>>,
    global_channel: broadcast::Sender<FanoutEvent>,
    channel_capacity: usize,
}

impl EventHub {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            next_event_id: AtomicU64::new(1),
            auction_channels: RwLock::new(HashMap::new()),
            user_channels: RwLock::new(HashMap::new()),
            global_channel: broadcast::channel(capacity).0,
            channel_capacity: capacity,
        }
    }

    fn next_event(&self, event_type: &str, data: &str) -> FanoutEvent {
        FanoutEvent {
            id: self.next_event_id.fetch_add(1, Ordering::Relaxed),
            event_type: event_type.to_string(),
            data: data.to_string(),
        }
    }

    /// オークションルームを購読
    pub fn subscribe_auction(&self, auction_id: &str) -> broadcast::Receiver<FanoutEvent> {
        let mut channels = self.auction_channels.write().unwrap();
        let sender = channels
            .entry(auction_id.to_string())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0);
        sender.subscribe()
    }

    /// ユーザー個別チャンネルを購読
    pub fn subscribe_user(&self, user_id: &str) -> broadcast::Receiver<FanoutEvent> {
        let mut channels = self.user_channels.write().unwrap();
        let sender = channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0);
        sender.subscribe()
    }

    /// グローバルチャンネルを購読（ダッシュボード向け）
    pub fn subscribe_global(&self) -> broadcast::Receiver<FanoutEvent> {
        self.global_channel.subscribe()
    }

    /// オークションルームへ配信
    pub fn publish_auction(&self, auction_id: &str, event_type: &str, data: &str) {
        let event = self.next_event(event_type, data);
        let channels = self.auction_channels.read().unwrap();
        if let Some(sender) = channels.get(auction_id) {
            let _ = sender.send(event);
        }
    }

    /// ユーザー個別チャンネルへ配信
    pub fn publish_user(&self, user_id: &str, event_type: &str, data: &str) {
        let event = self.next_event(event_type, data);
        let channels = self.user_channels.read().unwrap();
        if let Some(sender) = channels.get(user_id) {
            let _ = sender.send(event);
        }
    }

    /// グローバルへ配信
    pub fn publish_global(&self, event_type: &str, data: &str) {
        let _ = self.global_channel.send(self.next_event(event_type, data));
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_subscribe_room() {
        let hub = EventHub::new();

        let mut rx = hub.subscribe_auction("a1");
        hub.publish_auction("a1", "bid:new", r#"{"currentPrice":1200000}"#);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "bid:new");
        assert!(event.data.contains("1200000"));
    }

    #[tokio::test]
    async fn test_global_channel() {
        let hub = EventHub::new();

        let mut rx = hub.subscribe_global();
        hub.publish_global("auction:status", r#"{"status":"ENDED"}"#);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "auction:status");
    }

    #[tokio::test]
    async fn test_no_subscriber() {
        let hub = EventHub::new();

        // 購読者がいなくてもパニックしない
        hub.publish_auction("a1", "bid:new", "{}");
        hub.publish_user("u1", "auction:win", "{}");
        hub.publish_global("auction:status", "{}");
    }
}
