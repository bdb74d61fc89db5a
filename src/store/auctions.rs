//! オークションストア
//!
//! オークション行を行単位のMutexで管理する。入札裁定と精算は同じ行ロックを
//! 取ってから状態を読み書きするため、同一オークションへの並行操作は直列化され、
//! 別オークション同士は自由に並行できる。

use dashmap::DashMap;
use std::sync::{Arc, Mutex};

/// オークションステータス（前進のみ: UPCOMING → ACTIVE → ENDED）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionStatus {
    Upcoming,
    Active,
    Ended,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "UPCOMING",
            Self::Active => "ACTIVE",
            Self::Ended => "ENDED",
        }
    }
}

/// オークション行
#[derive(Debug, Clone)]
pub struct Auction {
    pub auction_id: String,
    /// 売りに出す在庫ユニット
    pub unit_id: String,
    /// 最小入札刻み
    pub price_step: u64,
    pub start_at_ms: u64,
    pub end_at_ms: u64,
    pub status: AuctionStatus,
    /// 現在価格。入札が無い間は基準価格を映す。単調非減少。
    pub current_price: u64,
}

impl Auction {
    pub fn new(
        auction_id: String,
        unit_id: String,
        base_price: u64,
        price_step: u64,
        start_at_ms: u64,
        end_at_ms: u64,
    ) -> Self {
        Self {
            auction_id,
            unit_id,
            price_step,
            start_at_ms,
            end_at_ms,
            status: AuctionStatus::Upcoming,
            current_price: base_price,
        }
    }

    /// 開始時刻を過ぎたUPCOMINGか
    pub fn is_due_activation(&self, now_ms: u64) -> bool {
        self.status == AuctionStatus::Upcoming && self.start_at_ms <= now_ms
    }

    /// 終了時刻を過ぎたACTIVEか
    pub fn is_due_settlement(&self, now_ms: u64) -> bool {
        self.status == AuctionStatus::Active && self.end_at_ms <= now_ms
    }
}

/// 行ロック付きインメモリオークションストア
pub struct AuctionStore {
    rows: DashMap<String, Arc<Mutex<Auction>>>,
}

impl AuctionStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    /// 新規オークションを登録。同一IDが既にある場合はfalse。
    pub fn insert(&self, auction: Auction) -> bool {
        let id = auction.auction_id.clone();
        match self.rows.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(auction)));
                true
            }
        }
    }

    /// 行ロックのハンドルを取得。呼び出し側がlock()してから読み書きする。
    pub fn row(&self, auction_id: &str) -> Option<Arc<Mutex<Auction>>> {
        self.rows.get(auction_id).map(|entry| Arc::clone(&entry))
    }

    /// ロックを取ってコピーを返す（読み取り専用の参照用）
    pub fn snapshot(&self, auction_id: &str) -> Option<Auction> {
        let row = self.row(auction_id)?;
        let guard = row.lock().unwrap();
        Some(guard.clone())
    }

    /// 活性化対象のID一覧
    pub fn ids_due_activation(&self, now_ms: u64) -> Vec<String> {
        self.rows
            .iter()
            .filter(|entry| entry.value().lock().unwrap().is_due_activation(now_ms))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// 精算対象のID一覧
    pub fn ids_due_settlement(&self, now_ms: u64) -> Vec<String> {
        self.rows
            .iter()
            .filter(|entry| entry.value().lock().unwrap().is_due_settlement(now_ms))
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }
}

impl Default for AuctionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, start: u64, end: u64) -> Auction {
        Auction::new(id.into(), format!("unit_{id}"), 1_000, 100, start, end)
    }

    #[test]
    fn test_insert_and_snapshot() {
        let store = AuctionStore::new();
        assert!(store.insert(sample("a1", 100, 200)));
        assert!(!store.insert(sample("a1", 100, 200)));

        let found = store.snapshot("a1").unwrap();
        assert_eq!(found.status, AuctionStatus::Upcoming);
        assert_eq!(found.current_price, 1_000);
        assert!(store.snapshot("missing").is_none());
    }

    #[test]
    fn test_due_queries() {
        let store = AuctionStore::new();
        store.insert(sample("a1", 100, 200));
        store.insert(sample("a2", 500, 900));

        let due = store.ids_due_activation(150);
        assert_eq!(due, vec!["a1".to_string()]);

        // ACTIVEへ進めてから終了時刻を跨ぐと精算対象になる
        let row = store.row("a1").unwrap();
        row.lock().unwrap().status = AuctionStatus::Active;
        assert!(store.ids_due_settlement(199).is_empty());
        assert_eq!(store.ids_due_settlement(200), vec!["a1".to_string()]);
    }
}
