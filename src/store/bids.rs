//! 入札台帳
//!
//! オークションごとの入札を追記専用で保持する。全順序は
//! (金額降順, 時刻昇順, 追記順昇順)。seqは同一ミリ秒の入札の順序を保つ。

use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use super::now_millis;

/// 入札行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bid {
    pub bid_id: String,
    pub auction_id: String,
    pub bidder_id: String,
    pub amount: u64,
    pub placed_at_ms: u64,
    /// 台帳内の追記順（同時刻のタイブレーク用）
    pub seq: u64,
}

/// aがbより上位（勝ちに近い）かどうか
fn ranks_above(a: &Bid, b: &Bid) -> bool {
    if a.amount != b.amount {
        return a.amount > b.amount;
    }
    if a.placed_at_ms != b.placed_at_ms {
        return a.placed_at_ms < b.placed_at_ms;
    }
    a.seq < b.seq
}

/// インメモリ入札台帳
pub struct BidLedger {
    by_auction: RwLock<HashMap<String, Vec<Bid>>>,
}

impl BidLedger {
    pub fn new() -> Self {
        Self {
            by_auction: RwLock::new(HashMap::new()),
        }
    }

    /// 入札を追記し、確定した行を返す
    pub fn append(&self, auction_id: &str, bidder_id: &str, amount: u64) -> Bid {
        let mut map = self.by_auction.write().unwrap();
        let rows = map.entry(auction_id.to_string()).or_default();
        let bid = Bid {
            bid_id: format!("bid_{}", Uuid::new_v4()),
            auction_id: auction_id.to_string(),
            bidder_id: bidder_id.to_string(),
            amount,
            placed_at_ms: now_millis(),
            seq: rows.len() as u64,
        };
        rows.push(bid.clone());
        bid
    }

    /// 最上位入札（金額降順・時刻昇順・seq昇順の先頭）
    pub fn top_bid(&self, auction_id: &str) -> Option<Bid> {
        let map = self.by_auction.read().unwrap();
        let rows = map.get(auction_id)?;
        let mut best: Option<&Bid> = None;
        for bid in rows {
            match best {
                Some(current) if !ranks_above(bid, current) => {}
                _ => best = Some(bid),
            }
        }
        best.cloned()
    }

    /// 全順序でのページング取得。戻り値は (該当ページ, 総件数)。
    pub fn page(&self, auction_id: &str, page: usize, limit: usize) -> (Vec<Bid>, usize) {
        let map = self.by_auction.read().unwrap();
        let rows = match map.get(auction_id) {
            Some(rows) => rows,
            None => return (Vec::new(), 0),
        };
        let mut sorted: Vec<Bid> = rows.clone();
        sorted.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then(a.placed_at_ms.cmp(&b.placed_at_ms))
                .then(a.seq.cmp(&b.seq))
        });
        let total = sorted.len();
        let start = page.saturating_mul(limit).min(total);
        let end = start.saturating_add(limit).min(total);
        (sorted[start..end].to_vec(), total)
    }
}

impl Default for BidLedger {
    fn default() -> Self {
        Self::new()
    }
}
