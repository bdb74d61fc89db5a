//! 入札裁定サービス
//!
//! 入札1件の検証から確定までを行う。検証と書き込みはオークション行の
//! ロックを保持したまま実施し、同一オークションへの並行入札が古い
//! 現在価格に対して同時に成立することを防ぐ。ロック解放後に通知を流す。
//!
//! 検証順（最初に失敗したものを返す）:
//! 1. オークションが存在し、ACTIVEで、現在時刻が [start, end) に入っている
//! 2. オークション全体のクールダウンが明けている
//! 3. 現在の最高入札者が本人でない
//! 4. 金額が最低受理額（最高額+刻み、入札なしなら基準価格）以上

use std::sync::Arc;

use crate::cooldown::BidCooldown;
use crate::events::EventHub;
use crate::store::{now_millis, AuctionStatus, AuctionStore, Bid, BidLedger};

/// 入札拒否理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidReject {
    AuctionNotFound,
    AuctionNotActive,
    AuctionExpired,
    /// 残りseconds_left秒はこのオークションへの入札を全員受け付けない
    Cooldown { seconds_left: u64 },
    /// 最高入札者は外から上書きされるまで再入札できない
    SelfOutbid,
    BidTooLow { min_required: u64 },
}

impl BidReject {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuctionNotFound => "AUCTION_NOT_FOUND",
            Self::AuctionNotActive => "AUCTION_NOT_ACTIVE",
            Self::AuctionExpired => "AUCTION_EXPIRED",
            Self::Cooldown { .. } => "COOLDOWN",
            Self::SelfOutbid => "SELF_OUTBID",
            Self::BidTooLow { .. } => "BID_TOO_LOW",
        }
    }
}

/// 受理結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidAccept {
    pub bid: Bid,
    pub current_price: u64,
}

/// 入札裁定サービス
pub struct BidArbitrationService {
    auctions: Arc<AuctionStore>,
    ledger: Arc<BidLedger>,
    cooldown: Arc<BidCooldown>,
    hub: Arc<EventHub>,
}

impl BidArbitrationService {
    pub fn new(
        auctions: Arc<AuctionStore>,
        ledger: Arc<BidLedger>,
        cooldown: Arc<BidCooldown>,
        hub: Arc<EventHub>,
    ) -> Self {
        Self {
            auctions,
            ledger,
            cooldown,
            hub,
        }
    }

    /// 入札を検証・確定する
    pub fn place_bid(
        &self,
        auction_id: &str,
        bidder_id: &str,
        amount: u64,
    ) -> Result<BidAccept, BidReject> {
        let row = self
            .auctions
            .row(auction_id)
            .ok_or(BidReject::AuctionNotFound)?;

        // 行ロック区間。検証から価格更新までを直列化する。
        let mut auction = row.lock().unwrap();
        let now_ms = now_millis();

        match auction.status {
            AuctionStatus::Active => {}
            _ => return Err(BidReject::AuctionNotActive),
        }
        if now_ms < auction.start_at_ms {
            return Err(BidReject::AuctionNotActive);
        }
        if now_ms >= auction.end_at_ms {
            // 終了時刻は過ぎたがスケジューラの掃引がまだのケース
            return Err(BidReject::AuctionExpired);
        }

        if let Some(seconds_left) = self.cooldown.seconds_left(auction_id, now_ms) {
            return Err(BidReject::Cooldown { seconds_left });
        }

        // 最高入札は行ロック下で台帳から取り直す（キャッシュ値は信用しない）
        let top = self.ledger.top_bid(auction_id);
        if let Some(ref top) = top {
            if top.bidder_id == bidder_id {
                return Err(BidReject::SelfOutbid);
            }
        }
        let min_required = match top {
            Some(ref top) => top.amount.saturating_add(auction.price_step),
            None => auction.current_price,
        };
        if amount < min_required {
            return Err(BidReject::BidTooLow { min_required });
        }

        // 確定: 台帳追記 → 現在価格更新 → クールダウン再装填
        let bid = self.ledger.append(auction_id, bidder_id, amount);
        auction.current_price = amount;
        self.cooldown.record_accept(auction_id, now_ms);
        let current_price = auction.current_price;
        drop(auction);

        // 通知はロック解放後
        let data = serde_json::json!({
            "auctionId": auction_id,
            "currentPrice": current_price,
            "bidderId": bidder_id,
            "bid": {
                "bidId": bid.bid_id,
                "amount": bid.amount,
                "placedAtMs": bid.placed_at_ms,
            },
        })
        .to_string();
        self.hub.publish_auction(auction_id, "bid:new", &data);

        Ok(BidAccept { bid, current_price })
    }
}
