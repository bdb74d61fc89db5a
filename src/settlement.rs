//! 精算エンジン
//!
//! 終了時刻を迎えたオークションを確定させる。行ロック下で勝者決定と
//! 状態遷移をまとめて行い、ロック解放後に通知を流す。既にENDEDの行は
//! 即座にAlreadyEndedを返すため、掃引が同じオークションを二度拾っても
//! 副作用は一度しか起きない。

use std::sync::Arc;

use crate::cooldown::BidCooldown;
use crate::events::EventHub;
use crate::notifier::MailNotifier;
use crate::store::{
    now_millis, AuctionStatus, AuctionStore, Bid, BidLedger, CartHold, CartStore, CatalogStore,
};

/// 精算結果
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    /// 今回の呼び出しで確定した。入札ゼロならwinnerはNone。
    Settled { winner: Option<Bid> },
    /// 既に確定済み（再実行は何もしない）
    AlreadyEnded,
}

/// 精算エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeError {
    AuctionNotFound,
}

impl FinalizeError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuctionNotFound => "AUCTION_NOT_FOUND",
        }
    }
}

/// 精算エンジン
pub struct FinalizationEngine {
    auctions: Arc<AuctionStore>,
    ledger: Arc<BidLedger>,
    carts: Arc<CartStore>,
    catalog: Arc<CatalogStore>,
    cooldown: Arc<BidCooldown>,
    hub: Arc<EventHub>,
    mailer: Arc<MailNotifier>,
    payment_window_sec: u64,
}

impl FinalizationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        auctions: Arc<AuctionStore>,
        ledger: Arc<BidLedger>,
        carts: Arc<CartStore>,
        catalog: Arc<CatalogStore>,
        cooldown: Arc<BidCooldown>,
        hub: Arc<EventHub>,
        mailer: Arc<MailNotifier>,
        payment_window_sec: u64,
    ) -> Self {
        Self {
            auctions,
            ledger,
            carts,
            catalog,
            cooldown,
            hub,
            mailer,
            payment_window_sec,
        }
    }

    /// オークションを確定する。冪等。
    pub fn finalize(&self, auction_id: &str) -> Result<FinalizeOutcome, FinalizeError> {
        let row = self
            .auctions
            .row(auction_id)
            .ok_or(FinalizeError::AuctionNotFound)?;

        let mut auction = row.lock().unwrap();
        if auction.status == AuctionStatus::Ended {
            return Ok(FinalizeOutcome::AlreadyEnded);
        }

        // 勝者は行ロック下で台帳から決める。以降の入札は同じロックで
        // 弾かれるため、ここで読んだ最高入札が最終結果になる。
        let winner = self.ledger.top_bid(auction_id);
        let now_ms = now_millis();

        if let Some(ref bid) = winner {
            // ホールド作成まで済ませてから状態を進める。ここで失敗する
            // 経路は無い（インメモリ書き込みのみ）が、順序は維持する。
            self.carts.replace_hold(CartHold {
                unit_id: auction.unit_id.clone(),
                user_id: bid.bidder_id.clone(),
                auction_id: auction_id.to_string(),
                amount: bid.amount,
                created_at_ms: now_ms,
            });
            auction.current_price = bid.amount;
        }
        auction.status = AuctionStatus::Ended;
        let unit_id = auction.unit_id.clone();
        let final_price = auction.current_price;
        drop(auction);

        self.cooldown.clear(auction_id);

        // 通知はすべてコミット後。失敗しても確定は巻き戻らない。
        let status_data = serde_json::json!({
            "auctionId": auction_id,
            "status": AuctionStatus::Ended.as_str(),
            "finalPrice": final_price,
            "winnerId": winner.as_ref().map(|b| b.bidder_id.clone()),
        })
        .to_string();
        self.hub
            .publish_auction(auction_id, "auction:status", &status_data);
        self.hub.publish_global("auction:status", &status_data);

        if let Some(ref bid) = winner {
            let win_data = serde_json::json!({
                "auctionId": auction_id,
                "unitId": unit_id,
                "amount": bid.amount,
            })
            .to_string();
            self.hub
                .publish_user(&bid.bidder_id, "auction:win", &win_data);
            self.mailer.send(
                &bid.bidder_id,
                "auction_won",
                serde_json::json!({
                    "unitTitle": self.catalog.title_of(&unit_id),
                    "finalPrice": bid.amount,
                    "paymentWindowSec": self.payment_window_sec,
                }),
            );
        }

        Ok(FinalizeOutcome::Settled { winner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Auction;

    fn engine() -> FinalizationEngine {
        FinalizationEngine::new(
            Arc::new(AuctionStore::new()),
            Arc::new(BidLedger::new()),
            Arc::new(CartStore::new()),
            Arc::new(CatalogStore::new()),
            Arc::new(BidCooldown::new(60)),
            Arc::new(EventHub::new()),
            Arc::new(MailNotifier::from_env()),
            86_400,
        )
    }

    fn ended_due_auction(engine: &FinalizationEngine, id: &str) {
        let now = now_millis();
        let mut auction = Auction::new(
            id.into(),
            format!("unit_{id}"),
            1_000,
            100,
            now.saturating_sub(60_000),
            now.saturating_sub(1_000),
        );
        auction.status = AuctionStatus::Active;
        engine.auctions.insert(auction);
    }

    #[tokio::test]
    async fn test_finalize_picks_top_bid_and_holds_cart() {
        let engine = engine();
        ended_due_auction(&engine, "a1");
        engine.ledger.append("a1", "alice", 1_000);
        engine.ledger.append("a1", "bob", 1_200);

        let outcome = engine.finalize("a1").unwrap();
        match outcome {
            FinalizeOutcome::Settled { winner: Some(bid) } => {
                assert_eq!(bid.bidder_id, "bob");
                assert_eq!(bid.amount, 1_200);
            }
            other => panic!("expected winner, got {:?}", other),
        }

        let auction = engine.auctions.snapshot("a1").unwrap();
        assert_eq!(auction.status, AuctionStatus::Ended);
        assert_eq!(auction.current_price, 1_200);

        let hold = engine.carts.hold_for_unit("unit_a1").unwrap();
        assert_eq!(hold.user_id, "bob");
        assert_eq!(hold.amount, 1_200);
    }

    #[tokio::test]
    async fn test_double_finalize_is_idempotent() {
        let engine = engine();
        ended_due_auction(&engine, "a1");
        engine.ledger.append("a1", "alice", 1_000);

        assert!(matches!(
            engine.finalize("a1").unwrap(),
            FinalizeOutcome::Settled { .. }
        ));
        // 再実行はショートサーキットし、ホールドを作り直さない
        assert!(matches!(
            engine.finalize("a1").unwrap(),
            FinalizeOutcome::AlreadyEnded
        ));
        assert_eq!(engine.carts.count(), 1);

        // 落札メールも初回の1通だけ（無効化メーラーはdroppedで数えられる）
        let mail = engine.mailer.metrics();
        assert_eq!(mail.queued + mail.dropped, 1);
    }

    #[tokio::test]
    async fn test_finalize_with_no_bids() {
        let engine = engine();
        ended_due_auction(&engine, "a1");

        let outcome = engine.finalize("a1").unwrap();
        assert!(matches!(
            outcome,
            FinalizeOutcome::Settled { winner: None }
        ));
        assert_eq!(engine.carts.count(), 0);
        assert_eq!(
            engine.auctions.snapshot("a1").unwrap().status,
            AuctionStatus::Ended
        );
    }

    #[tokio::test]
    async fn test_equal_amount_earliest_wins() {
        let engine = engine();
        ended_due_auction(&engine, "a1");
        // 同額なら先着（seq昇順）が勝つ
        engine.ledger.append("a1", "alice", 2_000);
        engine.ledger.append("a1", "bob", 2_000);

        match engine.finalize("a1").unwrap() {
            FinalizeOutcome::Settled { winner: Some(bid) } => {
                assert_eq!(bid.bidder_id, "alice");
            }
            other => panic!("expected alice to win, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_finalize_missing_auction() {
        let engine = engine();
        assert_eq!(
            engine.finalize("missing").unwrap_err(),
            FinalizeError::AuctionNotFound
        );
    }
}
