//! ライフサイクルスケジューラ
//!
//! SWEEP_INTERVAL_MSごとに全オークションを掃引し、開始時刻を迎えた行の
//! 活性化と終了時刻を迎えた行の精算を駆動する。精算自体は冪等なので、
//! 掃引が遅延・重複しても結果は変わらない（遅れて一度だけ確定する）。
//! 併せて期限切れカートホールドの掃除も行う。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::events::EventHub;
use crate::settlement::FinalizationEngine;
use crate::store::{now_millis, AuctionStatus, AuctionStore, CartStore};

static SWEEPS_TOTAL: AtomicU64 = AtomicU64::new(0);
static ACTIVATED_TOTAL: AtomicU64 = AtomicU64::new(0);
static SETTLED_TOTAL: AtomicU64 = AtomicU64::new(0);
static SETTLE_ERRORS_TOTAL: AtomicU64 = AtomicU64::new(0);
static STALE_HOLDS_REMOVED_TOTAL: AtomicU64 = AtomicU64::new(0);

/// スケジューラのメトリクススナップショット
pub struct LifecycleMetrics {
    pub sweeps: u64,
    pub activated: u64,
    pub settled: u64,
    pub settle_errors: u64,
    pub stale_holds_removed: u64,
}

pub fn metrics() -> LifecycleMetrics {
    LifecycleMetrics {
        sweeps: SWEEPS_TOTAL.load(Ordering::Relaxed),
        activated: ACTIVATED_TOTAL.load(Ordering::Relaxed),
        settled: SETTLED_TOTAL.load(Ordering::Relaxed),
        settle_errors: SETTLE_ERRORS_TOTAL.load(Ordering::Relaxed),
        stale_holds_removed: STALE_HOLDS_REMOVED_TOTAL.load(Ordering::Relaxed),
    }
}

/// ライフサイクルスケジューラ
pub struct LifecycleScheduler {
    auctions: Arc<AuctionStore>,
    carts: Arc<CartStore>,
    engine: Arc<FinalizationEngine>,
    hub: Arc<EventHub>,
    sweep_interval_ms: u64,
    stale_hold_ttl_ms: u64,
}

impl LifecycleScheduler {
    pub fn new(
        auctions: Arc<AuctionStore>,
        carts: Arc<CartStore>,
        engine: Arc<FinalizationEngine>,
        hub: Arc<EventHub>,
        sweep_interval_ms: u64,
        stale_hold_ttl_sec: u64,
    ) -> Self {
        Self {
            auctions,
            carts,
            engine,
            hub,
            sweep_interval_ms,
            stale_hold_ttl_ms: stale_hold_ttl_sec.saturating_mul(1000),
        }
    }

    /// 掃引ループを起動する
    pub fn start(self: Arc<Self>) {
        let interval_ms = self.sweep_interval_ms.max(100);
        info!(interval_ms = interval_ms, "lifecycle scheduler started");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            loop {
                ticker.tick().await;
                self.sweep_once();
            }
        });
    }

    /// 1回分の掃引。テストから直接呼べるよう同期関数にしている。
    pub fn sweep_once(&self) {
        SWEEPS_TOTAL.fetch_add(1, Ordering::Relaxed);
        let now_ms = now_millis();

        for auction_id in self.auctions.ids_due_activation(now_ms) {
            self.activate(&auction_id, now_ms);
        }

        for auction_id in self.auctions.ids_due_settlement(now_ms) {
            match self.engine.finalize(&auction_id) {
                Ok(crate::settlement::FinalizeOutcome::Settled { .. }) => {
                    SETTLED_TOTAL.fetch_add(1, Ordering::Relaxed);
                }
                Ok(crate::settlement::FinalizeOutcome::AlreadyEnded) => {
                    // 前回掃引との競合。何もしない。
                    debug!(auction_id = %auction_id, "already settled");
                }
                Err(err) => {
                    // 失敗した行は次回掃引で再試行される
                    SETTLE_ERRORS_TOTAL.fetch_add(1, Ordering::Relaxed);
                    error!(auction_id = %auction_id, reason = err.as_str(), "settlement failed");
                }
            }
        }

        if self.stale_hold_ttl_ms > 0 {
            let cutoff = now_ms.saturating_sub(self.stale_hold_ttl_ms);
            let removed = self.carts.remove_created_before(cutoff);
            if removed > 0 {
                STALE_HOLDS_REMOVED_TOTAL.fetch_add(removed as u64, Ordering::Relaxed);
                info!(removed = removed, "stale cart holds removed");
            }
        }
    }

    fn activate(&self, auction_id: &str, now_ms: u64) {
        let Some(row) = self.auctions.row(auction_id) else {
            return;
        };
        let mut auction = row.lock().unwrap();
        // 一覧取得とロック取得の間に状態が進んでいる可能性がある
        if !auction.is_due_activation(now_ms) {
            return;
        }
        auction.status = AuctionStatus::Active;
        let current_price = auction.current_price;
        drop(auction);

        ACTIVATED_TOTAL.fetch_add(1, Ordering::Relaxed);
        info!(auction_id = %auction_id, "auction activated");

        let data = serde_json::json!({
            "auctionId": auction_id,
            "status": AuctionStatus::Active.as_str(),
            "currentPrice": current_price,
        })
        .to_string();
        self.hub.publish_auction(auction_id, "auction:status", &data);
        self.hub.publish_global("auction:status", &data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cooldown::BidCooldown;
    use crate::notifier::MailNotifier;
    use crate::store::{Auction, BidLedger, CartHold, CatalogStore};

    fn scheduler() -> Arc<LifecycleScheduler> {
        let auctions = Arc::new(AuctionStore::new());
        let ledger = Arc::new(BidLedger::new());
        let carts = Arc::new(CartStore::new());
        let hub = Arc::new(EventHub::new());
        let engine = Arc::new(FinalizationEngine::new(
            Arc::clone(&auctions),
            Arc::clone(&ledger),
            Arc::clone(&carts),
            Arc::new(CatalogStore::new()),
            Arc::new(BidCooldown::new(60)),
            Arc::clone(&hub),
            Arc::new(MailNotifier::from_env()),
            86_400,
        ));
        Arc::new(LifecycleScheduler::new(
            auctions,
            carts,
            engine,
            hub,
            1_000,
            259_200,
        ))
    }

    #[tokio::test]
    async fn test_sweep_activates_due_auction() {
        let scheduler = scheduler();
        let now = now_millis();
        scheduler.auctions.insert(Auction::new(
            "a1".into(),
            "unit_a1".into(),
            1_000,
            100,
            now.saturating_sub(1_000),
            now + 3_600_000,
        ));

        scheduler.sweep_once();
        assert_eq!(
            scheduler.auctions.snapshot("a1").unwrap().status,
            AuctionStatus::Active
        );
    }

    #[tokio::test]
    async fn test_sweep_settles_expired_auction() {
        let scheduler = scheduler();
        let now = now_millis();
        let mut auction = Auction::new(
            "a1".into(),
            "unit_a1".into(),
            1_000,
            100,
            now.saturating_sub(60_000),
            now.saturating_sub(1_000),
        );
        auction.status = AuctionStatus::Active;
        scheduler.auctions.insert(auction);

        scheduler.sweep_once();
        assert_eq!(
            scheduler.auctions.snapshot("a1").unwrap().status,
            AuctionStatus::Ended
        );

        // 2回目の掃引でENDEDの行を再処理しない
        scheduler.sweep_once();
        assert_eq!(
            scheduler.auctions.snapshot("a1").unwrap().status,
            AuctionStatus::Ended
        );
    }

    #[tokio::test]
    async fn test_sweep_skips_future_auction() {
        let scheduler = scheduler();
        let now = now_millis();
        scheduler.auctions.insert(Auction::new(
            "a1".into(),
            "unit_a1".into(),
            1_000,
            100,
            now + 60_000,
            now + 120_000,
        ));

        scheduler.sweep_once();
        assert_eq!(
            scheduler.auctions.snapshot("a1").unwrap().status,
            AuctionStatus::Upcoming
        );
    }

    #[tokio::test]
    async fn test_sweep_removes_stale_holds() {
        let scheduler = scheduler();
        scheduler.carts.replace_hold(CartHold {
            unit_id: "unit_1".into(),
            user_id: "u1".into(),
            auction_id: "a1".into(),
            amount: 1_000,
            created_at_ms: 0,
        });

        scheduler.sweep_once();
        assert_eq!(scheduler.carts.count(), 0);
    }

    #[tokio::test]
    async fn test_stale_cleanup_is_not_a_checkout() {
        let auctions = Arc::new(AuctionStore::new());
        let ledger = Arc::new(BidLedger::new());
        let carts = Arc::new(CartStore::new());
        let hub = Arc::new(EventHub::new());
        let engine = Arc::new(FinalizationEngine::new(
            Arc::clone(&auctions),
            Arc::clone(&ledger),
            Arc::clone(&carts),
            Arc::new(CatalogStore::new()),
            Arc::new(BidCooldown::new(60)),
            Arc::clone(&hub),
            Arc::new(MailNotifier::from_env()),
            86_400,
        ));
        let scheduler = Arc::new(LifecycleScheduler::new(
            Arc::clone(&auctions),
            Arc::clone(&carts),
            engine,
            hub,
            1_000,
            259_200,
        ));

        let now = now_millis();
        let mut auction = Auction::new(
            "a1".into(),
            "unit_a1".into(),
            1_000,
            100,
            now.saturating_sub(60_000),
            now.saturating_sub(1_000),
        );
        auction.status = AuctionStatus::Active;
        auctions.insert(auction);
        ledger.append("a1", "alice", 1_500);

        scheduler.sweep_once();
        let hold = scheduler.carts.hold_for_unit("unit_a1").unwrap();
        assert_eq!(hold.user_id, "alice");

        // 落札者が支払わないままホールドが期限切れ掃除で消えるケース
        let mut stale = hold;
        stale.created_at_ms = 0;
        scheduler.carts.replace_hold(stale);
        scheduler.sweep_once();

        // 掃除による削除は支払い完了の記録を残さない
        assert!(scheduler.carts.hold_for_unit("unit_a1").is_none());
        assert!(!scheduler.carts.was_checked_out("a1"));
    }
}
