//! Auction Gateway - ライブオークションサブシステム
//!
//! 限定在庫の競り上げ式オークションを担当するサービス。入札の裁定、
//! ライフサイクル駆動、落札確定、入場ゲート、未払いペナルティ、
//! リアルタイム通知をひとつのプロセスで提供する。
//!
//! ## 起動方法
//! ```bash
//! AUCTION_PORT=8082 cargo run --release
//! ```
//!
//! ## 全体フロー（超要約）
//! 1) 入場コードを検証したユーザーがHTTPで入札
//! 2) 裁定サービスが行ロック下で検証・確定（同時入札は直列化）
//! 3) スケジューラが毎秒掃引し、開始/終了時刻を迎えた行を遷移させる
//! 4) 精算エンジンが勝者を確定し、カートホールドを作成
//! 5) SSEとメールで結果を通知（すべてコミット後・best-effort）
//!
//! ## 環境変数
//! - `AUCTION_PORT`: HTTPサーバーのポート（デフォルト: 8082）
//! - `RUST_LOG`: ログレベル（デフォルト: info）

mod arbitration;
mod config;
mod cooldown;
mod entry_gate;
mod events;
mod lifecycle;
mod notifier;
mod penalty;
mod server;
mod settlement;
mod store;

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) プロセス初期化（ログ + 設定）
    init_tracing();
    let config = config::Config::from_env();
    info!("Auction gateway starting with config: {:?}", config);

    // 2) ストアと配信基盤の初期化
    let auctions = Arc::new(store::AuctionStore::new());
    let ledger = Arc::new(store::BidLedger::new());
    let carts = Arc::new(store::CartStore::new());
    let catalog = Arc::new(store::CatalogStore::new());
    let users = Arc::new(store::UserStore::new());
    let cooldown = Arc::new(cooldown::BidCooldown::new(config.bid_cooldown_sec));
    let hub = Arc::new(events::EventHub::with_capacity(
        config.event_channel_capacity,
    ));
    let mailer = Arc::new(notifier::MailNotifier::from_env());
    info!(
        "Stores initialized (mailer enabled={})",
        mailer.is_enabled()
    );

    // 3) ドメインサービスの組み立て
    let arbitration = Arc::new(arbitration::BidArbitrationService::new(
        Arc::clone(&auctions),
        Arc::clone(&ledger),
        Arc::clone(&cooldown),
        Arc::clone(&hub),
    ));
    let settlement = Arc::new(settlement::FinalizationEngine::new(
        Arc::clone(&auctions),
        Arc::clone(&ledger),
        Arc::clone(&carts),
        Arc::clone(&catalog),
        Arc::clone(&cooldown),
        Arc::clone(&hub),
        Arc::clone(&mailer),
        config.payment_window_sec,
    ));
    let penalty = Arc::new(penalty::PaymentPenaltyEngine::new(
        Arc::clone(&users),
        Arc::clone(&mailer),
        config.penalty_rate_pct,
        config.strike_limit,
    ));
    let entry_gate = Arc::new(entry_gate::EntryGate::new(
        Arc::clone(&users),
        Arc::clone(&mailer),
        config.otp_ttl_sec,
        config.strike_limit,
    ));

    // 4) バックグラウンドのライフサイクル掃引を起動
    Arc::new(lifecycle::LifecycleScheduler::new(
        Arc::clone(&auctions),
        Arc::clone(&carts),
        Arc::clone(&settlement),
        Arc::clone(&hub),
        config.sweep_interval_ms,
        config.stale_hold_ttl_sec,
    ))
    .start();

    // 5) HTTPサーバー起動
    let deps = server::http::HttpDeps {
        auctions,
        ledger,
        carts,
        catalog,
        users,
        hub,
        mailer,
        arbitration,
        penalty,
        entry_gate,
        payment_window_sec: config.payment_window_sec,
    };
    server::http::run(config.port, deps).await?;

    Ok(())
}

/// ログ出力基盤を初期化する。
/// `RUST_LOG` が無い場合は `info,auction_gateway=debug` を既定値に使う。
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,auction_gateway=debug".into()),
        )
        .init();
}
