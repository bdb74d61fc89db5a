//! HTTPサーバー（オークション入口層）
//!
//! 位置づけ:
//! - このモジュールは「HTTP入口層」。入札受付→裁定→ファンアウトへの橋渡しを担う。
//! - 入口のルーティングをここに集約し、実処理はサブモジュールに分離する。
//!
//! ハンドラの分類（ユーザ用 / 内部用 / 運用用）:
//! - ユーザ向け:
//!   - /auctions: オークション登録。
//!   - /auctions/{id}/bids: 入札の受付と履歴取得。
//!   - /auctions/{id}/winner: 終了後の落札結果取得。
//!   - /auctions/{id}/stream: オークションルームのリアルタイム通知。
//!   - /users/{id}/stream: ユーザー個別のリアルタイム通知。
//!   - /stream: 全体配信（ダッシュボード向け）。
//!   - /entry/codes, /entry/verifications: 入場コードの発行と検証。
//! - 内部向け:
//!   - /internal/users/{id}/missed-payments: 未払いペナルティの適用。
//!   - /internal/users/{id}/credits, /internal/users/{id}/wallet: 残高操作と参照。
//!   - /internal/units/{unit_id}/checkouts: チェックアウト完了によるホールド消費。
//! - 運用向け:
//!   - /health: 稼働確認。
//!   - /metrics: Prometheus用の観測出力。

// ハンドラはドメイン別に分割（オークション / 入場 / SSE / メトリクス）
mod auctions;
mod entry;
mod internal;
mod metrics;
mod stream;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::arbitration::BidArbitrationService;
use crate::entry_gate::EntryGate;
use crate::events::EventHub;
use crate::notifier::MailNotifier;
use crate::penalty::PaymentPenaltyEngine;
use crate::store::{AuctionStore, BidLedger, CartStore, CatalogStore, UserStore};

use auctions::{handle_create_auction, handle_get_winner, handle_list_bids, handle_place_bid};
use entry::{handle_request_entry_code, handle_verify_entry_code};
use internal::{
    handle_consume_hold, handle_credit_user, handle_get_wallet, handle_missed_payment,
};
use metrics::{handle_health, handle_metrics};
use stream::{handle_auction_stream, handle_global_stream, handle_user_stream};

/// アプリケーション状態
#[derive(Clone)]
pub(super) struct AppState {
    pub(super) auctions: Arc<AuctionStore>,
    pub(super) ledger: Arc<BidLedger>,
    pub(super) carts: Arc<CartStore>,
    pub(super) catalog: Arc<CatalogStore>,
    pub(super) users: Arc<UserStore>,
    pub(super) hub: Arc<EventHub>,
    pub(super) mailer: Arc<MailNotifier>,
    pub(super) arbitration: Arc<BidArbitrationService>,
    pub(super) penalty: Arc<PaymentPenaltyEngine>,
    pub(super) entry_gate: Arc<EntryGate>,
    pub(super) payment_window_sec: u64,
    pub(super) auctions_created_total: Arc<AtomicU64>,
    pub(super) bids_accepted_total: Arc<AtomicU64>,
    pub(super) bids_rejected_total: Arc<AtomicU64>,
    pub(super) bids_entry_blocked_total: Arc<AtomicU64>,
    pub(super) entry_codes_issued_total: Arc<AtomicU64>,
    pub(super) entry_verified_total: Arc<AtomicU64>,
    pub(super) entry_rejected_total: Arc<AtomicU64>,
    pub(super) penalties_charged_total: Arc<AtomicU64>,
}

/// エラーレスポンス
#[derive(serde::Serialize)]
pub(super) struct ErrorResponse {
    pub(super) error: String,
}

impl ErrorResponse {
    pub(super) fn code(code: &str) -> axum::Json<Self> {
        axum::Json(Self { error: code.into() })
    }
}

/// ハンドラに渡す共有サービス一式
pub struct HttpDeps {
    pub auctions: Arc<AuctionStore>,
    pub ledger: Arc<BidLedger>,
    pub carts: Arc<CartStore>,
    pub catalog: Arc<CatalogStore>,
    pub users: Arc<UserStore>,
    pub hub: Arc<EventHub>,
    pub mailer: Arc<MailNotifier>,
    pub arbitration: Arc<BidArbitrationService>,
    pub penalty: Arc<PaymentPenaltyEngine>,
    pub entry_gate: Arc<EntryGate>,
    pub payment_window_sec: u64,
}

/// HTTPサーバーを起動
pub async fn run(port: u16, deps: HttpDeps) -> anyhow::Result<()> {
    let state = AppState {
        auctions: deps.auctions,
        ledger: deps.ledger,
        carts: deps.carts,
        catalog: deps.catalog,
        users: deps.users,
        hub: deps.hub,
        mailer: deps.mailer,
        arbitration: deps.arbitration,
        penalty: deps.penalty,
        entry_gate: deps.entry_gate,
        payment_window_sec: deps.payment_window_sec,
        auctions_created_total: Arc::new(AtomicU64::new(0)),
        bids_accepted_total: Arc::new(AtomicU64::new(0)),
        bids_rejected_total: Arc::new(AtomicU64::new(0)),
        bids_entry_blocked_total: Arc::new(AtomicU64::new(0)),
        entry_codes_issued_total: Arc::new(AtomicU64::new(0)),
        entry_verified_total: Arc::new(AtomicU64::new(0)),
        entry_rejected_total: Arc::new(AtomicU64::new(0)),
        penalties_charged_total: Arc::new(AtomicU64::new(0)),
    };

    let app = Router::new()
        .route("/auctions", post(handle_create_auction))
        .route(
            "/auctions/{auction_id}/bids",
            post(handle_place_bid).get(handle_list_bids),
        )
        .route("/auctions/{auction_id}/winner", get(handle_get_winner))
        .route("/auctions/{auction_id}/stream", get(handle_auction_stream))
        .route("/users/{user_id}/stream", get(handle_user_stream))
        .route("/stream", get(handle_global_stream))
        .route("/entry/codes", post(handle_request_entry_code))
        .route("/entry/verifications", post(handle_verify_entry_code))
        .route(
            "/internal/users/{user_id}/missed-payments",
            post(handle_missed_payment),
        )
        .route("/internal/users/{user_id}/credits", post(handle_credit_user))
        .route("/internal/users/{user_id}/wallet", get(handle_get_wallet))
        .route(
            "/internal/units/{unit_id}/checkouts",
            post(handle_consume_hold),
        )
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
