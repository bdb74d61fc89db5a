//! 運用API（観測の入口）:
//! - 役割: ストア規模・スケジューラ・メール配信の稼働状態を取得する。
//! - 位置: 運用監視のための読み取り専用パス。
//! - 内包: health と Prometheus metrics の出力。

use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::atomic::Ordering;

use super::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct HealthResponse {
    pub status: String,
    pub auctions: usize,
    pub cart_holds: usize,
    pub lifecycle_sweeps: u64,
}

/// ヘルスチェック（GET /health）
pub(super) async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let lifecycle = crate::lifecycle::metrics();
    Json(HealthResponse {
        status: "OK".into(),
        auctions: state.auctions.count(),
        cart_holds: state.carts.count(),
        lifecycle_sweeps: lifecycle.sweeps,
    })
}

/// メトリクス（GET /metrics）
/// - 入札/入場/ペナルティ/スケジューラ/メールをPrometheus形式で出力
pub(super) async fn handle_metrics(State(state): State<AppState>) -> String {
    let lifecycle = crate::lifecycle::metrics();
    let mail = state.mailer.metrics();
    let mail_enabled = if mail.enabled { 1 } else { 0 };

    format!(
        "# HELP auction_auctions Current registered auction count\n\
         # TYPE auction_auctions gauge\n\
         auction_auctions {}\n\
         # HELP auction_cart_holds Current cart hold count\n\
         # TYPE auction_cart_holds gauge\n\
         auction_cart_holds {}\n\
         # HELP auction_created_total Total auctions registered\n\
         # TYPE auction_created_total counter\n\
         auction_created_total {}\n\
         # HELP auction_bids_accepted_total Total bids accepted\n\
         # TYPE auction_bids_accepted_total counter\n\
         auction_bids_accepted_total {}\n\
         # HELP auction_bids_rejected_total Total bids rejected by arbitration\n\
         # TYPE auction_bids_rejected_total counter\n\
         auction_bids_rejected_total {}\n\
         # HELP auction_bids_entry_blocked_total Total bids blocked by entry gate\n\
         # TYPE auction_bids_entry_blocked_total counter\n\
         auction_bids_entry_blocked_total {}\n\
         # HELP auction_entry_codes_issued_total Total entry codes issued\n\
         # TYPE auction_entry_codes_issued_total counter\n\
         auction_entry_codes_issued_total {}\n\
         # HELP auction_entry_verified_total Total entry verifications succeeded\n\
         # TYPE auction_entry_verified_total counter\n\
         auction_entry_verified_total {}\n\
         # HELP auction_entry_rejected_total Total entry requests rejected\n\
         # TYPE auction_entry_rejected_total counter\n\
         auction_entry_rejected_total {}\n\
         # HELP auction_penalties_charged_total Total missed payment fees charged\n\
         # TYPE auction_penalties_charged_total counter\n\
         auction_penalties_charged_total {}\n\
         # HELP auction_lifecycle_sweeps_total Total lifecycle sweeps executed\n\
         # TYPE auction_lifecycle_sweeps_total counter\n\
         auction_lifecycle_sweeps_total {}\n\
         # HELP auction_lifecycle_activated_total Total auctions activated by scheduler\n\
         # TYPE auction_lifecycle_activated_total counter\n\
         auction_lifecycle_activated_total {}\n\
         # HELP auction_lifecycle_settled_total Total auctions settled by scheduler\n\
         # TYPE auction_lifecycle_settled_total counter\n\
         auction_lifecycle_settled_total {}\n\
         # HELP auction_lifecycle_settle_errors_total Total settlement errors in scheduler\n\
         # TYPE auction_lifecycle_settle_errors_total counter\n\
         auction_lifecycle_settle_errors_total {}\n\
         # HELP auction_lifecycle_stale_holds_removed_total Total stale cart holds removed\n\
         # TYPE auction_lifecycle_stale_holds_removed_total counter\n\
         auction_lifecycle_stale_holds_removed_total {}\n\
         # HELP auction_mail_enabled Mail delivery enabled (1/0)\n\
         # TYPE auction_mail_enabled gauge\n\
         auction_mail_enabled {}\n\
         # HELP auction_mail_queued_total Total mails queued\n\
         # TYPE auction_mail_queued_total counter\n\
         auction_mail_queued_total {}\n\
         # HELP auction_mail_delivered_total Total mails delivered\n\
         # TYPE auction_mail_delivered_total counter\n\
         auction_mail_delivered_total {}\n\
         # HELP auction_mail_failed_total Total mail delivery failures\n\
         # TYPE auction_mail_failed_total counter\n\
         auction_mail_failed_total {}\n\
         # HELP auction_mail_dropped_total Total mails dropped (delivery disabled)\n\
         # TYPE auction_mail_dropped_total counter\n\
         auction_mail_dropped_total {}\n",
        state.auctions.count(),
        state.carts.count(),
        state.auctions_created_total.load(Ordering::Relaxed),
        state.bids_accepted_total.load(Ordering::Relaxed),
        state.bids_rejected_total.load(Ordering::Relaxed),
        state.bids_entry_blocked_total.load(Ordering::Relaxed),
        state.entry_codes_issued_total.load(Ordering::Relaxed),
        state.entry_verified_total.load(Ordering::Relaxed),
        state.entry_rejected_total.load(Ordering::Relaxed),
        state.penalties_charged_total.load(Ordering::Relaxed),
        lifecycle.sweeps,
        lifecycle.activated,
        lifecycle.settled,
        lifecycle.settle_errors,
        lifecycle.stale_holds_removed,
        mail_enabled,
        mail.queued,
        mail.delivered,
        mail.failed,
        mail.dropped,
    )
}
