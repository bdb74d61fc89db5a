//! 内部API（決済・チェックアウトサービスからの呼び出し口）:
//! - /internal/users/{id}/missed-payments: 支払い期限切れの通知を受けて
//!   ペナルティを適用する。
//! - /internal/users/{id}/credits: 残高の積み増し（入金反映）。
//! - /internal/users/{id}/wallet: 残高・未払い回数・台帳の参照。
//! - /internal/units/{unit_id}/checkouts: チェックアウト完了でカート
//!   ホールドを消費する。
//! いずれも外部公開しない前提のルート。

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use tracing::info;

use super::{AppState, ErrorResponse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MissedPaymentRequest {
    pub amount_owed: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MissedPaymentResponse {
    pub user_id: String,
    pub fee_requested: u64,
    pub deducted: u64,
    pub payment_failures: u32,
    pub banned: bool,
}

/// 未払いペナルティ適用（POST /internal/users/{user_id}/missed-payments）
/// - 残高不足でも未払い回数は進む
pub(super) async fn handle_missed_payment(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<MissedPaymentRequest>,
) -> Json<MissedPaymentResponse> {
    let charge = state
        .penalty
        .charge_missed_payment_fee(&user_id, req.amount_owed);
    state
        .penalties_charged_total
        .fetch_add(1, Ordering::Relaxed);
    if charge.banned {
        info!(user_id = %user_id, "user permanently banned");
    }

    Json(MissedPaymentResponse {
        user_id,
        fee_requested: charge.fee_requested,
        deducted: charge.deducted,
        payment_failures: charge.payment_failures,
        banned: charge.banned,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreditRequest {
    pub amount: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WalletEntryRow {
    pub amount: u64,
    pub reason: String,
    pub at_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WalletResponse {
    pub user_id: String,
    pub balance: u64,
    pub payment_failures: u32,
    pub banned: bool,
    pub entries: Vec<WalletEntryRow>,
}

fn wallet_response(state: &AppState, user_id: String) -> WalletResponse {
    let account = state.users.account(&user_id);
    let entries = state
        .users
        .ledger_for(&user_id)
        .into_iter()
        .map(|e| WalletEntryRow {
            amount: e.amount,
            reason: e.reason,
            at_ms: e.at_ms,
        })
        .collect();
    WalletResponse {
        banned: state.penalty.is_banned(&user_id),
        balance: account.as_ref().map(|a| a.balance).unwrap_or(0),
        payment_failures: account.as_ref().map(|a| a.payment_failures).unwrap_or(0),
        user_id,
        entries,
    }
}

/// 入金反映（POST /internal/users/{user_id}/credits）
pub(super) async fn handle_credit_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<CreditRequest>,
) -> Json<WalletResponse> {
    state.users.credit(&user_id, req.amount);
    Json(wallet_response(&state, user_id))
}

/// ウォレット参照（GET /internal/users/{user_id}/wallet）
pub(super) async fn handle_get_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<WalletResponse> {
    Json(wallet_response(&state, user_id))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CheckoutResponse {
    pub unit_id: String,
    pub user_id: String,
    pub auction_id: String,
    pub amount: u64,
}

/// チェックアウト完了（POST /internal/units/{unit_id}/checkouts）
/// - 落札者の支払いが済んだ時点でホールドを消費する
pub(super) async fn handle_consume_hold(
    State(state): State<AppState>,
    Path(unit_id): Path<String>,
) -> Result<Json<CheckoutResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(hold) = state.carts.consume_hold(&unit_id) else {
        return Err((
            StatusCode::NOT_FOUND,
            ErrorResponse::code("HOLD_NOT_FOUND"),
        ));
    };

    info!(unit_id = %unit_id, user_id = %hold.user_id, "cart hold consumed");
    Ok(Json(CheckoutResponse {
        unit_id: hold.unit_id,
        user_id: hold.user_id,
        auction_id: hold.auction_id,
        amount: hold.amount,
    }))
}
