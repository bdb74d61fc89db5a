//! 入場ゲートAPI:
//! - /entry/codes: 入場コードの発行（コード本体はメールでのみ届く）。
//! - /entry/verifications: コード検証。成功でそのユーザーの入札が解禁される。

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;

use crate::entry_gate::EntryReject;

use super::{AppState, ErrorResponse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct EntryCodeRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct EntryCodeResponse {
    pub user_id: String,
    pub sent: bool,
}

/// 入場コード発行（POST /entry/codes）
/// - コード本体はメールでのみ届く。レスポンスには含めない。
pub(super) async fn handle_request_entry_code(
    State(state): State<AppState>,
    Json(req): Json<EntryCodeRequest>,
) -> Result<(StatusCode, Json<EntryCodeResponse>), (StatusCode, Json<ErrorResponse>)> {
    match state.entry_gate.request_code(&req.user_id) {
        Ok(()) => {
            state
                .entry_codes_issued_total
                .fetch_add(1, Ordering::Relaxed);
            Ok((
                StatusCode::ACCEPTED,
                Json(EntryCodeResponse {
                    user_id: req.user_id,
                    sent: true,
                }),
            ))
        }
        Err(EntryReject::PermanentlyBanned) => {
            state.entry_rejected_total.fetch_add(1, Ordering::Relaxed);
            Err((
                StatusCode::FORBIDDEN,
                ErrorResponse::code(EntryReject::PermanentlyBanned.as_str()),
            ))
        }
        Err(other) => {
            state.entry_rejected_total.fetch_add(1, Ordering::Relaxed);
            Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::code(other.as_str()),
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct EntryVerifyRequest {
    pub user_id: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct EntryVerifyResponse {
    pub user_id: String,
    pub verified: bool,
}

/// 入場コード検証（POST /entry/verifications）
/// - 失敗理由は区別せずINVALID_CODEで返す（コード推測の手掛かりを与えない）
pub(super) async fn handle_verify_entry_code(
    State(state): State<AppState>,
    Json(req): Json<EntryVerifyRequest>,
) -> Result<Json<EntryVerifyResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.entry_gate.verify_code(&req.user_id, &req.code) {
        Ok(()) => {
            state.entry_verified_total.fetch_add(1, Ordering::Relaxed);
            Ok(Json(EntryVerifyResponse {
                user_id: req.user_id,
                verified: true,
            }))
        }
        Err(reject) => {
            state.entry_rejected_total.fetch_add(1, Ordering::Relaxed);
            Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::code(reject.as_str()),
            ))
        }
    }
}
