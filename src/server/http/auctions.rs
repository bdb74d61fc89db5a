//! オークションAPI（登録 / 入札 / 履歴 / 落札結果）:
//! - 役割: 入札の同期境界。検証→確定→ACKまでをこのパスで返す。
//! - 入場検証を済ませていないユーザーの入札はここで止める。

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use tracing::{debug, info};
use uuid::Uuid;

use crate::arbitration::BidReject;
use crate::store::{Auction, AuctionStatus, Bid, CatalogUnit};

use super::{AppState, ErrorResponse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateAuctionRequest {
    pub auction_id: Option<String>,
    pub unit_id: String,
    pub title: Option<String>,
    pub base_price: Option<u64>,
    pub price_step: Option<u64>,
    pub start_at_ms: u64,
    pub end_at_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AuctionResponse {
    pub auction_id: String,
    pub unit_id: String,
    pub status: &'static str,
    pub current_price: u64,
    pub price_step: u64,
    pub start_at_ms: u64,
    pub end_at_ms: u64,
}

impl AuctionResponse {
    fn from_auction(auction: &Auction) -> Self {
        Self {
            auction_id: auction.auction_id.clone(),
            unit_id: auction.unit_id.clone(),
            status: auction.status.as_str(),
            current_price: auction.current_price,
            price_step: auction.price_step,
            start_at_ms: auction.start_at_ms,
            end_at_ms: auction.end_at_ms,
        }
    }
}

/// オークション登録（POST /auctions）
/// - 価格属性はリクエスト指定を優先し、無ければカタログから引く
pub(super) async fn handle_create_auction(
    State(state): State<AppState>,
    Json(req): Json<CreateAuctionRequest>,
) -> Result<(StatusCode, Json<AuctionResponse>), (StatusCode, Json<ErrorResponse>)> {
    if req.end_at_ms <= req.start_at_ms {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorResponse::code("INVALID_WINDOW"),
        ));
    }

    let catalog_unit = state.catalog.get(&req.unit_id);
    let base_price = req
        .base_price
        .or_else(|| catalog_unit.as_ref().map(|u| u.base_price));
    let price_step = req
        .price_step
        .or_else(|| catalog_unit.as_ref().map(|u| u.price_step));
    let (Some(base_price), Some(price_step)) = (base_price, price_step) else {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorResponse::code("UNKNOWN_UNIT"),
        ));
    };
    if price_step == 0 {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorResponse::code("INVALID_PRICE_STEP"),
        ));
    }

    // カタログ未登録ユニットはここで読み取りモデルに載せる
    if catalog_unit.is_none() {
        state.catalog.put(CatalogUnit {
            unit_id: req.unit_id.clone(),
            title: req.title.clone().unwrap_or_else(|| req.unit_id.clone()),
            base_price,
            price_step,
        });
    }

    let auction_id = req
        .auction_id
        .unwrap_or_else(|| format!("auc_{}", Uuid::new_v4()));
    let auction = Auction::new(
        auction_id.clone(),
        req.unit_id,
        base_price,
        price_step,
        req.start_at_ms,
        req.end_at_ms,
    );
    let response = AuctionResponse::from_auction(&auction);

    if !state.auctions.insert(auction) {
        return Err((
            StatusCode::CONFLICT,
            ErrorResponse::code("DUPLICATE_AUCTION"),
        ));
    }

    state
        .auctions_created_total
        .fetch_add(1, Ordering::Relaxed);
    info!(auction_id = %auction_id, "auction registered");

    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PlaceBidRequest {
    pub bidder_id: String,
    pub amount: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BidAcceptResponse {
    pub bid_id: String,
    pub auction_id: String,
    pub bidder_id: String,
    pub amount: u64,
    pub current_price: u64,
    pub placed_at_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BidRejectResponse {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_left: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_required: Option<u64>,
}

fn reject_status(reject: &BidReject) -> StatusCode {
    match reject {
        BidReject::AuctionNotFound => StatusCode::NOT_FOUND,
        BidReject::AuctionNotActive | BidReject::AuctionExpired => StatusCode::CONFLICT,
        BidReject::Cooldown { .. } => StatusCode::TOO_MANY_REQUESTS,
        BidReject::SelfOutbid | BidReject::BidTooLow { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

/// 入札受付（POST /auctions/{auction_id}/bids）
/// - 手順: 入場検証 → 裁定（検証と確定は行ロック下で直列化）→ ACK
pub(super) async fn handle_place_bid(
    State(state): State<AppState>,
    Path(auction_id): Path<String>,
    Json(req): Json<PlaceBidRequest>,
) -> Result<Json<BidAcceptResponse>, (StatusCode, Json<BidRejectResponse>)> {
    if !state.entry_gate.is_cleared(&req.bidder_id) {
        state
            .bids_entry_blocked_total
            .fetch_add(1, Ordering::Relaxed);
        return Err((
            StatusCode::FORBIDDEN,
            Json(BidRejectResponse {
                error: "ENTRY_REQUIRED",
                seconds_left: None,
                min_required: None,
            }),
        ));
    }

    match state
        .arbitration
        .place_bid(&auction_id, &req.bidder_id, req.amount)
    {
        Ok(accept) => {
            state.bids_accepted_total.fetch_add(1, Ordering::Relaxed);
            Ok(Json(BidAcceptResponse {
                bid_id: accept.bid.bid_id,
                auction_id,
                bidder_id: accept.bid.bidder_id,
                amount: accept.bid.amount,
                current_price: accept.current_price,
                placed_at_ms: accept.bid.placed_at_ms,
            }))
        }
        Err(reject) => {
            state.bids_rejected_total.fetch_add(1, Ordering::Relaxed);
            debug!(
                auction_id = %auction_id,
                bidder_id = %req.bidder_id,
                reason = reject.as_str(),
                "bid rejected"
            );
            let (seconds_left, min_required) = match reject {
                BidReject::Cooldown { seconds_left } => (Some(seconds_left), None),
                BidReject::BidTooLow { min_required } => (None, Some(min_required)),
                _ => (None, None),
            };
            Err((
                reject_status(&reject),
                Json(BidRejectResponse {
                    error: reject.as_str(),
                    seconds_left,
                    min_required,
                }),
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct BidPageQuery {
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BidRow {
    pub bid_id: String,
    pub bidder_id: String,
    pub amount: u64,
    pub placed_at_ms: u64,
}

impl BidRow {
    fn from_bid(bid: &Bid) -> Self {
        Self {
            bid_id: bid.bid_id.clone(),
            bidder_id: bid.bidder_id.clone(),
            amount: bid.amount,
            placed_at_ms: bid.placed_at_ms,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BidPageResponse {
    pub auction_id: String,
    pub bids: Vec<BidRow>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

/// 入札履歴（GET /auctions/{auction_id}/bids）
/// - 金額降順・同額なら先着順のページング取得
pub(super) async fn handle_list_bids(
    State(state): State<AppState>,
    Path(auction_id): Path<String>,
    Query(query): Query<BidPageQuery>,
) -> Result<Json<BidPageResponse>, (StatusCode, Json<ErrorResponse>)> {
    if state.auctions.snapshot(&auction_id).is_none() {
        return Err((
            StatusCode::NOT_FOUND,
            ErrorResponse::code("AUCTION_NOT_FOUND"),
        ));
    }

    let limit = query.limit.clamp(1, 100);
    let (rows, total) = state.ledger.page(&auction_id, query.page, limit);
    Ok(Json(BidPageResponse {
        auction_id,
        bids: rows.iter().map(BidRow::from_bid).collect(),
        total,
        page: query.page,
        limit,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WinnerResponse {
    pub auction_id: String,
    pub final_price: u64,
    pub winner: Option<BidRow>,
    pub ended_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_deadline_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<&'static str>,
}

/// チェックアウト記録と期限から支払い状況を導出する。
/// ホールドの有無では判定しない（期限切れ掃除で消えたホールドを
/// 支払い済みと誤認しないため）。
fn payment_status(checked_out: bool, now_ms: u64, deadline_ms: u64) -> &'static str {
    if checked_out {
        "COMPLETED"
    } else if now_ms > deadline_ms {
        "EXPIRED"
    } else {
        "PENDING"
    }
}

/// 落札結果（GET /auctions/{auction_id}/winner）
/// - 終了前は409。入札ゼロで終了した場合はwinnerがnull。
pub(super) async fn handle_get_winner(
    State(state): State<AppState>,
    Path(auction_id): Path<String>,
) -> Result<Json<WinnerResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(auction) = state.auctions.snapshot(&auction_id) else {
        return Err((
            StatusCode::NOT_FOUND,
            ErrorResponse::code("AUCTION_NOT_FOUND"),
        ));
    };
    if auction.status != AuctionStatus::Ended {
        return Err((
            StatusCode::CONFLICT,
            ErrorResponse::code("AUCTION_NOT_ENDED"),
        ));
    }

    let winner = state.ledger.top_bid(&auction_id);
    let (payment_deadline_ms, status) = match &winner {
        Some(_) => {
            let deadline = auction
                .end_at_ms
                .saturating_add(state.payment_window_sec.saturating_mul(1000));
            let status = payment_status(
                state.carts.was_checked_out(&auction_id),
                crate::store::now_millis(),
                deadline,
            );
            (Some(deadline), Some(status))
        }
        None => (None, None),
    };
    Ok(Json(WinnerResponse {
        auction_id,
        final_price: auction.current_price,
        winner: winner.as_ref().map(BidRow::from_bid),
        ended_at_ms: auction.end_at_ms,
        payment_deadline_ms,
        payment_status: status,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_derivation() {
        // チェックアウト済みなら期限に関係なくCOMPLETED
        assert_eq!(payment_status(true, 2_000, 1_000), "COMPLETED");
        // 期限内・未払いはPENDING
        assert_eq!(payment_status(false, 500, 1_000), "PENDING");
        // 期限超過・未チェックアウトはEXPIRED。掃除でホールドが消えた
        // 後もこの導出は変わらない（ホールドの有無を見ていない）。
        assert_eq!(payment_status(false, 2_000, 1_000), "EXPIRED");
    }
}
