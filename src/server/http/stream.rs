//! SSE API（非同期通知の配信口）:
//! - 役割: 入札・状態遷移・落札をリアルタイム配信し、UI更新の即時性を担保する。
//! - 入口: `/auctions/{id}/stream`（ルーム単位）、`/users/{id}/stream`（ユーザー単位）、
//!   `/stream`（全体）。
//! - 実体: `EventHub` のbroadcastをそのままlive配信する。

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::events::FanoutEvent;

use super::AppState;

fn live_stream(rx: Receiver<FanoutEvent>) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|result| {
        result.ok().map(|event| {
            Ok(Event::default()
                .id(event.id.to_string())
                .event(event.event_type)
                .data(event.data))
        })
    })
}

fn sse_with_keepalive(
    stream: impl Stream<Item = Result<Event, Infallible>> + Send + 'static,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

/// オークションルームSSE（GET /auctions/{auction_id}/stream）
/// - bid:new / auction:status が流れる
pub(super) async fn handle_auction_stream(
    State(state): State<AppState>,
    Path(auction_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sse_with_keepalive(live_stream(state.hub.subscribe_auction(&auction_id)))
}

/// ユーザー個別SSE（GET /users/{user_id}/stream）
/// - auction:win が流れる
pub(super) async fn handle_user_stream(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sse_with_keepalive(live_stream(state.hub.subscribe_user(&user_id)))
}

/// 全体SSE（GET /stream）
/// - 全オークションの状態遷移をまとめて受信（ダッシュボード向け）
pub(super) async fn handle_global_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sse_with_keepalive(live_stream(state.hub.subscribe_global()))
}
