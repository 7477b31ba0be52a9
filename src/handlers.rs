// region:    --- Imports
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::bidding::commands::{
    handle_buy_now as command_handle_buy_now, handle_cancel_bid as command_handle_cancel_bid,
    handle_place_bid, BuyNowCommand, CancelBidCommand, PlaceBidCommand,
};
use crate::error::{BidError, BidResult};
use crate::event_stream::EventBus;
use crate::payment::{self, PaymentInitiator, PaymentKind};
use crate::query;
use crate::store::{AuctionStore, CreateAuctionCommand};

// endregion: --- Imports

// region:    --- App State

/// 핸들러 공유 상태
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AuctionStore>,
    pub bus: Arc<EventBus>,
    pub payments: Arc<dyn PaymentInitiator>,
}

// endregion: --- App State

// region:    --- Command Handlers

/// 경매 생성 요청 처리
pub async fn handle_create_auction(
    State(state): State<AppState>,
    Json(cmd): Json<CreateAuctionCommand>,
) -> BidResult<impl IntoResponse> {
    info!("{:<12} --> 경매 생성 요청 처리: {:?}", "Handler", cmd);
    let snapshot = state.store.create(cmd, Utc::now())?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// 입찰 요청 본문
#[derive(Debug, Deserialize)]
pub struct PlaceBidRequest {
    pub bidder_id: i64,
    pub amount: i64,
    pub max_bid_amount: Option<i64>,
}

/// 입찰 요청 처리
pub async fn handle_bid(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(req): Json<PlaceBidRequest>,
) -> BidResult<impl IntoResponse> {
    let cmd = PlaceBidCommand {
        auction_id,
        bidder_id: req.bidder_id,
        amount: req.amount,
        max_bid_amount: req.max_bid_amount,
    };
    let (auction, bid) = handle_place_bid(cmd, &state.store, &state.bus).await?;
    Ok(Json(serde_json::json!({
        "auction": auction,
        "bid": bid,
    })))
}

/// 즉시 구매 요청 본문
#[derive(Debug, Deserialize)]
pub struct BuyNowRequest {
    pub bidder_id: i64,
}

/// 즉시 구매 요청 처리
pub async fn handle_buy_now(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(req): Json<BuyNowRequest>,
) -> BidResult<impl IntoResponse> {
    let cmd = BuyNowCommand {
        auction_id,
        bidder_id: req.bidder_id,
    };
    let auction = command_handle_buy_now(cmd, &state.store, &state.bus).await?;
    Ok(Json(serde_json::json!({ "auction": auction })))
}

/// 입찰 취소 요청 본문
#[derive(Debug, Deserialize)]
pub struct CancelBidRequest {
    pub requester_id: i64,
}

/// 입찰 취소 요청 처리 (멱등)
pub async fn handle_cancel_bid(
    State(state): State<AppState>,
    Path(bid_id): Path<i64>,
    Json(req): Json<CancelBidRequest>,
) -> BidResult<impl IntoResponse> {
    let cmd = CancelBidCommand {
        bid_id,
        requester_id: req.requester_id,
    };
    let auction = command_handle_cancel_bid(cmd, &state.store, &state.bus).await?;
    Ok(Json(serde_json::json!({ "ok": true, "auction": auction })))
}

/// 결제 시작 요청 본문
#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub kind: PaymentKind,
}

/// 결제 시작 요청 처리
pub async fn handle_initiate_payment(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(req): Json<InitiatePaymentRequest>,
) -> BidResult<impl IntoResponse> {
    let directive = payment::handle_initiate_payment(
        &state.store,
        &state.bus,
        state.payments.as_ref(),
        auction_id,
        req.kind,
    )
    .await?;
    Ok(Json(directive))
}

/// 결제 완료 콜백 처리
pub async fn handle_confirm_payment(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> BidResult<impl IntoResponse> {
    let auction = payment::handle_confirm_payment(&state.store, &state.bus, auction_id).await?;
    Ok(Json(serde_json::json!({ "auction": auction })))
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 조회자 식별 (판매자에게만 reserve 관련 필드가 보인다)
#[derive(Debug, Deserialize)]
pub struct ViewerQuery {
    pub viewer_id: Option<i64>,
}

/// 경매 스냅샷 조회
pub async fn handle_get_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Query(viewer): Query<ViewerQuery>,
) -> BidResult<impl IntoResponse> {
    let snapshot =
        query::get_auction(&state.store, &state.bus, auction_id, viewer.viewer_id).await?;
    Ok(Json(snapshot))
}

/// 입찰 이력 조회 (최신순, 취소된 입찰 포함)
/// 자동 입찰 상한은 viewer_id 본인의 행에만 실린다.
pub async fn handle_get_bid_history(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Query(viewer): Query<ViewerQuery>,
) -> BidResult<impl IntoResponse> {
    let history = query::get_bid_history(&state.store, auction_id, viewer.viewer_id).await?;
    Ok(Json(history))
}

/// 일괄 상태 조회 쿼리 (ids는 쉼표 구분)
#[derive(Debug, Deserialize)]
pub struct StatusesQuery {
    pub ids: String,
}

/// 일괄 상태 조회 처리
pub async fn handle_get_statuses(
    State(state): State<AppState>,
    Query(q): Query<StatusesQuery>,
) -> impl IntoResponse {
    let ids: Vec<i64> = q
        .ids
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    let batch = query::get_statuses(&state.store, &state.bus, &ids).await;
    Json(batch)
}

/// 경매 이벤트 구독 (SSE)
/// seq가 단조 증가하므로 클라이언트는 중복 수신을 seq로 제거하고,
/// seq 공백을 보면 스냅샷 재조회로 복구한다.
pub async fn handle_subscribe(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> BidResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    info!("{:<12} --> 이벤트 구독 시작: auction_id={}", "Handler", auction_id);
    state.store.cell(auction_id)?;
    let rx = state.bus.subscribe(auction_id);
    let stream = BroadcastStream::new(rx).filter_map(|res| match res {
        Ok(ev) => Event::default()
            .id(ev.seq.to_string())
            .json_data(&ev)
            .ok()
            .map(Ok::<_, Infallible>),
        // 버퍼를 넘긴 구독자는 일부 이벤트를 놓친다
        Err(_) => None,
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// endregion: --- Query Handlers
