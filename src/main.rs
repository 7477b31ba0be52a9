// region:    --- Imports
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use bidding_engine::event_stream::EventBus;
use bidding_engine::handlers::{self, AppState};
use bidding_engine::payment::DemoPaymentInitiator;
use bidding_engine::scheduler::AuctionSweeper;
use bidding_engine::store::AuctionStore;

// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // 경매 저장소 및 이벤트 버스 생성
    let store = Arc::new(AuctionStore::new());
    let bus = Arc::new(EventBus::new());

    // 상태 전이 스위퍼 시작
    let sweep_interval_ms = std::env::var("SWEEP_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1000);
    let sweeper = AuctionSweeper::new(
        Arc::clone(&store),
        Arc::clone(&bus),
        Duration::from_millis(sweep_interval_ms),
    );
    sweeper.start();
    info!(
        "{:<12} --> 스위퍼 시작: 주기 {}ms",
        "Main", sweep_interval_ms
    );

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        store,
        bus,
        payments: Arc::new(DemoPaymentInitiator),
    };

    // 라우터 설정
    let routes_all = Router::new()
        .route("/auctions", post(handlers::handle_create_auction))
        .route("/auctions/statuses", get(handlers::handle_get_statuses))
        .route("/auctions/:id", get(handlers::handle_get_auction))
        .route(
            "/auctions/:id/bids",
            post(handlers::handle_bid).get(handlers::handle_get_bid_history),
        )
        .route("/auctions/:id/buy-now", post(handlers::handle_buy_now))
        .route("/auctions/:id/events", get(handlers::handle_subscribe))
        .route(
            "/auctions/:id/payments",
            post(handlers::handle_initiate_payment),
        )
        .route(
            "/auctions/:id/payments/confirm",
            post(handlers::handle_confirm_payment),
        )
        .route("/bids/:id", delete(handlers::handle_cancel_bid))
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state);

    // 리스너 생성
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
