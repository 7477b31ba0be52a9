// region:    --- Imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auction::model::AuctionStatus;

// endregion: --- Imports

// region:    --- Auction Events

/// 경매 이벤트
/// 경매 단위 브로드캐스트 채널로 발행되어 구독자에게 전달된다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuctionEvent {
    /// 입찰 이벤트
    BidPlaced {
        auction_id: i64,
        bid_id: i64,
        bidder_id: i64,
        bid_amount: i64,
        current_bid_price: i64,
        timestamp: DateTime<Utc>,
    },
    /// 프록시 자동 상향 이벤트
    ProxyEscalated {
        auction_id: i64,
        bid_id: i64,
        bidder_id: i64,
        bid_amount: i64,
        timestamp: DateTime<Utc>,
    },
    /// 입찰 취소 이벤트
    BidCancelled {
        auction_id: i64,
        bid_id: i64,
        current_bid_price: i64,
        timestamp: DateTime<Utc>,
    },
    /// 즉시 구매 이벤트
    BuyNowExecuted {
        auction_id: i64,
        buyer_id: i64,
        price: i64,
        timestamp: DateTime<Utc>,
    },
    /// 상태 전이 이벤트
    StatusChanged {
        auction_id: i64,
        status: AuctionStatus,
        winner_id: Option<i64>,
        timestamp: DateTime<Utc>,
    },
    /// 결제 완료 이벤트
    PaymentCompleted {
        auction_id: i64,
        timestamp: DateTime<Utc>,
    },
}

/// 구독자에게 전달되는 이벤트 포장
/// seq는 경매 단위로 단조 증가하며, 클라이언트는 이 값으로 중복을 제거한다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub seq: u64,
    #[serde(flatten)]
    pub event: AuctionEvent,
}

// endregion: --- Auction Events
