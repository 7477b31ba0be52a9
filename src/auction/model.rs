// region:    --- Imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auction::state_machine;
use crate::ledger::BidLedger;

// endregion: --- Imports

// region:    --- Auction Status

/// 경매 상태
/// 저장된 값은 참고용일 뿐, 모든 판단은 (레코드, now)의 순수 함수로 다시 계산한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    Pending,
    Active,
    Ended,
    Completed,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Pending => "pending",
            AuctionStatus::Active => "active",
            AuctionStatus::Ended => "ended",
            AuctionStatus::Completed => "completed",
        }
    }
}

// endregion: --- Auction Status

// region:    --- Bid Model

/// 입찰 모델
/// 원장에 추가된 이후에는 is_winning 플립과 cancelled_at 기록 외에는 변경되지 않는다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub bid_amount: i64,
    /// 자동 입찰 상한 (프록시 입찰일 때만 존재, 입찰자 외에는 비공개)
    pub max_bid_amount: Option<i64>,
    pub is_winning: bool,
    /// 프록시 자동 상향으로 엔진이 생성한 입찰 여부
    pub auto: bool,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Bid {
    /// 조회자 권한에 따른 이력 투영
    /// 자동 입찰 상한은 해당 입찰의 입찰자 본인에게만 보인다.
    pub fn view_for(&self, viewer_id: Option<i64>) -> BidView {
        let is_owner = viewer_id == Some(self.bidder_id);
        BidView {
            id: self.id,
            auction_id: self.auction_id,
            bidder_id: self.bidder_id,
            bid_amount: self.bid_amount,
            max_bid_amount: if is_owner { self.max_bid_amount } else { None },
            is_winning: self.is_winning,
            auto: self.auto,
            created_at: self.created_at,
            cancelled_at: self.cancelled_at,
        }
    }
}

/// 입찰 이력 투영 (클라이언트 응답용)
#[derive(Debug, Clone, Serialize)]
pub struct BidView {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub bid_amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bid_amount: Option<i64>,
    pub is_winning: bool,
    pub auto: bool,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

// endregion: --- Bid Model

// region:    --- Auction Model

/// 경매 레코드
/// 가격/낙찰자 필드는 BidGateway의 경매 단위 임계 구역 안에서만 변경된다.
#[derive(Debug)]
pub struct Auction {
    pub id: i64,
    pub seller_id: i64,
    pub title: String,
    pub description: String,
    pub starting_price: i64,
    /// 비공개 최저 낙찰가 (입찰자에게는 충족 여부만 노출)
    pub reserve_price: Option<i64>,
    pub buy_now_price: Option<i64>,
    pub bid_increment: i64,
    pub current_bid_price: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub winner_id: Option<i64>,
    pub payment_completed_at: Option<DateTime<Utc>>,
    /// 즉시 구매로 종료 시각 이전에 마감된 경우 true
    pub buy_now_closed: bool,
    /// active→ended 전이가 이미 확정(낙찰자 기록)되었는지 여부
    pub settled: bool,
    /// 확정 시점의 reserve 충족 여부 (settled 이후에만 의미 있음)
    pub reserve_met_at_close: bool,
    /// 상태 변경 이벤트를 마지막으로 발행한 상태
    pub announced: AuctionStatus,
    /// 경매 단위 이벤트 시퀀스 (쓰기 잠금 안에서만 증가)
    pub event_seq: u64,
    pub created_at: DateTime<Utc>,
    pub ledger: BidLedger,
}

impl Auction {
    /// 다음 최소 입찰가
    /// 입찰이 없으면 시작가 자체가 최소 입찰가가 된다.
    pub fn next_minimum_bid(&self) -> i64 {
        match self.ledger.winning_bid() {
            Some(_) => self.current_bid_price + self.bid_increment,
            None => self.starting_price,
        }
    }

    /// reserve 충족 여부 (reserve가 없으면 None)
    pub fn reserve_met(&self) -> Option<bool> {
        self.reserve_price.map(|r| self.current_bid_price >= r)
    }

    /// 다음 이벤트 시퀀스 발급
    pub fn next_seq(&mut self) -> u64 {
        self.event_seq += 1;
        self.event_seq
    }

    /// 입찰자 관점 스냅샷
    pub fn snapshot(&self, now: DateTime<Utc>) -> AuctionSnapshot {
        self.snapshot_for(now, None)
    }

    /// 조회자 권한에 따른 스냅샷 투영
    /// reserve_price와 "reserve 미충족 종료" 여부는 판매자에게만 보인다.
    pub fn snapshot_for(&self, now: DateTime<Utc>, viewer_id: Option<i64>) -> AuctionSnapshot {
        let is_seller = viewer_id == Some(self.seller_id);
        AuctionSnapshot {
            id: self.id,
            seller_id: self.seller_id,
            title: self.title.clone(),
            starting_price: self.starting_price,
            bid_increment: self.bid_increment,
            current_bid_price: self.current_bid_price,
            next_minimum_bid: self.next_minimum_bid(),
            buy_now_price: self.buy_now_price,
            status: state_machine::resolve_status(self, now),
            start_time: self.start_time,
            end_time: self.end_time,
            winner_id: self.winner_id,
            bid_count: self.ledger.standing_count(),
            reserve_met: self.reserve_met(),
            reserve_price: if is_seller { self.reserve_price } else { None },
            reserve_not_met: if is_seller && self.settled && self.reserve_price.is_some() {
                Some(!self.reserve_met_at_close)
            } else {
                None
            },
            payment_completed_at: self.payment_completed_at,
        }
    }
}

/// 경매 스냅샷 (클라이언트 응답용 투영)
#[derive(Debug, Clone, Serialize)]
pub struct AuctionSnapshot {
    pub id: i64,
    pub seller_id: i64,
    pub title: String,
    pub starting_price: i64,
    pub bid_increment: i64,
    pub current_bid_price: i64,
    pub next_minimum_bid: i64,
    pub buy_now_price: Option<i64>,
    pub status: AuctionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub winner_id: Option<i64>,
    pub bid_count: usize,
    pub reserve_met: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserve_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserve_not_met: Option<bool>,
    pub payment_completed_at: Option<DateTime<Utc>>,
}

// endregion: --- Auction Model

// endregion: --- Tests
