// region:    --- Imports
use chrono::{DateTime, Utc};

use crate::auction::model::{Auction, AuctionStatus};

// endregion: --- Imports

// region:    --- State Machine

/// 상태 전이 규칙 (순수 함수)
/// 저장된 플래그를 신뢰하지 않고 매 조회마다 시간 기준으로 다시 계산한다.
pub fn resolve_status(auction: &Auction, now: DateTime<Utc>) -> AuctionStatus {
    if auction.payment_completed_at.is_some() {
        AuctionStatus::Completed
    } else if auction.buy_now_closed || now >= auction.end_time {
        AuctionStatus::Ended
    } else if now >= auction.start_time {
        AuctionStatus::Active
    } else {
        AuctionStatus::Pending
    }
}

/// active→ended 에지에서 낙찰자를 단 한 번 확정한다.
/// 이미 확정된 경매에 재호출하면 아무 일도 하지 않는다 (멱등).
/// reserve가 설정되어 있고 미충족이면 낙찰자 없이 종료로 기록한다.
pub fn settle_if_ended(auction: &mut Auction, now: DateTime<Utc>) -> bool {
    if auction.settled || resolve_status(auction, now) != AuctionStatus::Ended {
        return false;
    }

    let reserve_ok = auction
        .reserve_price
        .map_or(true, |r| auction.current_bid_price >= r);
    auction.reserve_met_at_close = reserve_ok;
    auction.winner_id = if reserve_ok {
        auction.ledger.winning_bid().map(|b| b.bidder_id)
    } else {
        None
    };
    auction.settled = true;
    true
}

// endregion: --- State Machine

// endregion: --- Tests
