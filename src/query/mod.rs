// region:    --- Imports
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::auction::model::{Auction, AuctionSnapshot, AuctionStatus, BidView};
use crate::auction::state_machine;
use crate::error::BidResult;
use crate::event_stream::EventBus;
use crate::scheduler;
use crate::store::AuctionStore;

// endregion: --- Imports

// region:    --- Status Poller

/// 권장 폴링 주기 임계값 (초)
const NEAR_BOUNDARY_SECS: i64 = 120;
const SOON_BOUNDARY_SECS: i64 = 300;

/// 일괄 상태 조회 응답
#[derive(Debug, Serialize)]
pub struct StatusBatch {
    pub statuses: HashMap<i64, AuctionStatus>,
    pub recommended_interval_seconds: u64,
}

/// 일괄 상태 조회
/// 읽기 잠금만 사용하며, 경계가 지났는데 미확정인 경매는 잠금 경합이 없을 때만
/// 이 자리에서 확정한다 (경합 시 스위퍼의 다음 틱에 맡긴다).
pub async fn get_statuses(store: &AuctionStore, bus: &EventBus, ids: &[i64]) -> StatusBatch {
    info!("{:<12} --> 일괄 상태 조회: {:?}", "Query", ids);
    let now = Utc::now();
    let mut statuses = HashMap::new();
    let mut nearest: Option<i64> = None;

    for &id in ids {
        // 존재하지 않는 경매는 응답에서 제외한다
        let Ok(cell) = store.cell(id) else { continue };
        let (status, unsettled) = {
            let auction = cell.read().await;
            let status = state_machine::resolve_status(&auction, now);
            if let Some(d) = boundary_distance(&auction, status, now) {
                nearest = Some(nearest.map_or(d, |n| n.min(d)));
            }
            (status, !auction.settled)
        };

        if status == AuctionStatus::Ended && unsettled {
            if let Ok(mut auction) = cell.try_write() {
                scheduler::apply_transition(&mut auction, bus, now);
            }
        }
        statuses.insert(id, status);
    }

    StatusBatch {
        statuses,
        recommended_interval_seconds: recommended_interval(nearest),
    }
}

/// 다음 상태 경계까지 남은 시간 (초)
/// 경계를 이미 지났지만 확정 대기 중이면 0으로 본다.
fn boundary_distance(auction: &Auction, status: AuctionStatus, now: DateTime<Utc>) -> Option<i64> {
    match status {
        AuctionStatus::Pending => Some((auction.start_time - now).num_seconds().max(0)),
        AuctionStatus::Active => Some((auction.end_time - now).num_seconds().max(0)),
        AuctionStatus::Ended if !auction.settled => Some(0),
        _ => None,
    }
}

/// 권장 재폴링 주기
/// 푸시 구독(/events)을 쓰지 못하는 클라이언트를 위한 차선책이다.
pub fn recommended_interval(nearest_boundary_secs: Option<i64>) -> u64 {
    match nearest_boundary_secs {
        Some(d) if d <= NEAR_BOUNDARY_SECS => 1,
        Some(d) if d <= SOON_BOUNDARY_SECS => 5,
        _ => 10,
    }
}

// endregion: --- Status Poller

// region:    --- Query Handlers

/// 경매 스냅샷 조회
/// 경계가 지났는데 미확정이면 이 기회에 확정한다 (lazy 전이).
pub async fn get_auction(
    store: &AuctionStore,
    bus: &EventBus,
    auction_id: i64,
    viewer_id: Option<i64>,
) -> BidResult<AuctionSnapshot> {
    info!("{:<12} --> 경매 조회 id: {}", "Query", auction_id);
    let now = Utc::now();
    {
        let auction = store.read(auction_id).await?;
        let status = state_machine::resolve_status(&auction, now);
        if auction.settled || status != AuctionStatus::Ended {
            return Ok(auction.snapshot_for(now, viewer_id));
        }
    }
    let mut auction = store.write(auction_id).await?;
    scheduler::apply_transition(&mut auction, bus, now);
    Ok(auction.snapshot_for(now, viewer_id))
}

/// 입찰 이력 조회 (최신순, 취소된 입찰 포함)
/// 자동 입찰 상한은 조회자 본인의 입찰 행에만 담긴다.
pub async fn get_bid_history(
    store: &AuctionStore,
    auction_id: i64,
    viewer_id: Option<i64>,
) -> BidResult<Vec<BidView>> {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "Query", auction_id);
    let auction = store.read(auction_id).await?;
    Ok(auction
        .ledger
        .history()
        .iter()
        .rev()
        .map(|b| b.view_for(viewer_id))
        .collect())
}

// endregion: --- Query Handlers

// region:    --- Tests
#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::store::test_support::auction_fixture;

    #[test]
    fn interval_is_one_second_near_a_boundary() {
        assert_eq!(recommended_interval(Some(0)), 1);
        assert_eq!(recommended_interval(Some(120)), 1);
    }

    #[test]
    fn interval_is_five_seconds_within_five_minutes() {
        assert_eq!(recommended_interval(Some(121)), 5);
        assert_eq!(recommended_interval(Some(300)), 5);
    }

    #[test]
    fn interval_is_ten_seconds_otherwise() {
        assert_eq!(recommended_interval(Some(301)), 10);
        assert_eq!(recommended_interval(None), 10);
    }

    #[test]
    fn boundary_distance_tracks_next_transition() {
        let now = Utc::now();

        let pending = auction_fixture(now + Duration::seconds(60), now + Duration::hours(1));
        assert_eq!(
            boundary_distance(&pending, AuctionStatus::Pending, now),
            Some(60)
        );

        let active = auction_fixture(now - Duration::seconds(1), now + Duration::seconds(200));
        assert_eq!(
            boundary_distance(&active, AuctionStatus::Active, now),
            Some(200)
        );

        // 경계를 지났지만 확정 전: 스윕 대기로 보고 0
        let overdue = auction_fixture(now - Duration::hours(2), now - Duration::seconds(5));
        assert_eq!(
            boundary_distance(&overdue, AuctionStatus::Ended, now),
            Some(0)
        );

        let mut settled = auction_fixture(now - Duration::hours(2), now - Duration::seconds(5));
        settled.settled = true;
        assert_eq!(
            boundary_distance(&settled, AuctionStatus::Ended, now),
            None
        );
    }
}
// endregion: --- Tests
