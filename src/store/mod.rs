// region:    --- Imports
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tokio::time::timeout;
use tracing::info;

use crate::auction::model::{Auction, AuctionSnapshot, AuctionStatus};
use crate::error::{BidError, BidResult};
use crate::ledger::BidLedger;

// endregion: --- Imports

// region:    --- Auction Store

/// 쓰기 잠금 획득 제한 시간. 초과 시 대기열에 쌓지 않고 재시도 가능 오류로 즉시 실패한다.
pub const LOCK_DEADLINE: Duration = Duration::from_secs(2);

/// 경매 생성 명령
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuctionCommand {
    pub seller_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub starting_price: i64,
    pub reserve_price: Option<i64>,
    pub buy_now_price: Option<i64>,
    pub bid_increment: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// 경매 상태 저장소
/// 경매별 RwLock 셀을 샤딩된 테이블(DashMap)에 보관한다.
/// 같은 경매에 대한 쓰기는 직렬화되고, 서로 다른 경매는 완전히 병렬로 진행된다.
pub struct AuctionStore {
    cells: DashMap<i64, Arc<RwLock<Auction>>>,
    /// 입찰 id → 경매 id 인덱스 (취소 경로에서 역참조용)
    bid_index: DashMap<i64, i64>,
    next_auction_id: AtomicI64,
    next_bid_id: AtomicI64,
}

impl Default for AuctionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuctionStore {
    pub fn new() -> Self {
        Self {
            cells: DashMap::new(),
            bid_index: DashMap::new(),
            next_auction_id: AtomicI64::new(1),
            next_bid_id: AtomicI64::new(1),
        }
    }

    /// 경매 생성
    pub fn create(&self, cmd: CreateAuctionCommand, now: DateTime<Utc>) -> BidResult<AuctionSnapshot> {
        if cmd.starting_price <= 0 {
            return Err(BidError::InvalidAuction("시작가는 0보다 커야 합니다.".into()));
        }
        if cmd.bid_increment <= 0 {
            return Err(BidError::InvalidAuction(
                "입찰 단위는 0보다 커야 합니다.".into(),
            ));
        }
        if cmd.start_time >= cmd.end_time {
            return Err(BidError::InvalidAuction(
                "시작 시간은 종료 시간보다 빨라야 합니다.".into(),
            ));
        }
        if let Some(r) = cmd.reserve_price {
            if r <= cmd.starting_price {
                return Err(BidError::InvalidAuction(
                    "최저 낙찰가는 시작가보다 커야 합니다.".into(),
                ));
            }
        }
        if let Some(b) = cmd.buy_now_price {
            if b <= cmd.starting_price {
                return Err(BidError::InvalidAuction(
                    "즉시 구매 가격은 시작가보다 커야 합니다.".into(),
                ));
            }
        }

        let id = self.next_auction_id.fetch_add(1, Ordering::Relaxed);
        let auction = Auction {
            id,
            seller_id: cmd.seller_id,
            title: cmd.title,
            description: cmd.description,
            starting_price: cmd.starting_price,
            reserve_price: cmd.reserve_price,
            buy_now_price: cmd.buy_now_price,
            bid_increment: cmd.bid_increment,
            current_bid_price: cmd.starting_price,
            start_time: cmd.start_time,
            end_time: cmd.end_time,
            winner_id: None,
            payment_completed_at: None,
            buy_now_closed: false,
            settled: false,
            reserve_met_at_close: false,
            announced: if now >= cmd.start_time {
                AuctionStatus::Active
            } else {
                AuctionStatus::Pending
            },
            event_seq: 0,
            created_at: now,
            ledger: BidLedger::new(),
        };
        let snapshot = auction.snapshot(now);
        info!(
            "{:<12} --> 경매 생성: id={}, seller_id={}, 시작가={}",
            "Store", id, snapshot.seller_id, snapshot.starting_price
        );
        self.cells.insert(id, Arc::new(RwLock::new(auction)));
        Ok(snapshot)
    }

    /// 경매 셀 조회
    pub fn cell(&self, auction_id: i64) -> BidResult<Arc<RwLock<Auction>>> {
        self.cells
            .get(&auction_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or(BidError::AuctionNotFound(auction_id))
    }

    /// 쓰기 잠금 획득 (경매 단위 임계 구역, 제한 시간 내 실패 시 LockTimeout)
    pub async fn write(&self, auction_id: i64) -> BidResult<OwnedRwLockWriteGuard<Auction>> {
        let cell = self.cell(auction_id)?;
        timeout(LOCK_DEADLINE, cell.write_owned())
            .await
            .map_err(|_| BidError::LockTimeout)
    }

    /// 읽기 잠금 획득
    /// 쓰기 잠금의 점유 시간이 짧게 제한되어 있으므로 읽기는 제한 시간 없이 대기한다.
    pub async fn read(&self, auction_id: i64) -> BidResult<OwnedRwLockReadGuard<Auction>> {
        let cell = self.cell(auction_id)?;
        Ok(cell.read_owned().await)
    }

    /// 전체 경매 id 목록 (스위퍼 순회용)
    pub fn ids(&self) -> Vec<i64> {
        self.cells.iter().map(|e| *e.key()).collect()
    }

    /// 전역 입찰 id 발급
    pub fn allocate_bid_id(&self) -> i64 {
        self.next_bid_id.fetch_add(1, Ordering::Relaxed)
    }

    /// 입찰 id 인덱스 등록
    pub fn index_bid(&self, bid_id: i64, auction_id: i64) {
        self.bid_index.insert(bid_id, auction_id);
    }

    /// 입찰이 속한 경매 조회
    pub fn auction_of_bid(&self, bid_id: i64) -> BidResult<i64> {
        self.bid_index
            .get(&bid_id)
            .map(|e| *e.value())
            .ok_or(BidError::BidNotFound(bid_id))
    }
}

// endregion: --- Auction Store

// endregion: --- Test Support

// region:    --- Tests
#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn base_cmd(now: DateTime<Utc>) -> CreateAuctionCommand {
        CreateAuctionCommand {
            seller_id: 1,
            title: "저장소 테스트 경매".to_string(),
            description: String::new(),
            starting_price: 10_000,
            reserve_price: None,
            buy_now_price: None,
            bid_increment: 1_000,
            start_time: now - Duration::seconds(1),
            end_time: now + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn create_assigns_ids_and_initial_price() {
        let store = AuctionStore::new();
        let now = Utc::now();
        let a = store.create(base_cmd(now), now).unwrap();
        let b = store.create(base_cmd(now), now).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.current_bid_price, 10_000);
        assert_eq!(a.next_minimum_bid, 10_000);
        assert_eq!(a.status, AuctionStatus::Active);
    }

    #[tokio::test]
    async fn create_rejects_invalid_configuration() {
        let store = AuctionStore::new();
        let now = Utc::now();

        let mut cmd = base_cmd(now);
        cmd.bid_increment = 0;
        assert!(matches!(
            store.create(cmd, now),
            Err(BidError::InvalidAuction(_))
        ));

        let mut cmd = base_cmd(now);
        cmd.end_time = cmd.start_time - Duration::seconds(1);
        assert!(matches!(
            store.create(cmd, now),
            Err(BidError::InvalidAuction(_))
        ));

        let mut cmd = base_cmd(now);
        cmd.buy_now_price = Some(5_000);
        assert!(matches!(
            store.create(cmd, now),
            Err(BidError::InvalidAuction(_))
        ));
    }

    #[tokio::test]
    async fn missing_auction_is_not_found() {
        let store = AuctionStore::new();
        assert!(matches!(
            store.cell(99),
            Err(BidError::AuctionNotFound(99))
        ));
    }
}
// endregion: --- Tests
