/// 경매 상태 전이 스위퍼
/// pending/active 경매를 주기적으로 순회하며 시간 경계를 지난 경매를 확정한다.
/// 같은 전이는 읽기 경로에서도 lazy하게 일어날 수 있으며, 어느 쪽이 먼저든 멱등하다.
// region:    --- Imports
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::{interval, Duration};
use tracing::{debug, info};

use crate::auction::events::AuctionEvent;
use crate::auction::model::{Auction, AuctionStatus};
use crate::auction::state_machine;
use crate::event_stream::EventBus;
use crate::store::AuctionStore;

// endregion: --- Imports

// region:    --- Auction Sweeper

/// 경매 상태 전이 스위퍼
pub struct AuctionSweeper {
    store: Arc<AuctionStore>,
    bus: Arc<EventBus>,
    period: Duration,
}

impl AuctionSweeper {
    pub fn new(store: Arc<AuctionStore>, bus: Arc<EventBus>, period: Duration) -> Self {
        Self { store, bus, period }
    }

    /// 스위퍼 시작
    pub fn start(&self) {
        let store = Arc::clone(&self.store);
        let bus = Arc::clone(&self.bus);
        let period = self.period;
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                Self::sweep(&store, &bus).await;
            }
        });
    }

    /// 한 번의 순회
    /// 경매당 전이 하나를 처리하는 동안만 쓰기 잠금을 잡는다.
    pub async fn sweep(store: &AuctionStore, bus: &EventBus) {
        let now = Utc::now();
        for id in store.ids() {
            let Ok(cell) = store.cell(id) else { continue };
            let (needs_transition, completed) = {
                let auction = cell.read().await;
                let status = state_machine::resolve_status(&auction, now);
                (
                    status != auction.announced,
                    status == AuctionStatus::Completed,
                )
            };
            if !needs_transition {
                // 완료까지 발행이 끝난 경매의 이벤트 채널은 더 쓰이지 않는다
                if completed {
                    bus.prune(id);
                }
                continue;
            }
            match store.write(id).await {
                Ok(mut auction) => {
                    apply_transition(&mut auction, bus, now);
                }
                Err(_) => {
                    // 잠금 경합: 다음 틱에 다시 시도한다
                    debug!("{:<12} --> 잠금 경합으로 전이 보류: id={}", "Sweeper", id);
                }
            }
        }
    }
}

/// 파생 상태를 확정하고, 마지막 발행 상태와 다르면 상태 변경 이벤트를 발행한다.
/// 호출자는 해당 경매의 쓰기 잠금을 보유하고 있어야 한다.
pub fn apply_transition(auction: &mut Auction, bus: &EventBus, now: DateTime<Utc>) -> AuctionStatus {
    let status = state_machine::resolve_status(auction, now);
    state_machine::settle_if_ended(auction, now);
    if status != auction.announced {
        auction.announced = status;
        let seq = auction.next_seq();
        bus.publish(
            auction.id,
            seq,
            AuctionEvent::StatusChanged {
                auction_id: auction.id,
                status,
                winner_id: auction.winner_id,
                timestamp: now,
            },
        );
        info!(
            "{:<12} --> 경매 상태 전이: id={}, status={}",
            "Sweeper",
            auction.id,
            status.as_str()
        );
    }
    status
}

// endregion: --- Auction Sweeper

// region:    --- Tests
#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::auction::model::AuctionStatus;
    use crate::store::CreateAuctionCommand;

    #[tokio::test]
    async fn sweep_settles_overdue_auctions_and_announces() {
        let store = AuctionStore::new();
        let bus = EventBus::new();
        let now = Utc::now();

        let created = store
            .create(
                CreateAuctionCommand {
                    seller_id: 1,
                    title: "스윕 테스트 경매".to_string(),
                    description: String::new(),
                    starting_price: 10_000,
                    reserve_price: None,
                    buy_now_price: None,
                    bid_increment: 1_000,
                    start_time: now - ChronoDuration::hours(2),
                    end_time: now - ChronoDuration::seconds(1),
                },
                now - ChronoDuration::hours(2),
            )
            .unwrap();

        let mut rx = bus.subscribe(created.id);
        AuctionSweeper::sweep(&store, &bus).await;

        let auction = store.read(created.id).await.unwrap();
        assert!(auction.settled);
        assert_eq!(auction.announced, AuctionStatus::Ended);
        drop(auction);

        let ev = rx.try_recv().expect("상태 변경 이벤트가 발행되어야 합니다");
        assert!(matches!(
            ev.event,
            AuctionEvent::StatusChanged {
                status: AuctionStatus::Ended,
                ..
            }
        ));

        // 재순회는 no-op
        AuctionSweeper::sweep(&store, &bus).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sweep_prunes_idle_channels_of_completed_auctions() {
        let store = AuctionStore::new();
        let bus = EventBus::new();
        let now = Utc::now();

        let created = store
            .create(
                CreateAuctionCommand {
                    seller_id: 1,
                    title: "채널 정리 테스트 경매".to_string(),
                    description: String::new(),
                    starting_price: 10_000,
                    reserve_price: None,
                    buy_now_price: None,
                    bid_increment: 1_000,
                    start_time: now - ChronoDuration::hours(2),
                    end_time: now - ChronoDuration::seconds(1),
                },
                now - ChronoDuration::hours(2),
            )
            .unwrap();

        // 결제까지 끝난 경매로 만든다
        {
            let mut auction = store.write(created.id).await.unwrap();
            auction.payment_completed_at = Some(now);
            auction.announced = AuctionStatus::Completed;
        }

        let rx = bus.subscribe(created.id);
        assert_eq!(bus.channel_count(), 1);

        // 구독자가 있는 동안에는 채널이 남는다
        AuctionSweeper::sweep(&store, &bus).await;
        assert_eq!(bus.channel_count(), 1);

        drop(rx);
        AuctionSweeper::sweep(&store, &bus).await;
        assert_eq!(bus.channel_count(), 0);
    }
}
// endregion: --- Tests
