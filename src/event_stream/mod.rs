// region:    --- Imports
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::auction::events::{AuctionEvent, StreamEvent};

// endregion: --- Imports

// region:    --- Event Bus

/// 구독자당 버퍼 크기. 지연된 구독자는 이벤트를 놓칠 수 있으며(at-least-once 아님, lag),
/// 클라이언트는 seq 공백을 보고 스냅샷 재조회로 복구한다.
const CHANNEL_CAPACITY: usize = 256;

/// 경매 단위 이벤트 버스
/// 폴링을 대체하는 푸시 경로로, 경매별 브로드캐스트 채널에 이벤트를 발행한다.
/// seq는 경매 쓰기 잠금 안에서 발급되므로 구독자가 보는 순서와 일치한다.
pub struct EventBus {
    channels: DashMap<i64, broadcast::Sender<StreamEvent>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    fn sender(&self, auction_id: i64) -> broadcast::Sender<StreamEvent> {
        self.channels
            .entry(auction_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// 이벤트 발행
    /// 구독자가 없으면 조용히 버린다.
    pub fn publish(&self, auction_id: i64, seq: u64, event: AuctionEvent) {
        debug!(
            "{:<12} --> 이벤트 발행: auction_id={}, seq={}, {:?}",
            "EventBus", auction_id, seq, event
        );
        let _ = self.sender(auction_id).send(StreamEvent { seq, event });
    }

    /// 경매 이벤트 구독
    pub fn subscribe(&self, auction_id: i64) -> broadcast::Receiver<StreamEvent> {
        self.sender(auction_id).subscribe()
    }

    /// 유휴 채널 제거
    /// 구독자가 남아 있으면 유지한다. 완료된 경매를 대상으로 스위퍼가 호출한다.
    pub fn prune(&self, auction_id: i64) {
        self.channels
            .remove_if(&auction_id, |_, tx| tx.receiver_count() == 0);
    }

    /// 살아 있는 채널 수
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

// endregion: --- Event Bus

// endregion: --- Tests
