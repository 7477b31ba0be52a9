// region:    --- Imports
use chrono::{DateTime, Utc};

use crate::auction::model::Bid;

// endregion: --- Imports

// region:    --- Bid Ledger

/// 경매 단위 입찰 원장 (추가 전용)
/// 현재 낙찰 입찰은 캐시된 인덱스로 O(1) 조회한다.
/// 원장이 유일한 쓰기 경로이며 입찰은 절대 삭제되지 않는다.
#[derive(Debug, Default)]
pub struct BidLedger {
    bids: Vec<Bid>,
    winning: Option<usize>,
}

impl BidLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 입찰 추가
    /// winning이 true면 기존 낙찰 입찰의 is_winning을 같은 변경 안에서 해제하므로
    /// 외부 관찰자는 두 입찰이 동시에 낙찰 상태인 순간을 볼 수 없다.
    pub fn append(&mut self, mut bid: Bid, winning: bool) -> i64 {
        let id = bid.id;
        if winning {
            if let Some(i) = self.winning {
                self.bids[i].is_winning = false;
            }
            bid.is_winning = true;
            self.winning = Some(self.bids.len());
        } else {
            bid.is_winning = false;
        }
        self.bids.push(bid);
        id
    }

    /// 현재 낙찰 입찰 조회 (O(1))
    pub fn winning_bid(&self) -> Option<&Bid> {
        self.winning.map(|i| &self.bids[i])
    }

    /// 입찰 이력 (오래된 것부터)
    pub fn history(&self) -> &[Bid] {
        &self.bids
    }

    pub fn get(&self, bid_id: i64) -> Option<&Bid> {
        self.bids.iter().find(|b| b.id == bid_id)
    }

    pub fn get_mut(&mut self, bid_id: i64) -> Option<&mut Bid> {
        self.bids.iter_mut().find(|b| b.id == bid_id)
    }

    /// 취소되지 않은 입찰 수
    pub fn standing_count(&self) -> usize {
        self.bids.iter().filter(|b| b.cancelled_at.is_none()).count()
    }

    /// 입찰 취소 기록
    /// 취소된 입찰이 낙찰 입찰이었다면 낙찰 포인터를 비운다.
    pub fn mark_cancelled(&mut self, bid_id: i64, now: DateTime<Utc>) -> bool {
        let Some(i) = self.bids.iter().position(|b| b.id == bid_id) else {
            return false;
        };
        if self.bids[i].cancelled_at.is_some() {
            return false;
        }
        self.bids[i].cancelled_at = Some(now);
        if self.bids[i].is_winning {
            self.bids[i].is_winning = false;
            self.winning = None;
        }
        true
    }

    /// 남은 이력에서 낙찰 입찰 재계산
    /// 최고 금액 기준, 동액이면 먼저 제출된 입찰이 우선한다.
    /// 낙찰 취소 경로에서만 쓰이므로 O(1)을 가정하지 않는다.
    pub fn recompute_winner(&mut self) -> Option<&Bid> {
        let mut best: Option<usize> = None;
        for (i, bid) in self.bids.iter().enumerate() {
            if bid.cancelled_at.is_some() {
                continue;
            }
            match best {
                Some(j) if self.bids[j].bid_amount >= bid.bid_amount => {}
                _ => best = Some(i),
            }
        }
        for bid in self.bids.iter_mut() {
            bid.is_winning = false;
        }
        self.winning = best;
        if let Some(i) = best {
            self.bids[i].is_winning = true;
        }
        self.winning_bid()
    }
}

// endregion: --- Bid Ledger

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;

    fn bid(id: i64, bidder_id: i64, amount: i64) -> Bid {
        Bid {
            id,
            auction_id: 1,
            bidder_id,
            bid_amount: amount,
            max_bid_amount: None,
            is_winning: false,
            auto: false,
            created_at: Utc::now(),
            cancelled_at: None,
        }
    }

    #[test]
    fn append_flips_previous_winner() {
        let mut ledger = BidLedger::new();
        ledger.append(bid(1, 10, 11_000), true);
        ledger.append(bid(2, 20, 12_000), true);

        let winning: Vec<_> = ledger.history().iter().filter(|b| b.is_winning).collect();
        assert_eq!(winning.len(), 1);
        assert_eq!(winning[0].id, 2);
    }

    #[test]
    fn superseded_bid_is_recorded_but_not_winning() {
        let mut ledger = BidLedger::new();
        ledger.append(bid(1, 10, 11_000), true);
        ledger.append(bid(2, 20, 11_500), false);

        assert_eq!(ledger.history().len(), 2);
        assert_eq!(ledger.winning_bid().map(|b| b.id), Some(1));
    }

    #[test]
    fn cancel_winner_and_recompute_picks_next_highest() {
        let mut ledger = BidLedger::new();
        ledger.append(bid(1, 10, 11_000), true);
        ledger.append(bid(2, 20, 12_000), true);
        ledger.append(bid(3, 30, 13_000), true);

        assert!(ledger.mark_cancelled(3, Utc::now()));
        assert_eq!(ledger.winning_bid(), None);

        let next = ledger.recompute_winner().map(|b| b.id);
        assert_eq!(next, Some(2));
        assert_eq!(ledger.winning_bid().map(|b| b.bid_amount), Some(12_000));
    }

    #[test]
    fn recompute_ties_resolve_to_earlier_bid() {
        let mut ledger = BidLedger::new();
        ledger.append(bid(1, 10, 12_000), true);
        ledger.append(bid(2, 20, 12_000), false);
        ledger.append(bid(3, 30, 13_000), true);

        ledger.mark_cancelled(3, Utc::now());
        assert_eq!(ledger.recompute_winner().map(|b| b.id), Some(1));
    }

    #[test]
    fn recompute_on_empty_ledger_clears_winner() {
        let mut ledger = BidLedger::new();
        ledger.append(bid(1, 10, 11_000), true);
        ledger.mark_cancelled(1, Utc::now());
        assert_eq!(ledger.recompute_winner(), None);
        assert_eq!(ledger.standing_count(), 0);
    }
}
// endregion: --- Tests
