/// 입찰 관련 커맨드 처리
/// 1. 입찰 (프록시 해석 포함)
/// 2. 즉시 구매
/// 3. 입찰 취소
// region:    --- Imports
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auction::events::AuctionEvent;
use crate::auction::model::{Auction, AuctionSnapshot, AuctionStatus, Bid};
use crate::auction::state_machine;
use crate::bidding::resolver::{self, Candidate, Resolution, Standing};
use crate::error::{BidError, BidResult};
use crate::event_stream::EventBus;
use crate::store::AuctionStore;

// endregion: --- Imports

// region:    --- Commands

/// 입찰 명령
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBidCommand {
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: i64,
    pub max_bid_amount: Option<i64>,
}

/// 즉시 구매 명령
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyNowCommand {
    pub auction_id: i64,
    pub bidder_id: i64,
}

/// 입찰 취소 명령
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBidCommand {
    pub bid_id: i64,
    pub requester_id: i64,
}

/// 제출 후 취소가 허용되는 시간
const CANCEL_WINDOW_MINUTES: i64 = 5;

/// 경매가 입찰 가능한 상태인지 검증
/// 경계가 지났는데 아직 확정 전이면 이 기회에 낙찰자를 확정한다 (lazy 전이).
fn ensure_active(auction: &mut Auction, now: DateTime<Utc>) -> BidResult<()> {
    match state_machine::resolve_status(auction, now) {
        AuctionStatus::Active => Ok(()),
        AuctionStatus::Pending => Err(BidError::NotStarted),
        AuctionStatus::Ended | AuctionStatus::Completed => {
            state_machine::settle_if_ended(auction, now);
            Err(BidError::AuctionClosed)
        }
    }
}

/// 1. 입찰
pub async fn handle_place_bid(
    cmd: PlaceBidCommand,
    store: &AuctionStore,
    bus: &EventBus,
) -> BidResult<(AuctionSnapshot, Bid)> {
    info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);

    if cmd.amount <= 0 {
        return Err(BidError::InvalidAmount);
    }
    if let Some(max) = cmd.max_bid_amount {
        if max <= cmd.amount {
            return Err(BidError::InvalidProxyMax);
        }
    }

    // 경매 단위 임계 구역 (제한 시간 내 획득 실패 시 재시도 가능 오류)
    let mut auction = store.write(cmd.auction_id).await?;
    let now = Utc::now();

    ensure_active(&mut auction, now)?;
    if cmd.bidder_id == auction.seller_id {
        return Err(BidError::SelfBid);
    }

    // 최소 입찰가는 잠금 안에서 다시 검증한다 (클라이언트 계산값은 신뢰하지 않음)
    let minimum = auction.next_minimum_bid();
    if cmd.amount < minimum {
        return Err(BidError::BidTooLow {
            minimum_bid: minimum,
        });
    }

    // 즉시 구매 가격 이상의 입찰은 즉시 구매 가격으로 낙찰 처리
    if let Some(buy_now_price) = auction.buy_now_price {
        if cmd.amount >= buy_now_price {
            let bid = execute_buy_now(&mut auction, store, bus, cmd.bidder_id, buy_now_price, now);
            return Ok((auction.snapshot(now), bid));
        }
    }

    let standing = auction.ledger.winning_bid().map(|b| Standing {
        bidder_id: b.bidder_id,
        amount: b.bid_amount,
        max: b.max_bid_amount,
    });
    let candidate = Candidate {
        bidder_id: cmd.bidder_id,
        amount: cmd.amount,
        max: cmd.max_bid_amount,
    };
    let resolution = resolver::resolve(standing.as_ref(), &candidate, auction.bid_increment);

    // 제출된 입찰은 결과와 무관하게 제출 금액 그대로 기록된다 (감사 이력)
    let placed_id = store.allocate_bid_id();
    store.index_bid(placed_id, auction.id);
    let placed = Bid {
        id: placed_id,
        auction_id: auction.id,
        bidder_id: cmd.bidder_id,
        bid_amount: cmd.amount,
        max_bid_amount: cmd.max_bid_amount,
        is_winning: false,
        auto: false,
        created_at: now,
        cancelled_at: None,
    };

    match resolution {
        Resolution::CandidateLeads { price } => {
            let wins_at_submitted = price == cmd.amount;
            auction.ledger.append(placed.clone(), wins_at_submitted);
            let seq = auction.next_seq();
            bus.publish(
                auction.id,
                seq,
                AuctionEvent::BidPlaced {
                    auction_id: auction.id,
                    bid_id: placed_id,
                    bidder_id: cmd.bidder_id,
                    bid_amount: cmd.amount,
                    current_bid_price: price,
                    timestamp: now,
                },
            );
            if !wins_at_submitted {
                // 기존 프록시 상한을 넘기 위한 자동 상향분은 별도 입찰로 기록
                append_escalation(
                    &mut auction,
                    store,
                    bus,
                    cmd.bidder_id,
                    price,
                    cmd.max_bid_amount,
                    now,
                );
            }
            auction.current_bid_price = price;
        }
        Resolution::StandingHolds {
            bidder_id,
            max,
            escalated_to,
        } => {
            auction.ledger.append(placed.clone(), false);
            let seq = auction.next_seq();
            bus.publish(
                auction.id,
                seq,
                AuctionEvent::BidPlaced {
                    auction_id: auction.id,
                    bid_id: placed_id,
                    bidder_id: cmd.bidder_id,
                    bid_amount: cmd.amount,
                    current_bid_price: escalated_to,
                    timestamp: now,
                },
            );
            append_escalation(&mut auction, store, bus, bidder_id, escalated_to, max, now);
            auction.current_bid_price = escalated_to;
        }
    }

    info!(
        "{:<12} --> 입찰 처리 완료: auction_id={}, 현재 가격={}",
        "Command", auction.id, auction.current_bid_price
    );
    let placed = auction.ledger.get(placed_id).cloned().unwrap_or(placed);
    Ok((auction.snapshot(now), placed))
}

/// 프록시 자동 상향 입찰 기록
fn append_escalation(
    auction: &mut Auction,
    store: &AuctionStore,
    bus: &EventBus,
    bidder_id: i64,
    amount: i64,
    max: Option<i64>,
    now: DateTime<Utc>,
) {
    let bid_id = store.allocate_bid_id();
    store.index_bid(bid_id, auction.id);
    auction.ledger.append(
        Bid {
            id: bid_id,
            auction_id: auction.id,
            bidder_id,
            bid_amount: amount,
            max_bid_amount: max,
            is_winning: false,
            auto: true,
            created_at: now,
            cancelled_at: None,
        },
        true,
    );
    let seq = auction.next_seq();
    bus.publish(
        auction.id,
        seq,
        AuctionEvent::ProxyEscalated {
            auction_id: auction.id,
            bid_id,
            bidder_id,
            bid_amount: amount,
            timestamp: now,
        },
    );
}

/// 2. 즉시 구매(낙찰)
pub async fn handle_buy_now(
    cmd: BuyNowCommand,
    store: &AuctionStore,
    bus: &EventBus,
) -> BidResult<AuctionSnapshot> {
    info!("{:<12} --> 즉시 구매 요청 처리 시작: {:?}", "Command", cmd);

    let mut auction = store.write(cmd.auction_id).await?;
    let now = Utc::now();

    ensure_active(&mut auction, now)?;
    if cmd.bidder_id == auction.seller_id {
        return Err(BidError::SelfBid);
    }
    let Some(price) = auction.buy_now_price else {
        return Err(BidError::BuyNowUnavailable);
    };

    execute_buy_now(&mut auction, store, bus, cmd.bidder_id, price, now);
    Ok(auction.snapshot(now))
}

/// 즉시 구매 실행
/// 하나의 잠금 점유 안에서 종료 전이와 낙찰 기록을 함께 처리한다.
fn execute_buy_now(
    auction: &mut Auction,
    store: &AuctionStore,
    bus: &EventBus,
    buyer_id: i64,
    price: i64,
    now: DateTime<Utc>,
) -> Bid {
    let bid_id = store.allocate_bid_id();
    store.index_bid(bid_id, auction.id);
    let bid = Bid {
        id: bid_id,
        auction_id: auction.id,
        bidder_id: buyer_id,
        bid_amount: price,
        max_bid_amount: None,
        is_winning: true,
        auto: false,
        created_at: now,
        cancelled_at: None,
    };
    auction.ledger.append(bid.clone(), true);
    auction.current_bid_price = price;
    auction.buy_now_closed = true;
    auction.winner_id = Some(buyer_id);
    auction.reserve_met_at_close = auction.reserve_price.map_or(true, |r| price >= r);
    auction.settled = true;
    auction.announced = AuctionStatus::Ended;

    let seq = auction.next_seq();
    bus.publish(
        auction.id,
        seq,
        AuctionEvent::BuyNowExecuted {
            auction_id: auction.id,
            buyer_id,
            price,
            timestamp: now,
        },
    );
    let seq = auction.next_seq();
    bus.publish(
        auction.id,
        seq,
        AuctionEvent::StatusChanged {
            auction_id: auction.id,
            status: AuctionStatus::Ended,
            winner_id: Some(buyer_id),
            timestamp: now,
        },
    );
    info!(
        "{:<12} --> 즉시 구매 완료: auction_id={}, buyer_id={}, 가격={}",
        "Command", auction.id, buyer_id, price
    );
    bid
}

/// 3. 입찰 취소
/// 중복 취소 요청은 no-op 성공으로 처리한다 (클라이언트 재시도 대비 멱등).
pub async fn handle_cancel_bid(
    cmd: CancelBidCommand,
    store: &AuctionStore,
    bus: &EventBus,
) -> BidResult<AuctionSnapshot> {
    info!("{:<12} --> 입찰 취소 요청 처리 시작: {:?}", "Command", cmd);

    let auction_id = store.auction_of_bid(cmd.bid_id)?;
    let mut auction = store.write(auction_id).await?;
    let now = Utc::now();

    let (bidder_id, created_at, already_cancelled, was_winning) = {
        let bid = auction
            .ledger
            .get(cmd.bid_id)
            .ok_or(BidError::BidNotFound(cmd.bid_id))?;
        (
            bid.bidder_id,
            bid.created_at,
            bid.cancelled_at.is_some(),
            bid.is_winning,
        )
    };

    if bidder_id != cmd.requester_id {
        return Err(BidError::NotOwner);
    }
    if already_cancelled {
        return Ok(auction.snapshot(now));
    }

    // 종료된 경매의 이력은 더 이상 바꿀 수 없다
    if matches!(
        state_machine::resolve_status(&auction, now),
        AuctionStatus::Ended | AuctionStatus::Completed
    ) {
        state_machine::settle_if_ended(&mut auction, now);
        return Err(BidError::AuctionClosed);
    }

    // 낙찰 입찰이 아니면 5분 이내에만 취소할 수 있다
    if !was_winning && now - created_at > Duration::minutes(CANCEL_WINDOW_MINUTES) {
        return Err(BidError::CancelWindowExpired);
    }

    auction.ledger.mark_cancelled(cmd.bid_id, now);
    if was_winning {
        // 낙찰 입찰 취소: 남은 이력에서 차순위 입찰로 되돌린다
        auction.ledger.recompute_winner();
        auction.current_bid_price = auction
            .ledger
            .winning_bid()
            .map(|b| b.bid_amount)
            .unwrap_or(auction.starting_price);
    }

    let current = auction.current_bid_price;
    let seq = auction.next_seq();
    bus.publish(
        auction.id,
        seq,
        AuctionEvent::BidCancelled {
            auction_id: auction.id,
            bid_id: cmd.bid_id,
            current_bid_price: current,
            timestamp: now,
        },
    );
    info!(
        "{:<12} --> 입찰 취소 완료: bid_id={}, 현재 가격={}",
        "Command", cmd.bid_id, current
    );
    Ok(auction.snapshot(now))
}

// endregion: --- Commands
