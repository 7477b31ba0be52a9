/// 결제 협력자 연동
/// 결제 게이트웨이 자체는 외부 협력자이며 여기서는 소비만 한다.
/// 결제 시작 실패는 경매의 ended 전이를 되돌리지 않는다.
// region:    --- Imports
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auction::events::AuctionEvent;
use crate::auction::model::{AuctionSnapshot, AuctionStatus};
use crate::error::{BidError, BidResult};
use crate::event_stream::EventBus;
use crate::scheduler;
use crate::store::AuctionStore;

// endregion: --- Imports

// region:    --- Payment Initiator

/// 결제 수단
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Gateway,
    Wallet,
    Demo,
}

/// 결제 시작 결과
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PaymentDirective {
    ApprovalUrl { url: String },
    WalletPaid,
    DemoMode,
}

/// 결제 시작 협력자 트레이트
#[async_trait]
pub trait PaymentInitiator: Send + Sync {
    async fn initiate(&self, auction_id: i64, kind: PaymentKind)
        -> Result<PaymentDirective, String>;
}

/// 개발용 데모 결제 협력자
pub struct DemoPaymentInitiator;

#[async_trait]
impl PaymentInitiator for DemoPaymentInitiator {
    async fn initiate(
        &self,
        auction_id: i64,
        kind: PaymentKind,
    ) -> Result<PaymentDirective, String> {
        info!(
            "{:<12} --> 데모 결제 시작: auction_id={}, kind={:?}",
            "Payment", auction_id, kind
        );
        Ok(match kind {
            PaymentKind::Wallet => PaymentDirective::WalletPaid,
            _ => PaymentDirective::DemoMode,
        })
    }
}

// endregion: --- Payment Initiator

// region:    --- Payment Commands

/// 결제 시작
/// 낙찰자가 확정된 ended 경매만 결제할 수 있다.
/// 외부 호출은 잠금을 해제한 뒤에 수행한다 (잠금 안에서 외부 I/O 금지).
pub async fn handle_initiate_payment(
    store: &AuctionStore,
    bus: &EventBus,
    initiator: &dyn PaymentInitiator,
    auction_id: i64,
    kind: PaymentKind,
) -> BidResult<PaymentDirective> {
    info!(
        "{:<12} --> 결제 시작 요청: auction_id={}, kind={:?}",
        "Payment", auction_id, kind
    );
    {
        let mut auction = store.write(auction_id).await?;
        let now = Utc::now();
        let status = scheduler::apply_transition(&mut auction, bus, now);
        if status != AuctionStatus::Ended || auction.winner_id.is_none() {
            return Err(BidError::PaymentState);
        }
    }
    initiator
        .initiate(auction_id, kind)
        .await
        .map_err(BidError::PaymentInitFailed)
}

/// 결제 완료 확인 (외부 협력자의 콜백)
/// payment_completed_at을 기록해 completed 상태를 파생시킨다. 멱등.
pub async fn handle_confirm_payment(
    store: &AuctionStore,
    bus: &EventBus,
    auction_id: i64,
) -> BidResult<AuctionSnapshot> {
    info!(
        "{:<12} --> 결제 완료 확인: auction_id={}",
        "Payment", auction_id
    );
    let mut auction = store.write(auction_id).await?;
    let now = Utc::now();

    if auction.payment_completed_at.is_some() {
        return Ok(auction.snapshot(now));
    }

    let status = scheduler::apply_transition(&mut auction, bus, now);
    if status != AuctionStatus::Ended || auction.winner_id.is_none() {
        return Err(BidError::PaymentState);
    }

    auction.payment_completed_at = Some(now);
    auction.announced = AuctionStatus::Completed;

    let seq = auction.next_seq();
    bus.publish(
        auction.id,
        seq,
        AuctionEvent::PaymentCompleted {
            auction_id: auction.id,
            timestamp: now,
        },
    );
    let winner_id = auction.winner_id;
    let seq = auction.next_seq();
    bus.publish(
        auction.id,
        seq,
        AuctionEvent::StatusChanged {
            auction_id: auction.id,
            status: AuctionStatus::Completed,
            winner_id,
            timestamp: now,
        },
    );
    Ok(auction.snapshot(now))
}

// endregion: --- Payment Commands

// region:    --- Tests
#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::store::CreateAuctionCommand;

    fn ended_auction_cmd(now: chrono::DateTime<Utc>) -> CreateAuctionCommand {
        CreateAuctionCommand {
            seller_id: 1,
            title: "결제 테스트 경매".to_string(),
            description: String::new(),
            starting_price: 10_000,
            reserve_price: None,
            buy_now_price: None,
            bid_increment: 1_000,
            start_time: now - Duration::hours(2),
            end_time: now - Duration::seconds(1),
        }
    }

    #[tokio::test]
    async fn demo_initiator_reports_wallet_and_demo() {
        let initiator = DemoPaymentInitiator;
        assert!(matches!(
            initiator.initiate(1, PaymentKind::Wallet).await,
            Ok(PaymentDirective::WalletPaid)
        ));
        assert!(matches!(
            initiator.initiate(1, PaymentKind::Demo).await,
            Ok(PaymentDirective::DemoMode)
        ));
    }

    #[tokio::test]
    async fn initiate_requires_ended_auction_with_winner() {
        let store = AuctionStore::new();
        let bus = EventBus::new();
        let now = Utc::now();

        // 낙찰자 없이 종료된 경매는 결제할 수 없다
        let id = store
            .create(ended_auction_cmd(now), now - Duration::hours(2))
            .unwrap()
            .id;
        let err = handle_initiate_payment(&store, &bus, &DemoPaymentInitiator, id, PaymentKind::Demo)
            .await
            .expect_err("낙찰자가 없는데 결제 시작 성공");
        assert!(matches!(err, BidError::PaymentState));

        // 낙찰자를 만들어 주면 결제 시작이 허용된다
        {
            let mut auction = store.write(id).await.unwrap();
            auction.settled = false;
            auction.ledger.append(
                crate::auction::model::Bid {
                    id: 1,
                    auction_id: id,
                    bidder_id: 2,
                    bid_amount: 11_000,
                    max_bid_amount: None,
                    is_winning: false,
                    auto: false,
                    created_at: now - Duration::hours(1),
                    cancelled_at: None,
                },
                true,
            );
            auction.current_bid_price = 11_000;
        }
        let directive =
            handle_initiate_payment(&store, &bus, &DemoPaymentInitiator, id, PaymentKind::Demo)
                .await
                .expect("결제 시작 실패");
        assert!(matches!(directive, PaymentDirective::DemoMode));
    }
}
// endregion: --- Tests
