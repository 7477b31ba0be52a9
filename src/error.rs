// region:    --- Imports
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

// endregion: --- Imports

// region:    --- Error

pub type BidResult<T> = Result<T, BidError>;

/// 입찰 엔진 오류 타입
/// 모든 오류는 요청 단위로 호출자에게 반환되며 프로세스를 중단시키지 않는다.
#[derive(Debug, Error)]
pub enum BidError {
    #[error("입찰 금액이 최소 입찰가보다 낮습니다.")]
    BidTooLow { minimum_bid: i64 },

    #[error("경매가 이미 종료되었습니다.")]
    AuctionClosed,

    #[error("경매가 아직 시작되지 않았습니다.")]
    NotStarted,

    #[error("판매자는 자신의 경매에 입찰할 수 없습니다.")]
    SelfBid,

    #[error("자동 입찰 상한은 입찰 금액보다 커야 합니다.")]
    InvalidProxyMax,

    #[error("입찰 금액은 0보다 커야 합니다.")]
    InvalidAmount,

    #[error("경매를 찾을 수 없습니다: {0}")]
    AuctionNotFound(i64),

    #[error("입찰을 찾을 수 없습니다: {0}")]
    BidNotFound(i64),

    #[error("본인의 입찰만 취소할 수 있습니다.")]
    NotOwner,

    #[error("취소 가능 시간(5분)이 지났습니다.")]
    CancelWindowExpired,

    #[error("즉시 구매가 설정되지 않은 경매입니다.")]
    BuyNowUnavailable,

    #[error("경매 잠금 획득 시간 초과, 잠시 후 다시 시도해 주세요.")]
    LockTimeout,

    #[error("결제할 수 없는 경매 상태입니다.")]
    PaymentState,

    #[error("결제 초기화 실패: {0}")]
    PaymentInitFailed(String),

    #[error("잘못된 경매 설정: {0}")]
    InvalidAuction(String),
}

impl BidError {
    /// 클라이언트용 오류 코드
    pub fn code(&self) -> &'static str {
        match self {
            BidError::BidTooLow { .. } => "bid_too_low",
            BidError::AuctionClosed => "auction_closed",
            BidError::NotStarted => "auction_not_started",
            BidError::SelfBid => "self_bid",
            BidError::InvalidProxyMax => "invalid_proxy_max",
            BidError::InvalidAmount => "invalid_amount",
            BidError::AuctionNotFound(_) => "auction_not_found",
            BidError::BidNotFound(_) => "bid_not_found",
            BidError::NotOwner => "not_owner",
            BidError::CancelWindowExpired => "cancel_window_expired",
            BidError::BuyNowUnavailable => "buy_now_unavailable",
            BidError::LockTimeout => "lock_timeout",
            BidError::PaymentState => "payment_state",
            BidError::PaymentInitFailed(_) => "payment_init_failed",
            BidError::InvalidAuction(_) => "invalid_auction",
        }
    }

    /// 재시도 가능한 오류인지 여부
    pub fn retryable(&self) -> bool {
        matches!(self, BidError::LockTimeout)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            BidError::AuctionNotFound(_) | BidError::BidNotFound(_) => StatusCode::NOT_FOUND,
            BidError::SelfBid | BidError::NotOwner => StatusCode::FORBIDDEN,
            BidError::LockTimeout => StatusCode::SERVICE_UNAVAILABLE,
            BidError::PaymentInitFailed(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// 오류 응답 직렬화
/// BidTooLow는 재시도를 위해 현재 최소 입찰가를 함께 내려준다.
impl IntoResponse for BidError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let BidError::BidTooLow { minimum_bid } = &self {
            body["minimum_bid"] = serde_json::json!(minimum_bid);
        }
        if self.retryable() {
            body["retryable"] = serde_json::json!(true);
        }
        (self.status_code(), Json(body)).into_response()
    }
}

// endregion: --- Error

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_machine_readable() {
        assert_eq!(BidError::BidTooLow { minimum_bid: 1000 }.code(), "bid_too_low");
        assert_eq!(BidError::AuctionClosed.code(), "auction_closed");
        assert_eq!(BidError::SelfBid.code(), "self_bid");
        assert_eq!(BidError::LockTimeout.code(), "lock_timeout");
    }

    #[test]
    fn only_lock_timeout_is_retryable() {
        assert!(BidError::LockTimeout.retryable());
        assert!(!BidError::AuctionClosed.retryable());
        assert!(!BidError::BidTooLow { minimum_bid: 0 }.retryable());
    }
}
// endregion: --- Tests
