// region:    --- Imports
use tracing::debug;

// endregion: --- Imports

// region:    --- Proxy Resolver

/// 현재 낙찰 입찰 (프록시라면 비공개 상한 보유)
#[derive(Debug, Clone)]
pub struct Standing {
    pub bidder_id: i64,
    pub amount: i64,
    pub max: Option<i64>,
}

/// 새로 제출된 입찰
#[derive(Debug, Clone)]
pub struct Candidate {
    pub bidder_id: i64,
    pub amount: i64,
    pub max: Option<i64>,
}

/// 해석 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// 새 입찰이 낙찰 입찰이 된다. price는 도전자를 이기기 위해
    /// 필요한 만큼만 상향된 표시 금액 (제출 금액 이상).
    CandidateLeads { price: i64 },
    /// 기존 낙찰 입찰이 유지되고, 상한을 드러내지 않은 채
    /// 도전자를 이기는 데 필요한 금액까지만 자동 상향된다.
    StandingHolds {
        bidder_id: i64,
        max: Option<i64>,
        escalated_to: i64,
    },
}

/// 프록시 입찰 해석 (순수 함수, 영국식 경매 규칙)
/// 양측 상한의 min까지만 상향되므로 연쇄는 항상 고정점에서 끝난다.
/// 양측 상한이 같으면 먼저 제출된 프록시가 이긴다.
/// 호출 전에 candidate.amount >= 다음 최소 입찰가 검증이 끝났다고 가정한다.
pub fn resolve(standing: Option<&Standing>, candidate: &Candidate, increment: i64) -> Resolution {
    let Some(standing) = standing else {
        return Resolution::CandidateLeads {
            price: candidate.amount,
        };
    };

    let standing_cap = standing.max.unwrap_or(standing.amount);
    let candidate_cap = candidate.max.unwrap_or(candidate.amount);

    let resolution = if candidate_cap > standing_cap {
        // 기존 상한을 넘어섰다: 새 입찰이 기존 상한을 한 단위만 넘겨 이긴다
        Resolution::CandidateLeads {
            price: candidate
                .amount
                .max((standing_cap + increment).min(candidate_cap)),
        }
    } else {
        // 기존 프록시가 방어한다 (동액 상한은 선제출 우선)
        Resolution::StandingHolds {
            bidder_id: standing.bidder_id,
            max: standing.max,
            escalated_to: standing
                .amount
                .max((candidate_cap + increment).min(standing_cap)),
        }
    };
    debug!(
        "{:<12} --> 해석 결과: standing={:?}, candidate={:?}, {:?}",
        "Resolver", standing, candidate, resolution
    );
    resolution
}

// endregion: --- Proxy Resolver

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;

    fn standing(bidder_id: i64, amount: i64, max: Option<i64>) -> Standing {
        Standing {
            bidder_id,
            amount,
            max,
        }
    }

    fn candidate(bidder_id: i64, amount: i64, max: Option<i64>) -> Candidate {
        Candidate {
            bidder_id,
            amount,
            max,
        }
    }

    #[test]
    fn first_bid_leads_at_submitted_amount() {
        let res = resolve(None, &candidate(2, 10_000, None), 1_000);
        assert_eq!(res, Resolution::CandidateLeads { price: 10_000 });
    }

    #[test]
    fn explicit_bid_beats_explicit_standing() {
        let s = standing(1, 10_000, None);
        let res = resolve(Some(&s), &candidate(2, 11_000, None), 1_000);
        assert_eq!(res, Resolution::CandidateLeads { price: 11_000 });
    }

    #[test]
    fn proxy_defends_just_above_challenger() {
        // A가 상한 1000으로 프록시 입찰, 현재가 100, 단위 10
        // B가 500을 명시 입찰하면 A가 510에 방어한다
        let s = standing(1, 100, Some(1_000));
        let res = resolve(Some(&s), &candidate(2, 500, None), 10);
        assert_eq!(
            res,
            Resolution::StandingHolds {
                bidder_id: 1,
                max: Some(1_000),
                escalated_to: 510
            }
        );
    }

    #[test]
    fn equal_caps_resolve_to_earlier_proxy() {
        // B가 A의 상한과 같은 1000을 입찰해도 먼저 제출한 A가 1000에 이긴다
        let s = standing(1, 510, Some(1_000));
        let res = resolve(Some(&s), &candidate(2, 1_000, None), 10);
        assert_eq!(
            res,
            Resolution::StandingHolds {
                bidder_id: 1,
                max: Some(1_000),
                escalated_to: 1_000
            }
        );
    }

    #[test]
    fn higher_proxy_cap_takes_over_at_one_step_above_standing_cap() {
        let s = standing(1, 100, Some(1_000));
        let res = resolve(Some(&s), &candidate(2, 110, Some(1_200)), 10);
        assert_eq!(res, Resolution::CandidateLeads { price: 1_010 });
    }

    #[test]
    fn candidate_cap_never_exceeded() {
        // 기존 상한 1000, 새 프록시 상한 1005: 한 단위를 다 못 올려도 상한까지는 이긴다
        let s = standing(1, 100, Some(1_000));
        let res = resolve(Some(&s), &candidate(2, 110, Some(1_005)), 10);
        assert_eq!(res, Resolution::CandidateLeads { price: 1_005 });
    }

    #[test]
    fn proxy_beats_explicit_without_revealing_max() {
        // 명시 입찰 상대로는 제출 금액 그대로 이긴다
        let s = standing(1, 10_000, None);
        let res = resolve(Some(&s), &candidate(2, 11_000, Some(50_000)), 1_000);
        assert_eq!(res, Resolution::CandidateLeads { price: 11_000 });
    }

    #[test]
    fn standing_escalation_is_always_a_strict_raise() {
        let s = standing(1, 100, Some(1_000));
        if let Resolution::StandingHolds { escalated_to, .. } =
            resolve(Some(&s), &candidate(2, 110, None), 10)
        {
            assert!(escalated_to > 100);
            assert_eq!(escalated_to, 120);
        } else {
            panic!("기존 프록시가 방어해야 합니다");
        }
    }
}
// endregion: --- Tests
