//! Pure revenue math: what an event is worth and how much of it the creator
//! keeps. Kept free of I/O so the whole pricing contract is unit-testable.

use strum_macros::AsRefStr;

use crate::model::{BidType, EventType};

/// Share of event revenue attributed to the post owner when the enrollment
/// row does not carry an explicit percentage.
pub const DEFAULT_CREATOR_SHARE_PERCENT: i64 = 55;

/// Monetary value of a single event in cents.
///
/// CPM bids are quoted per thousand impressions, so a lone impression is
/// worth the bid divided by 1000, rounded half-up. CPC bids charge the full
/// bid per click. Every other combination is free.
pub fn calculate_revenue(bid_type: BidType, bid_value_cents: i64, event_type: EventType) -> i64 {
    match (bid_type, event_type) {
        (BidType::Cpm, EventType::Impression) => (bid_value_cents + 500).div_euclid(1000),
        (BidType::Cpc, EventType::Click) => bid_value_cents,
        _ => 0,
    }
}

/// Creator's cut of `revenue_cents` at `share_percent`, rounded half-up.
pub fn creator_amount(revenue_cents: i64, share_percent: i64) -> i64 {
    (revenue_cents * share_percent + 50).div_euclid(100)
}

/// Outcome of the best-effort allocation sub-chain. The HTTP response never
/// reflects this (the event write is the unit of success), but callers log
/// and count each variant instead of swallowing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationOutcome {
    Skipped(SkipReason),
    Allocated { amount_cents: i64 },
    Failed(String),
}

impl AllocationOutcome {
    /// Stable label for metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            AllocationOutcome::Skipped(_) => "skipped",
            AllocationOutcome::Allocated { .. } => "allocated",
            AllocationOutcome::Failed(_) => "failed",
        }
    }
}

/// Why an event produced no allocation. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// The event carried no post id, so there is no owner to pay.
    NoPost,
    /// The referenced post does not exist (deleted or bogus id).
    PostNotFound,
    /// The post owner never enrolled in monetization.
    NotEnrolled,
    /// Enrollment exists but is switched off.
    Disabled,
    /// Enrollment exists but the creator is not vetted eligible.
    NotEligible,
    /// The computed share rounds to nothing.
    ZeroAmount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpm_impression_divides_bid_by_thousand() {
        assert_eq!(calculate_revenue(BidType::Cpm, 1000, EventType::Impression), 1);
        assert_eq!(calculate_revenue(BidType::Cpm, 1499, EventType::Impression), 1);
        assert_eq!(calculate_revenue(BidType::Cpm, 1500, EventType::Impression), 2);
        assert_eq!(calculate_revenue(BidType::Cpm, 250, EventType::Impression), 0);
    }

    #[test]
    fn cpc_click_charges_full_bid() {
        assert_eq!(calculate_revenue(BidType::Cpc, 50, EventType::Click), 50);
    }

    #[test]
    fn mismatched_combinations_are_free() {
        assert_eq!(calculate_revenue(BidType::Cpm, 5000, EventType::Click), 0);
        assert_eq!(calculate_revenue(BidType::Cpc, 5000, EventType::Impression), 0);
        for event_type in [EventType::Hide, EventType::Skip, EventType::Complete] {
            assert_eq!(calculate_revenue(BidType::Cpm, 5000, event_type), 0);
            assert_eq!(calculate_revenue(BidType::Cpc, 5000, event_type), 0);
        }
    }

    #[test]
    fn creator_share_rounds_half_up() {
        assert_eq!(creator_amount(100, 55), 55);
        assert_eq!(creator_amount(1, 55), 1);
        assert_eq!(creator_amount(1, 49), 0);
        assert_eq!(creator_amount(0, DEFAULT_CREATOR_SHARE_PERCENT), 0);
    }

    #[test]
    fn outcome_labels_are_stable() {
        assert_eq!(AllocationOutcome::Skipped(SkipReason::NoPost).as_label(), "skipped");
        assert_eq!(AllocationOutcome::Allocated { amount_cents: 1 }.as_label(), "allocated");
        assert_eq!(AllocationOutcome::Failed("boom".into()).as_label(), "failed");
        assert_eq!(SkipReason::NotEligible.as_ref(), "not_eligible");
    }
}
