//! Data structures shared across the API and settlement binaries.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use hex::encode as hex_encode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum_macros::AsRefStr;

/// Hex length of pseudonymized identity hashes stored on events. The full
/// SHA-256 digest is truncated so the stored value cannot be trivially
/// reversed into a dictionary of full digests already seen elsewhere.
pub const IDENTITY_HASH_LENGTH: usize = 32;

/// Truncated SHA-256 fingerprint used for IP and user-agent pseudonymization.
pub fn hash_identity(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    let mut hexed = hex_encode(digest);
    hexed.truncate(IDENTITY_HASH_LENGTH);
    hexed
}

/// Kinds of ad interactions the ingestion endpoint accepts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventType {
    Impression,
    Click,
    Hide,
    Skip,
    Complete,
}

impl EventType {
    /// Only impressions are collapsed inside the dedup window; every other
    /// kind is recorded as-is.
    pub fn is_deduplicated(self) -> bool {
        matches!(self, EventType::Impression)
    }
}

/// Campaign bid model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BidType {
    Cpm,
    Cpc,
}

/// Identity used to collapse duplicate impressions: the authenticated user id
/// when present, otherwise the hashed caller IP. Anonymous callers behind a
/// shared IP (NAT) can therefore dedup against each other; accepted
/// imprecision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    User(String),
    IpHash(String),
}

impl IdentityKey {
    /// Picks the dedup identity for a request. Returns `None` when neither a
    /// user id nor a caller IP is available, in which case dedup is skipped.
    pub fn resolve(user_id: Option<&str>, ip_hash: Option<&str>) -> Option<Self> {
        if let Some(user) = user_id.filter(|value| !value.is_empty()) {
            return Some(IdentityKey::User(user.to_string()));
        }
        ip_hash
            .filter(|value| !value.is_empty())
            .map(|hash| IdentityKey::IpHash(hash.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            IdentityKey::User(value) | IdentityKey::IpHash(value) => value,
        }
    }
}

/// A new ad event, not yet persisted. The storage layer assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdEvent {
    pub campaign_id: String,
    pub creative_id: String,
    pub placement_key: String,
    pub event_type: EventType,
    pub user_id: Option<String>,
    pub ip_hash: Option<String>,
    pub user_agent_hash: Option<String>,
    pub revenue_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// A persisted ad event. Append-only; never mutated after the initial write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdEventRecord {
    pub id: String,
    pub campaign_id: String,
    pub creative_id: String,
    pub placement_key: String,
    pub event_type: EventType,
    pub user_id: Option<String>,
    pub ip_hash: Option<String>,
    pub user_agent_hash: Option<String>,
    pub revenue_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Campaign reference data. Managed by the campaign tooling; this service
/// only reads the bid model and increments `spent_cents`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignRecord {
    pub id: String,
    pub bid_type: BidType,
    pub bid_value_cents: i64,
    pub spent_cents: i64,
}

/// Post reference data: just enough to resolve the owning creator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: String,
    pub author_id: String,
    pub community: Option<String>,
}

/// Whether a creator may receive ad revenue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EligibilityStatus {
    Pending,
    Eligible,
    Suspended,
}

/// Creator monetization enrollment, managed by the creator program tooling.
/// Read here to gate allocations; the running totals are the only fields this
/// service mutates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorMonetizationRecord {
    pub user_id: String,
    pub enabled: bool,
    pub creator_share_percent: i64,
    pub eligibility_status: EligibilityStatus,
    pub total_earnings_cents: i64,
    pub pending_payout_cents: i64,
}

impl CreatorMonetizationRecord {
    /// Allocation gate: enrollment must be switched on and vetted.
    pub fn can_earn(&self) -> bool {
        self.enabled && self.eligibility_status == EligibilityStatus::Eligible
    }
}

/// Lifecycle of a per-period earnings row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EarningsStatus {
    Estimated,
    Finalized,
    Paid,
}

/// One row per creator per calendar month, upserted as events arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorEarningsRecord {
    pub user_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub estimated_cents: i64,
    pub impressions: i64,
    pub clicks: i64,
    pub status: EarningsStatus,
}

/// Status of a single allocation audit row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AllocationStatus {
    Estimated,
    Finalized,
}

/// A new allocation audit entry, written with status `estimated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAllocation {
    pub ad_event_id: String,
    pub creator_user_id: String,
    pub post_id: String,
    pub amount_cents: i64,
}

/// A persisted allocation audit entry. Append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRecord {
    pub id: i64,
    pub ad_event_id: String,
    pub creator_user_id: String,
    pub post_id: String,
    pub amount_cents: i64,
    pub status: AllocationStatus,
    pub created_at: DateTime<Utc>,
}

/// Half-open calendar-month window `[start, end)` used to bucket creator
/// earnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarningsPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EarningsPeriod {
    /// Returns the calendar month containing `at`.
    pub fn containing(at: DateTime<Utc>) -> Self {
        let (year, month) = (at.year(), at.month());
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        Self {
            start: first_of_month(year, month),
            end: first_of_month(next_year, next_month),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    /// A period is due for finalization once it has fully elapsed.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end
    }
}

fn first_of_month(year: i32, month: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .expect("first of a valid month is a valid date")
        .and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn identity_hash_is_deterministic_and_truncated() {
        let left = hash_identity("203.0.113.7");
        let right = hash_identity("203.0.113.7");
        assert_eq!(left, right);
        assert_eq!(left.len(), IDENTITY_HASH_LENGTH);
        assert!(left.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn identity_prefers_user_over_ip() {
        let key = IdentityKey::resolve(Some("u1"), Some("aabb")).unwrap();
        assert_eq!(key, IdentityKey::User("u1".into()));

        let key = IdentityKey::resolve(None, Some("aabb")).unwrap();
        assert_eq!(key, IdentityKey::IpHash("aabb".into()));

        assert_eq!(IdentityKey::resolve(None, None), None);
        assert_eq!(IdentityKey::resolve(Some(""), None), None);
    }

    #[test]
    fn only_impressions_are_deduplicated() {
        assert!(EventType::Impression.is_deduplicated());
        for other in [
            EventType::Click,
            EventType::Hide,
            EventType::Skip,
            EventType::Complete,
        ] {
            assert!(!other.is_deduplicated());
        }
    }

    #[test]
    fn earnings_period_covers_calendar_month() {
        let at = Utc.with_ymd_and_hms(2026, 8, 15, 12, 30, 0).unwrap();
        let period = EarningsPeriod::containing(at);
        assert_eq!(period.start, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap());
        assert_eq!(period.end, Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap());
        assert!(period.contains(at));
        assert!(!period.contains(period.end));
        assert!(!period.has_ended(at));
        assert!(period.has_ended(period.end));
    }

    #[test]
    fn earnings_period_rolls_over_december() {
        let at = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap();
        let period = EarningsPeriod::containing(at);
        assert_eq!(period.end, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn monetization_gate_requires_enabled_and_eligible() {
        let mut record = CreatorMonetizationRecord {
            user_id: "u1".into(),
            enabled: true,
            creator_share_percent: 55,
            eligibility_status: EligibilityStatus::Eligible,
            total_earnings_cents: 0,
            pending_payout_cents: 0,
        };
        assert!(record.can_earn());
        record.enabled = false;
        assert!(!record.can_earn());
        record.enabled = true;
        record.eligibility_status = EligibilityStatus::Pending;
        assert!(!record.can_earn());
    }
}
