use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    AdEventRecord, AllocationRecord, CampaignRecord, CreatorEarningsRecord,
    CreatorMonetizationRecord, EarningsPeriod, EventType, IdentityKey, NewAdEvent, NewAllocation,
    PostRecord,
};

/// Common result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
}

impl StorageError {
    pub fn from_source(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }
}

/// Campaign spend to apply alongside an event insert. Charged atomically with
/// the event write so a crash cannot record one without the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignCharge {
    pub campaign_id: String,
    pub amount_cents: i64,
}

#[async_trait]
pub trait AdEventStore: Send + Sync {
    /// Persists the event and, when `charge` is present, increments the
    /// campaign's `spent_cents` in the same transaction. Returns the stored
    /// record with its assigned id.
    async fn record_event(
        &self,
        event: NewAdEvent,
        charge: Option<CampaignCharge>,
    ) -> StorageResult<AdEventRecord>;

    /// Authoritative dedup lookup: the most recent impression for the same
    /// campaign, creative and identity at or after `since`.
    async fn find_recent_impression(
        &self,
        campaign_id: &str,
        creative_id: &str,
        identity: &IdentityKey,
        since: DateTime<Utc>,
    ) -> StorageResult<Option<AdEventRecord>>;

    async fn find_event(&self, id: &str) -> StorageResult<Option<AdEventRecord>>;
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn find_campaign(&self, id: &str) -> StorageResult<Option<CampaignRecord>>;

    /// Seeds campaign reference data. Campaign lifecycle is owned by the
    /// campaign tooling; this exists for provisioning and tests.
    async fn insert_campaign(&self, campaign: CampaignRecord) -> StorageResult<()>;
}

#[async_trait]
pub trait CreatorStore: Send + Sync {
    async fn find_post_author(&self, post_id: &str) -> StorageResult<Option<String>>;

    /// Seeds post reference data (provisioning and tests).
    async fn insert_post(&self, post: PostRecord) -> StorageResult<()>;

    async fn find_monetization(
        &self,
        user_id: &str,
    ) -> StorageResult<Option<CreatorMonetizationRecord>>;

    /// Seeds or replaces an enrollment row (provisioning and tests).
    async fn upsert_monetization(&self, record: CreatorMonetizationRecord) -> StorageResult<()>;

    /// Appends one allocation audit row with status `estimated`.
    async fn insert_allocation(&self, allocation: NewAllocation) -> StorageResult<AllocationRecord>;

    /// Upserts the creator's earnings row for `period`: created on the first
    /// event of the period, incremented afterwards. `trigger` decides whether
    /// the impressions or clicks counter is bumped.
    async fn apply_earnings(
        &self,
        user_id: &str,
        period: &EarningsPeriod,
        amount_cents: i64,
        trigger: EventType,
    ) -> StorageResult<()>;

    /// Atomically adds `amount_cents` to the enrollment's running total and
    /// pending payout.
    async fn credit_monetization(&self, user_id: &str, amount_cents: i64) -> StorageResult<()>;

    /// All earnings rows for a creator, most recent period first.
    async fn list_earnings(&self, user_id: &str) -> StorageResult<Vec<CreatorEarningsRecord>>;
}

#[async_trait]
pub trait SettlementStore: Send + Sync {
    /// Flips `estimated` earnings rows whose period ended before `now` to
    /// `finalized`. Returns how many rows changed.
    async fn finalize_due_earnings(&self, now: DateTime<Utc>) -> StorageResult<u64>;

    async fn last_settled_at(&self) -> StorageResult<Option<DateTime<Utc>>>;

    async fn upsert_last_settled_at(&self, at: DateTime<Utc>) -> StorageResult<()>;
}
