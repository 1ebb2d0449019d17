use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use whistle_ads_domain::model::{
    AllocationRecord, AllocationStatus, CreatorEarningsRecord, CreatorMonetizationRecord,
    EarningsPeriod, EarningsStatus, EligibilityStatus, EventType, NewAllocation, PostRecord,
};
use whistle_ads_domain::storage::{CreatorStore, StorageError, StorageResult};

use crate::entity::ad_revenue_allocations::{self, AllocationStatusDb};
use crate::entity::creator_earnings::{self, EarningsStatusDb};
use crate::entity::creator_monetization::{self, EligibilityStatusDb};
use crate::entity::posts;
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl CreatorStore for SeaOrmStorage {
    async fn find_post_author(&self, post_id: &str) -> StorageResult<Option<String>> {
        let maybe = posts::Entity::find_by_id(post_id.to_string())
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(maybe.map(|model| model.author_id))
    }

    async fn insert_post(&self, post: PostRecord) -> StorageResult<()> {
        let model = posts::ActiveModel {
            id: Set(post.id),
            author_id: Set(post.author_id),
            community: Set(post.community),
        };
        posts::Entity::insert(model)
            .exec_without_returning(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(())
    }

    async fn find_monetization(
        &self,
        user_id: &str,
    ) -> StorageResult<Option<CreatorMonetizationRecord>> {
        let maybe = creator_monetization::Entity::find_by_id(user_id.to_string())
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(maybe.map(monetization_to_record))
    }

    async fn upsert_monetization(&self, record: CreatorMonetizationRecord) -> StorageResult<()> {
        let model = creator_monetization::ActiveModel {
            user_id: Set(record.user_id),
            enabled: Set(record.enabled),
            creator_share_percent: Set(record.creator_share_percent),
            eligibility_status: Set(eligibility_to_db(record.eligibility_status)),
            total_earnings_cents: Set(record.total_earnings_cents),
            pending_payout_cents: Set(record.pending_payout_cents),
        };
        creator_monetization::Entity::insert(model)
            .on_conflict(
                OnConflict::column(creator_monetization::Column::UserId)
                    .update_columns([
                        creator_monetization::Column::Enabled,
                        creator_monetization::Column::CreatorSharePercent,
                        creator_monetization::Column::EligibilityStatus,
                        creator_monetization::Column::TotalEarningsCents,
                        creator_monetization::Column::PendingPayoutCents,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(())
    }

    async fn insert_allocation(
        &self,
        allocation: NewAllocation,
    ) -> StorageResult<AllocationRecord> {
        let model = ad_revenue_allocations::ActiveModel {
            ad_event_id: Set(allocation.ad_event_id),
            creator_user_id: Set(allocation.creator_user_id),
            post_id: Set(allocation.post_id),
            amount_cents: Set(allocation.amount_cents),
            status: Set(AllocationStatusDb::Estimated),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let created = model
            .insert(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(allocation_to_record(created))
    }

    async fn apply_earnings(
        &self,
        user_id: &str,
        period: &EarningsPeriod,
        amount_cents: i64,
        trigger: EventType,
    ) -> StorageResult<()> {
        // Clicks bump the click counter; everything else counts as an
        // impression.
        let (impressions, clicks) = match trigger {
            EventType::Click => (0, 1),
            _ => (1, 0),
        };

        let model = creator_earnings::ActiveModel {
            user_id: Set(user_id.to_string()),
            period_start: Set(period.start),
            period_end: Set(period.end),
            estimated_cents: Set(amount_cents),
            impressions: Set(impressions),
            clicks: Set(clicks),
            status: Set(EarningsStatusDb::Estimated),
        };
        creator_earnings::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    creator_earnings::Column::UserId,
                    creator_earnings::Column::PeriodStart,
                ])
                .value(
                    creator_earnings::Column::EstimatedCents,
                    Expr::col(creator_earnings::Column::EstimatedCents).add(amount_cents),
                )
                .value(
                    creator_earnings::Column::Impressions,
                    Expr::col(creator_earnings::Column::Impressions).add(impressions),
                )
                .value(
                    creator_earnings::Column::Clicks,
                    Expr::col(creator_earnings::Column::Clicks).add(clicks),
                )
                .to_owned(),
            )
            .exec_without_returning(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(())
    }

    async fn credit_monetization(&self, user_id: &str, amount_cents: i64) -> StorageResult<()> {
        creator_monetization::Entity::update_many()
            .col_expr(
                creator_monetization::Column::TotalEarningsCents,
                Expr::col(creator_monetization::Column::TotalEarningsCents).add(amount_cents),
            )
            .col_expr(
                creator_monetization::Column::PendingPayoutCents,
                Expr::col(creator_monetization::Column::PendingPayoutCents).add(amount_cents),
            )
            .filter(creator_monetization::Column::UserId.eq(user_id))
            .exec(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(())
    }

    async fn list_earnings(&self, user_id: &str) -> StorageResult<Vec<CreatorEarningsRecord>> {
        let rows = creator_earnings::Entity::find()
            .filter(creator_earnings::Column::UserId.eq(user_id))
            .order_by_desc(creator_earnings::Column::PeriodStart)
            .all(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(rows.into_iter().map(earnings_to_record).collect())
    }
}

fn eligibility_to_db(value: EligibilityStatus) -> EligibilityStatusDb {
    match value {
        EligibilityStatus::Pending => EligibilityStatusDb::Pending,
        EligibilityStatus::Eligible => EligibilityStatusDb::Eligible,
        EligibilityStatus::Suspended => EligibilityStatusDb::Suspended,
    }
}

fn eligibility_from_db(value: EligibilityStatusDb) -> EligibilityStatus {
    match value {
        EligibilityStatusDb::Pending => EligibilityStatus::Pending,
        EligibilityStatusDb::Eligible => EligibilityStatus::Eligible,
        EligibilityStatusDb::Suspended => EligibilityStatus::Suspended,
    }
}

fn earnings_status_from_db(value: EarningsStatusDb) -> EarningsStatus {
    match value {
        EarningsStatusDb::Estimated => EarningsStatus::Estimated,
        EarningsStatusDb::Finalized => EarningsStatus::Finalized,
        EarningsStatusDb::Paid => EarningsStatus::Paid,
    }
}

fn allocation_status_from_db(value: AllocationStatusDb) -> AllocationStatus {
    match value {
        AllocationStatusDb::Estimated => AllocationStatus::Estimated,
        AllocationStatusDb::Finalized => AllocationStatus::Finalized,
    }
}

fn monetization_to_record(model: creator_monetization::Model) -> CreatorMonetizationRecord {
    CreatorMonetizationRecord {
        user_id: model.user_id,
        enabled: model.enabled,
        creator_share_percent: model.creator_share_percent,
        eligibility_status: eligibility_from_db(model.eligibility_status),
        total_earnings_cents: model.total_earnings_cents,
        pending_payout_cents: model.pending_payout_cents,
    }
}

fn earnings_to_record(model: creator_earnings::Model) -> CreatorEarningsRecord {
    CreatorEarningsRecord {
        user_id: model.user_id,
        period_start: model.period_start,
        period_end: model.period_end,
        estimated_cents: model.estimated_cents,
        impressions: model.impressions,
        clicks: model.clicks,
        status: earnings_status_from_db(model.status),
    }
}

fn allocation_to_record(model: ad_revenue_allocations::Model) -> AllocationRecord {
    AllocationRecord {
        id: model.id,
        ad_event_id: model.ad_event_id,
        creator_user_id: model.creator_user_id,
        post_id: model.post_id,
        amount_cents: model.amount_cents,
        status: allocation_status_from_db(model.status),
        created_at: model.created_at,
    }
}
