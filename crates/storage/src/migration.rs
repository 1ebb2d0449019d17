use sea_orm::sea_query::{
    ColumnDef, Expr, Index, IndexCreateStatement, Table, TableCreateStatement,
};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection};

use crate::entity::{
    ad_events, ad_revenue_allocations, campaigns, creator_earnings, creator_monetization, posts,
    settlement_state,
};
use whistle_ads_domain::storage::{StorageError, StorageResult};

pub async fn run_migrations(db: &DatabaseConnection) -> StorageResult<()> {
    let backend = db.get_database_backend();

    let ad_events_table = Table::create()
        .if_not_exists()
        .table(ad_events::Entity)
        .col(
            ColumnDef::new(ad_events::Column::Id)
                .string_len(36)
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(ad_events::Column::CampaignId)
                .string_len(64)
                .not_null(),
        )
        .col(
            ColumnDef::new(ad_events::Column::CreativeId)
                .string_len(64)
                .not_null(),
        )
        .col(
            ColumnDef::new(ad_events::Column::PlacementKey)
                .string_len(64)
                .not_null(),
        )
        .col(
            ColumnDef::new(ad_events::Column::EventType)
                .tiny_integer()
                .not_null(),
        )
        .col(ColumnDef::new(ad_events::Column::UserId).string_len(64).null())
        .col(ColumnDef::new(ad_events::Column::IpHash).string_len(32).null())
        .col(
            ColumnDef::new(ad_events::Column::UserAgentHash)
                .string_len(32)
                .null(),
        )
        .col(
            ColumnDef::new(ad_events::Column::RevenueCents)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(ad_events::Column::CreatedAt)
                .date_time()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .to_owned();
    create_table(db, backend, ad_events_table).await?;

    // Serves the dedup window lookup.
    let dedup_index = Index::create()
        .if_not_exists()
        .name("idx_ad_events_dedup")
        .table(ad_events::Entity)
        .col(ad_events::Column::CampaignId)
        .col(ad_events::Column::CreativeId)
        .col(ad_events::Column::CreatedAt)
        .to_owned();
    create_index(db, backend, dedup_index).await?;

    let campaigns_table = Table::create()
        .if_not_exists()
        .table(campaigns::Entity)
        .col(
            ColumnDef::new(campaigns::Column::Id)
                .string_len(64)
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(campaigns::Column::BidType)
                .tiny_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(campaigns::Column::BidValueCents)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(campaigns::Column::SpentCents)
                .big_integer()
                .not_null()
                .default(0),
        )
        .to_owned();
    create_table(db, backend, campaigns_table).await?;

    let posts_table = Table::create()
        .if_not_exists()
        .table(posts::Entity)
        .col(
            ColumnDef::new(posts::Column::Id)
                .string_len(64)
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(posts::Column::AuthorId)
                .string_len(64)
                .not_null(),
        )
        .col(ColumnDef::new(posts::Column::Community).string_len(64).null())
        .to_owned();
    create_table(db, backend, posts_table).await?;

    let monetization_table = Table::create()
        .if_not_exists()
        .table(creator_monetization::Entity)
        .col(
            ColumnDef::new(creator_monetization::Column::UserId)
                .string_len(64)
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(creator_monetization::Column::Enabled)
                .boolean()
                .not_null(),
        )
        .col(
            ColumnDef::new(creator_monetization::Column::CreatorSharePercent)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(creator_monetization::Column::EligibilityStatus)
                .tiny_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(creator_monetization::Column::TotalEarningsCents)
                .big_integer()
                .not_null()
                .default(0),
        )
        .col(
            ColumnDef::new(creator_monetization::Column::PendingPayoutCents)
                .big_integer()
                .not_null()
                .default(0),
        )
        .to_owned();
    create_table(db, backend, monetization_table).await?;

    let earnings_table = Table::create()
        .if_not_exists()
        .table(creator_earnings::Entity)
        .col(
            ColumnDef::new(creator_earnings::Column::UserId)
                .string_len(64)
                .not_null(),
        )
        .col(
            ColumnDef::new(creator_earnings::Column::PeriodStart)
                .date_time()
                .not_null(),
        )
        .col(
            ColumnDef::new(creator_earnings::Column::PeriodEnd)
                .date_time()
                .not_null(),
        )
        .col(
            ColumnDef::new(creator_earnings::Column::EstimatedCents)
                .big_integer()
                .not_null()
                .default(0),
        )
        .col(
            ColumnDef::new(creator_earnings::Column::Impressions)
                .big_integer()
                .not_null()
                .default(0),
        )
        .col(
            ColumnDef::new(creator_earnings::Column::Clicks)
                .big_integer()
                .not_null()
                .default(0),
        )
        .col(
            ColumnDef::new(creator_earnings::Column::Status)
                .tiny_integer()
                .not_null(),
        )
        .primary_key(
            Index::create()
                .col(creator_earnings::Column::UserId)
                .col(creator_earnings::Column::PeriodStart),
        )
        .to_owned();
    create_table(db, backend, earnings_table).await?;

    let allocations_table = Table::create()
        .if_not_exists()
        .table(ad_revenue_allocations::Entity)
        .col(
            ColumnDef::new(ad_revenue_allocations::Column::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new(ad_revenue_allocations::Column::AdEventId)
                .string_len(36)
                .not_null(),
        )
        .col(
            ColumnDef::new(ad_revenue_allocations::Column::CreatorUserId)
                .string_len(64)
                .not_null(),
        )
        .col(
            ColumnDef::new(ad_revenue_allocations::Column::PostId)
                .string_len(64)
                .not_null(),
        )
        .col(
            ColumnDef::new(ad_revenue_allocations::Column::AmountCents)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(ad_revenue_allocations::Column::Status)
                .tiny_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(ad_revenue_allocations::Column::CreatedAt)
                .date_time()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .to_owned();
    create_table(db, backend, allocations_table).await?;

    let settlement_table = Table::create()
        .if_not_exists()
        .table(settlement_state::Entity)
        .col(
            ColumnDef::new(settlement_state::Column::Key)
                .string_len(64)
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(settlement_state::Column::ValueInt)
                .big_integer()
                .not_null(),
        )
        .to_owned();
    create_table(db, backend, settlement_table).await?;

    Ok(())
}

async fn create_table(
    db: &DatabaseConnection,
    backend: DatabaseBackend,
    mut statement: TableCreateStatement,
) -> StorageResult<()> {
    statement.if_not_exists();
    db.execute(backend.build(&statement))
        .await
        .map_err(StorageError::from_source)?;
    Ok(())
}

async fn create_index(
    db: &DatabaseConnection,
    backend: DatabaseBackend,
    mut statement: IndexCreateStatement,
) -> StorageResult<()> {
    statement.if_not_exists();
    db.execute(backend.build(&statement))
        .await
        .map_err(StorageError::from_source)?;
    Ok(())
}
