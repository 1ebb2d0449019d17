use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ActiveEnum, ColumnTrait, EntityTrait, QueryFilter, Set};
use whistle_ads_domain::storage::{SettlementStore, StorageError, StorageResult};

use crate::entity::creator_earnings::{self, EarningsStatusDb};
use crate::entity::settlement_state;
use crate::SeaOrmStorage;

const LAST_SETTLED_KEY: &str = "last_settled_at";

#[async_trait::async_trait]
impl SettlementStore for SeaOrmStorage {
    async fn finalize_due_earnings(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let result = creator_earnings::Entity::update_many()
            .col_expr(
                creator_earnings::Column::Status,
                Expr::value(EarningsStatusDb::Finalized.to_value()),
            )
            .filter(creator_earnings::Column::Status.eq(EarningsStatusDb::Estimated))
            .filter(creator_earnings::Column::PeriodEnd.lte(now))
            .exec(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(result.rows_affected)
    }

    async fn last_settled_at(&self) -> StorageResult<Option<DateTime<Utc>>> {
        let maybe = settlement_state::Entity::find_by_id(LAST_SETTLED_KEY.to_string())
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(maybe.and_then(|model| DateTime::from_timestamp(model.value_int, 0)))
    }

    async fn upsert_last_settled_at(&self, at: DateTime<Utc>) -> StorageResult<()> {
        let active = settlement_state::ActiveModel {
            key: Set(LAST_SETTLED_KEY.to_string()),
            value_int: Set(at.timestamp()),
        };
        settlement_state::Entity::insert(active)
            .on_conflict(
                OnConflict::column(settlement_state::Column::Key)
                    .update_column(settlement_state::Column::ValueInt)
                    .to_owned(),
            )
            .exec_without_returning(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use whistle_ads_domain::model::{EarningsPeriod, EventType};
    use whistle_ads_domain::storage::CreatorStore;

    async fn storage() -> SeaOrmStorage {
        SeaOrmStorage::connect("sqlite::memory:")
            .await
            .expect("storage inits")
    }

    #[tokio::test]
    async fn finalizes_only_rows_whose_period_has_ended() {
        let storage = storage().await;
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let closed = EarningsPeriod {
            start: now - Duration::days(60),
            end: now - Duration::days(30),
        };
        let open = EarningsPeriod {
            start: now - Duration::days(10),
            end: now + Duration::days(20),
        };
        storage
            .apply_earnings("u1", &closed, 100, EventType::Impression)
            .await
            .unwrap();
        storage
            .apply_earnings("u1", &open, 40, EventType::Click)
            .await
            .unwrap();

        let finalized = storage.finalize_due_earnings(now).await.unwrap();
        assert_eq!(finalized, 1);

        // Already-finalized rows are not touched again.
        let again = storage.finalize_due_earnings(now).await.unwrap();
        assert_eq!(again, 0);

        let rows = storage.list_earnings("u1").await.unwrap();
        assert_eq!(rows.len(), 2);
        for row in rows {
            let expected = if row.estimated_cents == 100 {
                whistle_ads_domain::model::EarningsStatus::Finalized
            } else {
                whistle_ads_domain::model::EarningsStatus::Estimated
            };
            assert_eq!(row.status, expected);
        }
    }

    #[tokio::test]
    async fn checkpoint_round_trips_at_second_precision() {
        let storage = storage().await;
        assert_eq!(storage.last_settled_at().await.unwrap(), None);

        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        storage.upsert_last_settled_at(at).await.unwrap();
        assert_eq!(storage.last_settled_at().await.unwrap(), Some(at));

        let later = at + Duration::hours(1);
        storage.upsert_last_settled_at(later).await.unwrap();
        assert_eq!(storage.last_settled_at().await.unwrap(), Some(later));
    }
}
