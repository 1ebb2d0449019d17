use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use whistle_ads_domain::model::{AdEventRecord, EventType, IdentityKey, NewAdEvent};
use whistle_ads_domain::storage::{
    AdEventStore, CampaignCharge, StorageError, StorageResult,
};

use crate::entity::ad_events::{self, EventTypeDb};
use crate::entity::campaigns;
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl AdEventStore for SeaOrmStorage {
    async fn record_event(
        &self,
        event: NewAdEvent,
        charge: Option<CampaignCharge>,
    ) -> StorageResult<AdEventRecord> {
        let id = Uuid::new_v4().to_string();
        let model = ad_events::ActiveModel {
            id: Set(id.clone()),
            campaign_id: Set(event.campaign_id.clone()),
            creative_id: Set(event.creative_id.clone()),
            placement_key: Set(event.placement_key.clone()),
            event_type: Set(event_type_to_db(event.event_type)),
            user_id: Set(event.user_id.clone()),
            ip_hash: Set(event.ip_hash.clone()),
            user_agent_hash: Set(event.user_agent_hash.clone()),
            revenue_cents: Set(event.revenue_cents),
            created_at: Set(event.created_at),
        };

        let txn = self
            .connection()
            .begin()
            .await
            .map_err(StorageError::from_source)?;

        ad_events::Entity::insert(model)
            .exec_without_returning(&txn)
            .await
            .map_err(StorageError::from_source)?;

        if let Some(charge) = charge {
            campaigns::Entity::update_many()
                .col_expr(
                    campaigns::Column::SpentCents,
                    Expr::col(campaigns::Column::SpentCents).add(charge.amount_cents),
                )
                .filter(campaigns::Column::Id.eq(charge.campaign_id.as_str()))
                .exec(&txn)
                .await
                .map_err(StorageError::from_source)?;
        }

        txn.commit().await.map_err(StorageError::from_source)?;

        Ok(AdEventRecord {
            id,
            campaign_id: event.campaign_id,
            creative_id: event.creative_id,
            placement_key: event.placement_key,
            event_type: event.event_type,
            user_id: event.user_id,
            ip_hash: event.ip_hash,
            user_agent_hash: event.user_agent_hash,
            revenue_cents: event.revenue_cents,
            created_at: event.created_at,
        })
    }

    async fn find_recent_impression(
        &self,
        campaign_id: &str,
        creative_id: &str,
        identity: &IdentityKey,
        since: DateTime<Utc>,
    ) -> StorageResult<Option<AdEventRecord>> {
        let mut query = ad_events::Entity::find()
            .filter(ad_events::Column::CampaignId.eq(campaign_id))
            .filter(ad_events::Column::CreativeId.eq(creative_id))
            .filter(ad_events::Column::EventType.eq(EventTypeDb::Impression))
            .filter(ad_events::Column::CreatedAt.gte(since));

        query = match identity {
            IdentityKey::User(user_id) => {
                query.filter(ad_events::Column::UserId.eq(user_id.as_str()))
            }
            IdentityKey::IpHash(ip_hash) => {
                query.filter(ad_events::Column::IpHash.eq(ip_hash.as_str()))
            }
        };

        let maybe = query
            .order_by_desc(ad_events::Column::CreatedAt)
            .limit(1)
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(maybe.map(event_to_record))
    }

    async fn find_event(&self, id: &str) -> StorageResult<Option<AdEventRecord>> {
        let maybe = ad_events::Entity::find_by_id(id.to_string())
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(maybe.map(event_to_record))
    }
}

fn event_type_to_db(value: EventType) -> EventTypeDb {
    match value {
        EventType::Impression => EventTypeDb::Impression,
        EventType::Click => EventTypeDb::Click,
        EventType::Hide => EventTypeDb::Hide,
        EventType::Skip => EventTypeDb::Skip,
        EventType::Complete => EventTypeDb::Complete,
    }
}

fn event_type_from_db(value: EventTypeDb) -> EventType {
    match value {
        EventTypeDb::Impression => EventType::Impression,
        EventTypeDb::Click => EventType::Click,
        EventTypeDb::Hide => EventType::Hide,
        EventTypeDb::Skip => EventType::Skip,
        EventTypeDb::Complete => EventType::Complete,
    }
}

fn event_to_record(model: ad_events::Model) -> AdEventRecord {
    AdEventRecord {
        id: model.id,
        campaign_id: model.campaign_id,
        creative_id: model.creative_id,
        placement_key: model.placement_key,
        event_type: event_type_from_db(model.event_type),
        user_id: model.user_id,
        ip_hash: model.ip_hash,
        user_agent_hash: model.user_agent_hash,
        revenue_cents: model.revenue_cents,
        created_at: model.created_at,
    }
}
