use sea_orm::{EntityTrait, Set};
use whistle_ads_domain::model::{BidType, CampaignRecord};
use whistle_ads_domain::storage::{CampaignStore, StorageError, StorageResult};

use crate::entity::campaigns::{self, BidTypeDb};
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl CampaignStore for SeaOrmStorage {
    async fn find_campaign(&self, id: &str) -> StorageResult<Option<CampaignRecord>> {
        let maybe = campaigns::Entity::find_by_id(id.to_string())
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(maybe.map(campaign_to_record))
    }

    async fn insert_campaign(&self, campaign: CampaignRecord) -> StorageResult<()> {
        let model = campaigns::ActiveModel {
            id: Set(campaign.id),
            bid_type: Set(bid_type_to_db(campaign.bid_type)),
            bid_value_cents: Set(campaign.bid_value_cents),
            spent_cents: Set(campaign.spent_cents),
        };
        campaigns::Entity::insert(model)
            .exec_without_returning(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(())
    }
}

fn bid_type_to_db(value: BidType) -> BidTypeDb {
    match value {
        BidType::Cpm => BidTypeDb::Cpm,
        BidType::Cpc => BidTypeDb::Cpc,
    }
}

fn bid_type_from_db(value: BidTypeDb) -> BidType {
    match value {
        BidTypeDb::Cpm => BidType::Cpm,
        BidTypeDb::Cpc => BidType::Cpc,
    }
}

fn campaign_to_record(model: campaigns::Model) -> CampaignRecord {
    CampaignRecord {
        id: model.id,
        bid_type: bid_type_from_db(model.bid_type),
        bid_value_cents: model.bid_value_cents,
        spent_cents: model.spent_cents,
    }
}
