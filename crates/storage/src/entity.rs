pub mod ad_events {
    use sea_orm::entity::prelude::*;
    use sea_orm::sea_query::Expr;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "ad_events")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub campaign_id: String,
        pub creative_id: String,
        pub placement_key: String,
        pub event_type: EventTypeDb,
        pub user_id: Option<String>,
        pub ip_hash: Option<String>,
        pub user_agent_hash: Option<String>,
        pub revenue_cents: i64,
        #[sea_orm(default_expr = "Expr::current_timestamp()")]
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
    #[sea_orm(rs_type = "i8", db_type = "TinyInteger")]
    pub enum EventTypeDb {
        #[sea_orm(num_value = 0)]
        Impression,
        #[sea_orm(num_value = 1)]
        Click,
        #[sea_orm(num_value = 2)]
        Hide,
        #[sea_orm(num_value = 3)]
        Skip,
        #[sea_orm(num_value = 4)]
        Complete,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod campaigns {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "campaigns")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub bid_type: BidTypeDb,
        pub bid_value_cents: i64,
        #[sea_orm(default_value = 0)]
        pub spent_cents: i64,
    }

    #[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
    #[sea_orm(rs_type = "i8", db_type = "TinyInteger")]
    pub enum BidTypeDb {
        #[sea_orm(num_value = 0)]
        Cpm,
        #[sea_orm(num_value = 1)]
        Cpc,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod posts {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "posts")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub author_id: String,
        pub community: Option<String>,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod creator_monetization {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "creator_monetization")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub user_id: String,
        pub enabled: bool,
        pub creator_share_percent: i64,
        pub eligibility_status: EligibilityStatusDb,
        #[sea_orm(default_value = 0)]
        pub total_earnings_cents: i64,
        #[sea_orm(default_value = 0)]
        pub pending_payout_cents: i64,
    }

    #[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
    #[sea_orm(rs_type = "i8", db_type = "TinyInteger")]
    pub enum EligibilityStatusDb {
        #[sea_orm(num_value = 0)]
        Pending,
        #[sea_orm(num_value = 1)]
        Eligible,
        #[sea_orm(num_value = 2)]
        Suspended,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod creator_earnings {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "creator_earnings")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub user_id: String,
        #[sea_orm(primary_key, auto_increment = false)]
        pub period_start: DateTimeUtc,
        pub period_end: DateTimeUtc,
        #[sea_orm(default_value = 0)]
        pub estimated_cents: i64,
        #[sea_orm(default_value = 0)]
        pub impressions: i64,
        #[sea_orm(default_value = 0)]
        pub clicks: i64,
        pub status: EarningsStatusDb,
    }

    #[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
    #[sea_orm(rs_type = "i8", db_type = "TinyInteger")]
    pub enum EarningsStatusDb {
        #[sea_orm(num_value = 0)]
        Estimated,
        #[sea_orm(num_value = 1)]
        Finalized,
        #[sea_orm(num_value = 2)]
        Paid,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod ad_revenue_allocations {
    use sea_orm::entity::prelude::*;
    use sea_orm::sea_query::Expr;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "ad_revenue_allocations")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub ad_event_id: String,
        pub creator_user_id: String,
        pub post_id: String,
        pub amount_cents: i64,
        pub status: AllocationStatusDb,
        #[sea_orm(default_expr = "Expr::current_timestamp()")]
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
    #[sea_orm(rs_type = "i8", db_type = "TinyInteger")]
    pub enum AllocationStatusDb {
        #[sea_orm(num_value = 0)]
        Estimated,
        #[sea_orm(num_value = 1)]
        Finalized,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod settlement_state {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "settlement_state")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub key: String,
        pub value_int: i64,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
