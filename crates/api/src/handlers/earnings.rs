use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};

use whistle_ads_domain::model::EarningsStatus;
use whistle_ads_domain::storage::CreatorStore;

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsPeriodBody {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub estimated_cents: i64,
    pub impressions: i64,
    pub clicks: i64,
    pub status: EarningsStatus,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorEarningsResponse {
    pub user_id: String,
    pub can_earn: bool,
    pub creator_share_percent: i64,
    pub total_earnings_cents: i64,
    pub pending_payout_cents: i64,
    pub periods: Vec<EarningsPeriodBody>,
}

pub async fn creator_earnings_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    let monetization = match state.storage().find_monetization(&user_id).await? {
        Some(record) => record,
        None => {
            counter!("ads_earnings_requests_total", "status" => "not_found").increment(1);
            return Err(ApiError::NotFound);
        }
    };

    let periods = state
        .storage()
        .list_earnings(&user_id)
        .await?
        .into_iter()
        .map(|row| EarningsPeriodBody {
            period_start: row.period_start,
            period_end: row.period_end,
            estimated_cents: row.estimated_cents,
            impressions: row.impressions,
            clicks: row.clicks,
            status: row.status,
        })
        .collect();

    counter!("ads_earnings_requests_total", "status" => "ok").increment(1);
    let can_earn = monetization.can_earn();
    Ok(HttpResponse::Ok().json(CreatorEarningsResponse {
        user_id: monetization.user_id,
        can_earn,
        creator_share_percent: monetization.creator_share_percent,
        total_earnings_cents: monetization.total_earnings_cents,
        pending_payout_cents: monetization.pending_payout_cents,
        periods,
    }))
}
