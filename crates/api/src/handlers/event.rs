use actix_web::{http::header, web, HttpRequest, HttpResponse};
use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use whistle_ads_domain::model::{hash_identity, AdEventRecord, EventType, IdentityKey, NewAdEvent};
use whistle_ads_domain::services::fraud::FraudSignal;
use whistle_ads_domain::revenue::{
    calculate_revenue, creator_amount, AllocationOutcome, SkipReason,
    DEFAULT_CREATOR_SHARE_PERCENT,
};
use whistle_ads_domain::storage::{
    AdEventStore, CampaignCharge, CampaignStore, CreatorStore, StorageError,
};
use whistle_ads_domain::{EarningsPeriod, NewAllocation};

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    #[serde(default)]
    pub request_id: Option<String>,
    pub campaign_id: String,
    pub creative_id: String,
    pub placement_key: String,
    pub event_type: EventType,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub community: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deduplicated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl EventResponse {
    fn deduplicated() -> Self {
        Self {
            success: true,
            deduplicated: Some(true),
            event_id: None,
        }
    }

    fn recorded(event_id: String) -> Self {
        Self {
            success: true,
            deduplicated: None,
            event_id: Some(event_id),
        }
    }
}

pub async fn ad_event_handler(
    state: web::Data<AppState>,
    request: HttpRequest,
    payload: web::Json<EventRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let now = Utc::now();

    let ip_hash = request
        .peer_addr()
        .map(|addr| hash_identity(&addr.ip().to_string()));
    let user_agent_hash = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(hash_identity);
    let identity = IdentityKey::resolve(payload.user_id.as_deref(), ip_hash.as_deref());

    if payload.event_type.is_deduplicated() {
        if let Some(identity) = &identity {
            if is_duplicate(&state, &payload, identity, now).await? {
                counter!("ads_event_requests_total", "status" => "deduplicated").increment(1);
                return Ok(HttpResponse::Ok().json(EventResponse::deduplicated()));
            }
        }
    }

    let campaign = match state.storage().find_campaign(&payload.campaign_id).await? {
        Some(campaign) => campaign,
        None => {
            counter!("ads_event_requests_total", "status" => "unknown_campaign").increment(1);
            if let Some(identity) = &identity {
                if let FraudSignal::Escalated { attempts } =
                    state.fraud_tracker().record(identity.as_str())
                {
                    warn!(
                        request_id = payload.request_id.as_deref(),
                        identity = identity.as_str(),
                        attempts,
                        "identity keeps probing unknown campaigns"
                    );
                }
            }
            return Err(ApiError::UnknownCampaign(payload.campaign_id));
        }
    };

    let revenue_cents =
        calculate_revenue(campaign.bid_type, campaign.bid_value_cents, payload.event_type);
    let charge = (revenue_cents > 0).then(|| CampaignCharge {
        campaign_id: campaign.id.clone(),
        amount_cents: revenue_cents,
    });

    let record = state
        .storage()
        .record_event(
            NewAdEvent {
                campaign_id: payload.campaign_id,
                creative_id: payload.creative_id,
                placement_key: payload.placement_key,
                event_type: payload.event_type,
                user_id: payload.user_id,
                ip_hash,
                user_agent_hash,
                revenue_cents,
                created_at: now,
            },
            charge,
        )
        .await?;

    if payload.event_type.is_deduplicated() {
        if let Some(identity) = &identity {
            state
                .cache()
                .mark_seen(&record.campaign_id, &record.creative_id, identity);
        }
    }

    let type_label = payload.event_type.as_ref().to_owned();
    counter!("ads_event_requests_total", "status" => "recorded", "type" => type_label)
        .increment(1);
    if revenue_cents > 0 {
        counter!("ads_revenue_cents_total").increment(revenue_cents as u64);
    }

    // Best-effort: the event is already persisted, so an allocation failure
    // must never fail the request. The outcome is still logged and counted.
    if revenue_cents > 0 {
        let outcome = allocate_creator_share(&state, &record, payload.post_id.as_deref()).await;
        counter!("ads_allocations_total", "result" => outcome.as_label()).increment(1);
        match &outcome {
            AllocationOutcome::Allocated { amount_cents } => {
                info!(event_id = %record.id, amount_cents, "creator share allocated");
            }
            AllocationOutcome::Skipped(reason) => {
                info!(event_id = %record.id, reason = reason.as_ref(), "allocation skipped");
            }
            AllocationOutcome::Failed(err) => {
                warn!(event_id = %record.id, error = %err, "allocation failed");
            }
        }
    }

    info!(
        request_id = payload.request_id.as_deref(),
        event_id = %record.id,
        community = payload.community.as_deref(),
        revenue_cents,
        "ad event recorded"
    );
    Ok(HttpResponse::Ok().json(EventResponse::recorded(record.id)))
}

/// Dedup check for impressions: the in-memory cache is a hint, the database
/// query over the window is authoritative.
async fn is_duplicate(
    state: &AppState,
    payload: &EventRequest,
    identity: &IdentityKey,
    now: chrono::DateTime<Utc>,
) -> Result<bool, ApiError> {
    if state
        .cache()
        .known_seen(&payload.campaign_id, &payload.creative_id, identity)
    {
        return Ok(true);
    }

    let window = chrono::Duration::from_std(state.dedup_window())
        .unwrap_or_else(|_| chrono::Duration::seconds(60));
    let since = now - window;
    let prior = state
        .storage()
        .find_recent_impression(&payload.campaign_id, &payload.creative_id, identity, since)
        .await?;
    if prior.is_some() {
        state
            .cache()
            .mark_seen(&payload.campaign_id, &payload.creative_id, identity);
        return Ok(true);
    }

    Ok(false)
}

async fn allocate_creator_share(
    state: &AppState,
    event: &AdEventRecord,
    post_id: Option<&str>,
) -> AllocationOutcome {
    let Some(post_id) = post_id else {
        return AllocationOutcome::Skipped(SkipReason::NoPost);
    };
    match try_allocate(state, event, post_id).await {
        Ok(outcome) => outcome,
        Err(err) => AllocationOutcome::Failed(err.to_string()),
    }
}

async fn try_allocate(
    state: &AppState,
    event: &AdEventRecord,
    post_id: &str,
) -> Result<AllocationOutcome, StorageError> {
    let Some(author) = state.storage().find_post_author(post_id).await? else {
        return Ok(AllocationOutcome::Skipped(SkipReason::PostNotFound));
    };
    let Some(monetization) = state.storage().find_monetization(&author).await? else {
        return Ok(AllocationOutcome::Skipped(SkipReason::NotEnrolled));
    };
    if !monetization.enabled {
        return Ok(AllocationOutcome::Skipped(SkipReason::Disabled));
    }
    if monetization.eligibility_status != whistle_ads_domain::EligibilityStatus::Eligible {
        return Ok(AllocationOutcome::Skipped(SkipReason::NotEligible));
    }

    let share_percent = if monetization.creator_share_percent > 0 {
        monetization.creator_share_percent
    } else {
        DEFAULT_CREATOR_SHARE_PERCENT
    };
    let amount_cents = creator_amount(event.revenue_cents, share_percent);
    if amount_cents <= 0 {
        return Ok(AllocationOutcome::Skipped(SkipReason::ZeroAmount));
    }

    state
        .storage()
        .insert_allocation(NewAllocation {
            ad_event_id: event.id.clone(),
            creator_user_id: author.clone(),
            post_id: post_id.to_string(),
            amount_cents,
        })
        .await?;

    let period = EarningsPeriod::containing(event.created_at);
    state
        .storage()
        .apply_earnings(&author, &period, amount_cents, event.event_type)
        .await?;
    state
        .storage()
        .credit_monetization(&author, amount_cents)
        .await?;

    counter!("ads_creator_revenue_cents_total").increment(amount_cents as u64);
    Ok(AllocationOutcome::Allocated { amount_cents })
}
