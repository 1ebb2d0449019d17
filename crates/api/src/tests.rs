use std::{net::SocketAddr, sync::Arc, time::Duration};

use actix_web::{body::to_bytes, test, web, App};
use whistle_ads_domain::model::{
    BidType, CampaignRecord, CreatorMonetizationRecord, EligibilityStatus, EventType, PostRecord,
};
use whistle_ads_domain::services::{
    cache::ImpressionCache,
    fraud::FraudTracker,
    telemetry::{init_telemetry, TelemetryConfig, TelemetryGuard},
};
use whistle_ads_domain::storage::{AdEventStore, CampaignStore, CreatorStore};
use whistle_ads_domain::EarningsStatus;
use whistle_ads_storage::SeaOrmStorage;

use crate::handlers::{
    earnings::{creator_earnings_handler, CreatorEarningsResponse},
    event::{ad_event_handler, EventRequest, EventResponse},
    json_config,
};
use crate::state::AppState;

const WINDOW: Duration = Duration::from_secs(60);

async fn storage() -> SeaOrmStorage {
    SeaOrmStorage::connect("sqlite::memory:")
        .await
        .expect("storage inits")
}

fn telemetry() -> TelemetryGuard {
    let config = TelemetryConfig::from_env("API_TEST");
    init_telemetry(&config).expect("telemetry inits")
}

fn build_state(storage: SeaOrmStorage) -> AppState {
    AppState::new(
        storage,
        Arc::new(ImpressionCache::new(WINDOW)),
        telemetry(),
        FraudTracker::new(5),
        WINDOW,
    )
}

async fn seed_campaign(storage: &SeaOrmStorage, id: &str, bid_type: BidType, bid_value_cents: i64) {
    storage
        .insert_campaign(CampaignRecord {
            id: id.into(),
            bid_type,
            bid_value_cents,
            spent_cents: 0,
        })
        .await
        .unwrap();
}

async fn seed_creator(storage: &SeaOrmStorage, user_id: &str, post_id: &str, enabled: bool) {
    storage
        .insert_post(PostRecord {
            id: post_id.into(),
            author_id: user_id.into(),
            community: Some("rustaceans".into()),
        })
        .await
        .unwrap();
    storage
        .upsert_monetization(CreatorMonetizationRecord {
            user_id: user_id.into(),
            enabled,
            creator_share_percent: 55,
            eligibility_status: EligibilityStatus::Eligible,
            total_earnings_cents: 0,
            pending_payout_cents: 0,
        })
        .await
        .unwrap();
}

fn event_request(campaign_id: &str, event_type: EventType) -> EventRequest {
    EventRequest {
        request_id: Some("req-1".into()),
        campaign_id: campaign_id.into(),
        creative_id: "cr1".into(),
        placement_key: "BANNER_TOP".into(),
        event_type,
        post_id: None,
        community: None,
        user_id: Some("u1".into()),
    }
}

macro_rules! post_event {
    ($app:expr, $request:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/v1/events")
            .set_json($request)
            .to_request();
        let resp = test::call_service($app, req).await;
        let status = resp.status();
        let body = to_bytes(resp.into_body()).await.unwrap();
        let parsed: EventResponse = serde_json::from_slice(&body).unwrap();
        (status, parsed)
    }};
}

#[actix_web::test]
async fn unknown_campaign_is_rejected_with_400() {
    let state = build_state(storage().await);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .route("/api/v1/events", web::post().to(ad_event_handler)),
    )
    .await;
    let req = test::TestRequest::post()
        .uri("/api/v1/events")
        .set_json(event_request("nope", EventType::Impression))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    let body: serde_json::Value =
        serde_json::from_slice(&to_bytes(resp.into_body()).await.unwrap()).unwrap();
    assert_eq!(body["success"], serde_json::json!(false));
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[actix_web::test]
async fn impression_is_recorded_and_charges_campaign() {
    let storage = storage().await;
    seed_campaign(&storage, "c1", BidType::Cpm, 1000).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(build_state(storage.clone())))
            .route("/api/v1/events", web::post().to(ad_event_handler)),
    )
    .await;

    let (status, parsed) = post_event!(&app, &event_request("c1", EventType::Impression));
    assert_eq!(status, actix_web::http::StatusCode::OK);
    assert!(parsed.success);
    assert_eq!(parsed.deduplicated, None);
    let event_id = parsed.event_id.expect("event id returned");

    let event = storage.find_event(&event_id).await.unwrap().unwrap();
    assert_eq!(event.event_type, EventType::Impression);
    assert_eq!(event.revenue_cents, 1);
    assert_eq!(event.user_id.as_deref(), Some("u1"));

    let campaign = storage.find_campaign("c1").await.unwrap().unwrap();
    assert_eq!(campaign.spent_cents, 1);
}

#[actix_web::test]
async fn repeat_impression_within_window_is_deduplicated() {
    let storage = storage().await;
    seed_campaign(&storage, "c1", BidType::Cpm, 1000).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(build_state(storage.clone())))
            .route("/api/v1/events", web::post().to(ad_event_handler)),
    )
    .await;

    let (_, first) = post_event!(&app, &event_request("c1", EventType::Impression));
    assert!(first.event_id.is_some());

    let (status, second) = post_event!(&app, &event_request("c1", EventType::Impression));
    assert_eq!(status, actix_web::http::StatusCode::OK);
    assert_eq!(second.deduplicated, Some(true));
    assert_eq!(second.event_id, None);

    let campaign = storage.find_campaign("c1").await.unwrap().unwrap();
    assert_eq!(campaign.spent_cents, 1);
}

#[actix_web::test]
async fn dedup_is_authoritative_across_instances() {
    let storage = storage().await;
    seed_campaign(&storage, "c1", BidType::Cpm, 1000).await;

    // Two states share the database but not the in-memory cache, as two API
    // replicas would.
    let first_app = test::init_service(
        App::new()
            .app_data(web::Data::new(build_state(storage.clone())))
            .route("/api/v1/events", web::post().to(ad_event_handler)),
    )
    .await;
    let second_app = test::init_service(
        App::new()
            .app_data(web::Data::new(build_state(storage.clone())))
            .route("/api/v1/events", web::post().to(ad_event_handler)),
    )
    .await;

    let (_, first) = post_event!(&first_app, &event_request("c1", EventType::Impression));
    assert!(first.event_id.is_some());

    let (_, second) = post_event!(&second_app, &event_request("c1", EventType::Impression));
    assert_eq!(second.deduplicated, Some(true));

    let campaign = storage.find_campaign("c1").await.unwrap().unwrap();
    assert_eq!(campaign.spent_cents, 1);
}

#[actix_web::test]
async fn clicks_are_never_deduplicated() {
    let storage = storage().await;
    seed_campaign(&storage, "c1", BidType::Cpc, 50).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(build_state(storage.clone())))
            .route("/api/v1/events", web::post().to(ad_event_handler)),
    )
    .await;

    let (_, first) = post_event!(&app, &event_request("c1", EventType::Click));
    let (_, second) = post_event!(&app, &event_request("c1", EventType::Click));
    assert!(first.event_id.is_some());
    assert!(second.event_id.is_some());

    let campaign = storage.find_campaign("c1").await.unwrap().unwrap();
    assert_eq!(campaign.spent_cents, 100);
}

#[actix_web::test]
async fn campaigns_do_not_share_dedup_windows() {
    let storage = storage().await;
    seed_campaign(&storage, "c1", BidType::Cpm, 1000).await;
    seed_campaign(&storage, "c2", BidType::Cpm, 2000).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(build_state(storage.clone())))
            .route("/api/v1/events", web::post().to(ad_event_handler)),
    )
    .await;

    let (_, first) = post_event!(&app, &event_request("c1", EventType::Impression));
    let (_, second) = post_event!(&app, &event_request("c2", EventType::Impression));
    assert!(first.event_id.is_some());
    assert!(second.event_id.is_some());

    assert_eq!(
        storage.find_campaign("c1").await.unwrap().unwrap().spent_cents,
        1
    );
    assert_eq!(
        storage.find_campaign("c2").await.unwrap().unwrap().spent_cents,
        2
    );
}

#[actix_web::test]
async fn anonymous_impressions_dedup_by_ip() {
    let storage = storage().await;
    seed_campaign(&storage, "c1", BidType::Cpm, 1000).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(build_state(storage.clone())))
            .route("/api/v1/events", web::post().to(ad_event_handler)),
    )
    .await;

    let peer: SocketAddr = "203.0.113.9:40000".parse().unwrap();
    let mut request = event_request("c1", EventType::Impression);
    request.user_id = None;

    let first = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/events")
            .peer_addr(peer)
            .set_json(&request)
            .to_request(),
    )
    .await;
    assert_eq!(first.status(), actix_web::http::StatusCode::OK);

    let second = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/events")
            .peer_addr(peer)
            .set_json(&request)
            .to_request(),
    )
    .await;
    let parsed: EventResponse =
        serde_json::from_slice(&to_bytes(second.into_body()).await.unwrap()).unwrap();
    assert_eq!(parsed.deduplicated, Some(true));

    let campaign = storage.find_campaign("c1").await.unwrap().unwrap();
    assert_eq!(campaign.spent_cents, 1);
}

#[actix_web::test]
async fn non_chargeable_events_record_without_revenue() {
    let storage = storage().await;
    seed_campaign(&storage, "c1", BidType::Cpm, 1000).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(build_state(storage.clone())))
            .route("/api/v1/events", web::post().to(ad_event_handler)),
    )
    .await;

    let (_, parsed) = post_event!(&app, &event_request("c1", EventType::Hide));
    let event_id = parsed.event_id.expect("event id returned");

    let event = storage.find_event(&event_id).await.unwrap().unwrap();
    assert_eq!(event.revenue_cents, 0);
    let campaign = storage.find_campaign("c1").await.unwrap().unwrap();
    assert_eq!(campaign.spent_cents, 0);
}

#[actix_web::test]
async fn allocation_credits_eligible_creator() {
    let storage = storage().await;
    // CPM 100000 values a single impression at 100 cents; 55% share = 55.
    seed_campaign(&storage, "c1", BidType::Cpm, 100_000).await;
    seed_creator(&storage, "creator1", "p1", true).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(build_state(storage.clone())))
            .route("/api/v1/events", web::post().to(ad_event_handler))
            .route(
                "/api/v1/creators/{user_id}/earnings",
                web::get().to(creator_earnings_handler),
            ),
    )
    .await;

    let mut request = event_request("c1", EventType::Impression);
    request.post_id = Some("p1".into());
    let (_, parsed) = post_event!(&app, &request);
    assert!(parsed.event_id.is_some());

    let monetization = storage.find_monetization("creator1").await.unwrap().unwrap();
    assert_eq!(monetization.total_earnings_cents, 55);
    assert_eq!(monetization.pending_payout_cents, 55);

    let rows = storage.list_earnings("creator1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].estimated_cents, 55);
    assert_eq!(rows[0].impressions, 1);
    assert_eq!(rows[0].clicks, 0);
    assert_eq!(rows[0].status, EarningsStatus::Estimated);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/creators/creator1/earnings")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
    let body: CreatorEarningsResponse =
        serde_json::from_slice(&to_bytes(resp.into_body()).await.unwrap()).unwrap();
    assert!(body.can_earn);
    assert_eq!(body.total_earnings_cents, 55);
    assert_eq!(body.periods.len(), 1);
}

#[actix_web::test]
async fn click_allocation_bumps_click_counter() {
    let storage = storage().await;
    seed_campaign(&storage, "c1", BidType::Cpc, 100).await;
    seed_creator(&storage, "creator1", "p1", true).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(build_state(storage.clone())))
            .route("/api/v1/events", web::post().to(ad_event_handler)),
    )
    .await;

    let mut request = event_request("c1", EventType::Click);
    request.post_id = Some("p1".into());
    let (_, parsed) = post_event!(&app, &request);
    assert!(parsed.event_id.is_some());

    let rows = storage.list_earnings("creator1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].estimated_cents, 55);
    assert_eq!(rows[0].impressions, 0);
    assert_eq!(rows[0].clicks, 1);
}

#[actix_web::test]
async fn disabled_monetization_gets_no_allocation() {
    let storage = storage().await;
    seed_campaign(&storage, "c1", BidType::Cpc, 100).await;
    seed_creator(&storage, "creator1", "p1", false).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(build_state(storage.clone())))
            .route("/api/v1/events", web::post().to(ad_event_handler)),
    )
    .await;

    let mut request = event_request("c1", EventType::Click);
    request.post_id = Some("p1".into());
    let (_, parsed) = post_event!(&app, &request);
    // The event itself is still recorded and charged.
    assert!(parsed.event_id.is_some());

    let monetization = storage.find_monetization("creator1").await.unwrap().unwrap();
    assert_eq!(monetization.total_earnings_cents, 0);
    assert_eq!(monetization.pending_payout_cents, 0);
    assert!(storage.list_earnings("creator1").await.unwrap().is_empty());

    let campaign = storage.find_campaign("c1").await.unwrap().unwrap();
    assert_eq!(campaign.spent_cents, 100);
}

#[actix_web::test]
async fn malformed_payloads_use_the_standard_error_body() {
    let state = build_state(storage().await);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .app_data(json_config())
            .route("/api/v1/events", web::post().to(ad_event_handler)),
    )
    .await;

    // Truncated JSON and a payload missing required fields both get the
    // `{"success":false,"error":...}` shape instead of actix's default body.
    for payload in [r#"{"campaignId":"c1""#, r#"{"campaignId":"c1"}"#] {
        let req = test::TestRequest::post()
            .uri("/api/v1/events")
            .insert_header((actix_web::http::header::CONTENT_TYPE, "application/json"))
            .set_payload(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
        let body: serde_json::Value =
            serde_json::from_slice(&to_bytes(resp.into_body()).await.unwrap()).unwrap();
        assert_eq!(body["success"], serde_json::json!(false));
        assert!(!body["error"].as_str().unwrap().is_empty());
    }
}

#[actix_web::test]
async fn earnings_endpoint_requires_enrollment() {
    let state = build_state(storage().await);
    let app = test::init_service(App::new().app_data(web::Data::new(state)).route(
        "/api/v1/creators/{user_id}/earnings",
        web::get().to(creator_earnings_handler),
    ))
    .await;
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/creators/ghost/earnings")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
}
