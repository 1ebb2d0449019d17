use std::sync::Arc;
use std::time::Duration;

use whistle_ads_domain::services::{
    cache::ImpressionCache, fraud::FraudTracker, telemetry::TelemetryGuard,
};
use whistle_ads_storage::SeaOrmStorage;

#[derive(Clone)]
pub struct AppState {
    storage: SeaOrmStorage,
    cache: Arc<ImpressionCache>,
    telemetry: TelemetryGuard,
    fraud_tracker: FraudTracker,
    dedup_window: Duration,
}

impl AppState {
    pub fn new(
        storage: SeaOrmStorage,
        cache: Arc<ImpressionCache>,
        telemetry: TelemetryGuard,
        fraud_tracker: FraudTracker,
        dedup_window: Duration,
    ) -> Self {
        Self {
            storage,
            cache,
            telemetry,
            fraud_tracker,
            dedup_window,
        }
    }

    pub fn storage(&self) -> &SeaOrmStorage {
        &self.storage
    }

    pub fn cache(&self) -> &ImpressionCache {
        self.cache.as_ref()
    }

    pub fn telemetry(&self) -> &TelemetryGuard {
        &self.telemetry
    }

    pub fn fraud_tracker(&self) -> &FraudTracker {
        &self.fraud_tracker
    }

    pub fn dedup_window(&self) -> Duration {
        self.dedup_window
    }
}
