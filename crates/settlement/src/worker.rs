use metrics::counter;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use whistle_ads_domain::{
    config::{ConfigError, SettlementConfig},
    services::telemetry::TelemetryError,
    storage::{SettlementStore, StorageError},
};
use whistle_ads_storage::SeaOrmStorage;

use crate::pipeline::settle_once;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}

/// Sweeps forever at the configured interval. Each sweep finalizes every
/// `estimated` earnings row whose period has ended and records the sweep
/// timestamp so restarts can report when settlement last ran.
pub async fn run_settlement(
    config: SettlementConfig,
    storage: SeaOrmStorage,
) -> Result<(), SettlementError> {
    match storage.last_settled_at().await? {
        Some(at) => info!(last_settled_at = %at, "settlement worker starting"),
        None => info!("settlement worker starting, no previous sweep recorded"),
    }

    loop {
        match settle_once(&storage, chrono::Utc::now()).await {
            Ok(finalized) => {
                counter!("ads_settlement_sweeps_total", "result" => "ok").increment(1);
                if finalized > 0 {
                    info!(finalized, "settlement sweep finalized earnings");
                }
            }
            Err(err) => {
                counter!("ads_settlement_sweeps_total", "result" => "error").increment(1);
                warn!(?err, "settlement sweep failed");
            }
        }
        sleep(config.sweep_interval()).await;
    }
}
