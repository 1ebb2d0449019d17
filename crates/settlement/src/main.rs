//! Settlement binary that periodically finalizes creator earnings for
//! closed monthly periods.

mod pipeline;
mod worker;

use whistle_ads_domain::config::SettlementConfig;
use whistle_ads_domain::services::telemetry::{init_telemetry, TelemetryConfig};
use whistle_ads_storage::SeaOrmStorage;

use worker::{run_settlement, SettlementError};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    bootstrap().await.map_err(|err| {
        eprintln!("[settlement] bootstrap failed: {err}");
        std::io::Error::other(err.to_string())
    })
}

async fn bootstrap() -> Result<(), SettlementError> {
    let config = SettlementConfig::load_from_env()?;
    let telemetry_config = TelemetryConfig::from_env("SETTLEMENT");
    init_telemetry(&telemetry_config)?;
    let storage = SeaOrmStorage::connect(config.database_url()).await?;
    run_settlement(config, storage).await
}
