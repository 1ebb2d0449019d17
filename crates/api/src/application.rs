use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use thiserror::Error;

use whistle_ads_domain::config::{ApiConfig, ConfigError};
use whistle_ads_domain::services::{
    cache::ImpressionCache,
    fraud::FraudTracker,
    telemetry::{init_telemetry, TelemetryConfig, TelemetryError},
};
use whistle_ads_storage::SeaOrmStorage;

use crate::{
    handlers::{self, ad_event_handler, creator_earnings_handler, metrics_handler},
    state::AppState,
};

pub async fn run() -> Result<(), BootstrapError> {
    let config = ApiConfig::load_from_env()?;
    let telemetry = init_telemetry(&TelemetryConfig::from_env("API"))?;

    let storage = SeaOrmStorage::connect(config.database_url()).await?;
    let state = AppState::new(
        storage,
        Arc::new(ImpressionCache::new(config.dedup_window())),
        telemetry.clone(),
        FraudTracker::new(telemetry.fraud_threshold()),
        config.dedup_window(),
    );

    serve(config, state).await
}

async fn serve(config: ApiConfig, state: AppState) -> Result<(), BootstrapError> {
    // With an internal listener configured, /metrics stays off the public
    // surface.
    let expose_metrics_publicly = !config.has_internal_listener();

    let public_state = state.clone();
    let mut public = HttpServer::new(move || {
        // Ad events are posted straight from browser clients on third-party
        // origins, so the public surface accepts any origin.
        let app = App::new()
            .app_data(web::Data::new(public_state.clone()))
            .app_data(handlers::json_config())
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .route("/api/v1/events", web::post().to(ad_event_handler))
            .route(
                "/api/v1/creators/{user_id}/earnings",
                web::get().to(creator_earnings_handler),
            );
        if expose_metrics_publicly {
            app.route("/metrics", web::get().to(metrics_handler))
        } else {
            app
        }
    });
    #[cfg(unix)]
    {
        public = match config.api_unix_socket() {
            Some(socket) => {
                remove_stale_socket(socket)?;
                public.bind_uds(socket)?
            }
            None => public.bind(config.api_bind_address())?,
        };
    }
    #[cfg(not(unix))]
    {
        if let Some(socket) = config.api_unix_socket() {
            return Err(unsupported_socket(socket));
        }
        public = public.bind(config.api_bind_address())?;
    }
    let public = public.run();

    if !config.has_internal_listener() {
        return Ok(public.await?);
    }

    let internal_state = state.clone();
    let mut internal = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(internal_state.clone()))
            .wrap(Logger::default())
            .route("/metrics", web::get().to(metrics_handler))
    });
    #[cfg(unix)]
    {
        internal = match (config.internal_unix_socket(), config.internal_bind_address()) {
            (Some(socket), _) => {
                remove_stale_socket(socket)?;
                internal.bind_uds(socket)?
            }
            (None, Some(addr)) => internal.bind(addr)?,
            (None, None) => return Err(missing_internal_target()),
        };
    }
    #[cfg(not(unix))]
    {
        if let Some(socket) = config.internal_unix_socket() {
            return Err(unsupported_socket(socket));
        }
        internal = match config.internal_bind_address() {
            Some(addr) => internal.bind(addr)?,
            None => return Err(missing_internal_target()),
        };
    }
    let internal = internal.run();

    tokio::try_join!(public, internal)?;
    Ok(())
}

fn missing_internal_target() -> BootstrapError {
    BootstrapError::Io(std::io::Error::other(
        "internal listener configured but no bind target provided",
    ))
}

#[cfg(not(unix))]
fn unsupported_socket(path: &str) -> BootstrapError {
    BootstrapError::Io(std::io::Error::other(format!(
        "unix socket '{path}' requested but this platform does not support it"
    )))
}

// A stale socket file left by an unclean shutdown would make bind fail.
#[cfg(unix)]
fn remove_stale_socket(path: &str) -> std::io::Result<()> {
    let socket_path = std::path::Path::new(path);
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("storage error: {0}")]
    Storage(#[from] whistle_ads_domain::storage::StorageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    #[cfg(unix)]
    #[test]
    fn stale_socket_files_are_removed() {
        use super::remove_stale_socket;

        let path = std::env::temp_dir().join(format!(
            "whistle-ads-test-{}-{}.sock",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::SystemTime::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::write(&path, b"stub").expect("write socket file");
        remove_stale_socket(path.to_str().unwrap()).expect("cleanup succeeds");
        assert!(!path.exists());
    }
}
