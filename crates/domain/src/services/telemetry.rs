//! Tracing and Prometheus wiring shared by the API and settlement binaries.
//! Both exporters are process-wide singletons, so repeated initialization
//! (service tests, co-located binaries) reuses the first installation.

use std::{env, net::SocketAddr, sync::Arc};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::hydrate_env_file;

static SUBSCRIBER_INSTALLED: OnceCell<()> = OnceCell::new();
static METRICS_HANDLE: OnceCell<Arc<PrometheusHandle>> = OnceCell::new();

/// Observability knobs, read from `<PREFIX>_`-scoped environment variables so
/// each binary can be tuned independently against one shared `.env`.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    log_filter: String,
    metrics_address: Option<String>,
    fraud_threshold: u16,
}

impl TelemetryConfig {
    const DEFAULT_FRAUD_THRESHOLD: u16 = 5;

    /// Reads `{PREFIX}_LOG_FILTER`, `{PREFIX}_METRICS_ADDRESS` and
    /// `{PREFIX}_FRAUD_THRESHOLD`. Everything is optional; a binary boots
    /// with no telemetry variables set at all.
    pub fn from_env(prefix: &str) -> Self {
        let _ = hydrate_env_file();
        let prefix = prefix.trim().to_ascii_uppercase();

        Self {
            log_filter: prefixed_var(&prefix, "LOG_FILTER").unwrap_or_else(|| "info".to_string()),
            metrics_address: prefixed_var(&prefix, "METRICS_ADDRESS"),
            fraud_threshold: prefixed_var(&prefix, "FRAUD_THRESHOLD")
                .and_then(|raw| raw.parse::<u16>().ok())
                .filter(|threshold| *threshold > 0)
                .unwrap_or(Self::DEFAULT_FRAUD_THRESHOLD),
        }
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    pub fn metrics_address(&self) -> Option<&str> {
        self.metrics_address.as_deref()
    }

    pub fn fraud_threshold(&self) -> u16 {
        self.fraud_threshold
    }
}

fn prefixed_var(prefix: &str, suffix: &str) -> Option<String> {
    env::var(format!("{prefix}_{suffix}")).ok().and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Handle returned by [`init_telemetry`]; renders the Prometheus snapshot for
/// the `/metrics` endpoint.
#[derive(Clone)]
pub struct TelemetryGuard {
    metrics: Arc<PrometheusHandle>,
    fraud_threshold: u16,
}

impl TelemetryGuard {
    pub fn render_metrics(&self) -> String {
        self.metrics.render()
    }

    pub fn fraud_threshold(&self) -> u16 {
        self.fraud_threshold
    }
}

pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    if SUBSCRIBER_INSTALLED.set(()).is_ok() {
        let filter = EnvFilter::try_new(config.log_filter())
            .map_err(|err| TelemetryError::InvalidLogFilter(err.to_string()))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .map_err(|err| TelemetryError::Tracing(err.to_string()))?;
    }

    let metrics = METRICS_HANDLE
        .get_or_try_init(|| install_recorder(config).map(Arc::new))
        .cloned()?;

    Ok(TelemetryGuard {
        metrics,
        fraud_threshold: config.fraud_threshold(),
    })
}

fn install_recorder(config: &TelemetryConfig) -> Result<PrometheusHandle, TelemetryError> {
    let mut builder = PrometheusBuilder::new();
    if let Some(addr) = config.metrics_address() {
        let socket: SocketAddr = addr.parse().map_err(|err: std::net::AddrParseError| {
            TelemetryError::InvalidMetricsAddress(addr.to_string(), err.to_string())
        })?;
        builder = builder.with_http_listener(socket);
    }

    builder
        .install_recorder()
        .map_err(|err| TelemetryError::Metrics(err.to_string()))
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    InvalidLogFilter(String),
    #[error("failed to install tracing subscriber: {0}")]
    Tracing(String),
    #[error("invalid metrics address `{0}`: {1}")]
    InvalidMetricsAddress(String, String),
    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}
