use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use metrics::counter;

/// Counts events that name campaigns we have never heard of. A client that
/// keeps guessing campaign ids is probing for something chargeable, so once
/// an identity crosses the threshold the caller gets an `Escalated` signal to
/// hand to upstream blocking.
///
/// Identity strings come straight from requests, so entries older than the
/// probe TTL are swept on every `record` to keep the map bounded.
#[derive(Clone)]
pub struct FraudTracker {
    threshold: u16,
    ttl: Duration,
    probes: Arc<Mutex<HashMap<String, ProbeRecord>>>,
}

const DEFAULT_PROBE_TTL_SECONDS: i64 = 600;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ProbeRecord {
    attempts: u16,
    last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FraudSignal {
    None,
    Escalated { attempts: u16 },
}

impl FraudTracker {
    pub fn new(threshold: u16) -> Self {
        Self::with_ttl(threshold, Duration::seconds(DEFAULT_PROBE_TTL_SECONDS))
    }

    pub fn with_ttl(threshold: u16, ttl: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            ttl,
            probes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn record(&self, key: impl AsRef<str>) -> FraudSignal {
        let key = key.as_ref();
        let now = Utc::now();
        let mut probes = self.probes.lock().expect("mutex poisoned");
        probes.retain(|_, record| now.signed_duration_since(record.last_seen) < self.ttl);

        let entry = probes
            .entry(key.to_owned())
            .and_modify(|record| {
                record.attempts = record.attempts.saturating_add(1);
                record.last_seen = now;
            })
            .or_insert_with(|| ProbeRecord {
                attempts: 1,
                last_seen: now,
            });
        counter!("ads_fraud_events_total", "state" => "probe").increment(1);

        if entry.attempts < self.threshold {
            return FraudSignal::None;
        }

        counter!("ads_fraud_events_total", "state" => "escalated").increment(1);
        FraudSignal::Escalated {
            attempts: entry.attempts,
        }
    }
}
