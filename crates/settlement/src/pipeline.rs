use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use whistle_ads_domain::storage::SettlementStore;

use crate::worker::SettlementError;

/// Runs one settlement sweep: promotes every `estimated` earnings row whose
/// period ended before `now` to `finalized`, then records `now` as the last
/// sweep time. Returns how many rows were promoted.
///
/// Generic over the store so tests can drive it with a mock.
pub async fn settle_once<S>(storage: &S, now: DateTime<Utc>) -> Result<u64, SettlementError>
where
    S: SettlementStore,
{
    let finalized = storage.finalize_due_earnings(now).await?;
    if finalized > 0 {
        counter!("ads_settlement_finalized_total").increment(finalized);
    }

    storage.upsert_last_settled_at(now).await?;
    gauge!("ads_settlement_last_run_timestamp").set(now.timestamp() as f64);

    Ok(finalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use whistle_ads_domain::storage::{StorageError, StorageResult};

    #[derive(Clone, Default)]
    struct MockStorage {
        due: Arc<AtomicU64>,
        sweeps: Arc<AtomicUsize>,
        checkpoint: Arc<Mutex<Option<DateTime<Utc>>>>,
        fail_finalize: bool,
    }

    #[async_trait]
    impl SettlementStore for MockStorage {
        async fn finalize_due_earnings(&self, _now: DateTime<Utc>) -> StorageResult<u64> {
            if self.fail_finalize {
                return Err(StorageError::from_source("finalize failed"));
            }
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            Ok(self.due.swap(0, Ordering::SeqCst))
        }

        async fn last_settled_at(&self) -> StorageResult<Option<DateTime<Utc>>> {
            Ok(*self.checkpoint.lock().unwrap())
        }

        async fn upsert_last_settled_at(&self, at: DateTime<Utc>) -> StorageResult<()> {
            *self.checkpoint.lock().unwrap() = Some(at);
            Ok(())
        }
    }

    #[tokio::test]
    async fn finalizes_due_rows_and_records_checkpoint() {
        let storage = MockStorage::default();
        storage.due.store(3, Ordering::SeqCst);
        let now = Utc::now();

        let finalized = settle_once(&storage, now).await.expect("sweep succeeds");

        assert_eq!(finalized, 3);
        assert_eq!(storage.sweeps.load(Ordering::SeqCst), 1);
        assert_eq!(*storage.checkpoint.lock().unwrap(), Some(now));
    }

    #[tokio::test]
    async fn idle_sweep_still_records_checkpoint() {
        let storage = MockStorage::default();
        let now = Utc::now();

        let finalized = settle_once(&storage, now).await.expect("sweep succeeds");

        assert_eq!(finalized, 0);
        assert_eq!(*storage.checkpoint.lock().unwrap(), Some(now));
    }

    #[tokio::test]
    async fn failed_finalize_leaves_checkpoint_untouched() {
        let storage = MockStorage {
            fail_finalize: true,
            ..Default::default()
        };

        let result = settle_once(&storage, Utc::now()).await;

        assert!(result.is_err());
        assert_eq!(*storage.checkpoint.lock().unwrap(), None);
    }
}
