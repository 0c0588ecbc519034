//! Stampede-safe regenerating cache storage.
//!
//! Per-key lifecycle: absent → computing → fresh → stale → computing → … .
//! At most one recomputation is ever in flight per key. While one runs,
//! readers holding a previous value get it immediately; only first-time
//! readers (nothing to serve) and the elected recomputing caller wait.
//!
//! Recomputation runs in a detached task: abandoning the request that
//! triggered it never cancels the computation other readers depend on.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics::{counter, histogram};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::util::sync::lock_or_recover;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::{
    METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_RECOMPUTE, METRIC_CACHE_RECOMPUTE_FAILED,
    METRIC_CACHE_RECOMPUTE_MS, METRIC_CACHE_STALE_SERVED,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of an in-flight recomputation, observed only by callers that had
/// nothing cached to fall back on (plus the elected recomputing caller).
#[derive(Debug, Clone, Error)]
pub enum RecomputeError {
    #[error("recomputation failed: {0}")]
    Failed(String),
    #[error("recomputation task aborted before completing")]
    Aborted,
}

type FlightResult<V> = Result<Arc<V>, RecomputeError>;
type FlightReceiver<V> = watch::Receiver<Option<FlightResult<V>>>;

struct StoredValue<V> {
    value: Arc<V>,
    computed_at: OffsetDateTime,
    expires_at: OffsetDateTime,
}

struct EntryState<V> {
    value: Option<StoredValue<V>>,
    flight: Option<FlightReceiver<V>>,
}

struct CacheEntry<V> {
    state: Mutex<EntryState<V>>,
}

impl<V> CacheEntry<V> {
    fn new() -> Self {
        Self {
            state: Mutex::new(EntryState {
                value: None,
                flight: None,
            }),
        }
    }
}

/// Sharded, time-expiring cache with single-recompute election per key.
///
/// Entries for distinct keys never contend; a single entry's state
/// transitions happen atomically under its own lock.
pub struct RegenCache<V> {
    entries: DashMap<CacheKey, Arc<CacheEntry<V>>>,
    config: CacheConfig,
}

impl<V: Send + Sync + 'static> RegenCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// The configured expiration, for callers that do not pick their own.
    pub fn default_expiration(&self) -> Duration {
        self.config.expiration()
    }

    /// Return the cached value for `key`, or compute it.
    ///
    /// - fresh value: returned immediately, no recomputation;
    /// - expired value: one caller is elected to recompute and waits for the
    ///   fresh result, every other concurrent caller gets the expired value
    ///   immediately;
    /// - no value yet: one caller starts the computation, everyone waits on
    ///   it.
    ///
    /// `compute` is invoked at most once per election to build the detached
    /// computation. A failed recomputation leaves a previous value in place
    /// (served until a later access re-elects after expiry) and surfaces the
    /// failure only to the callers that were waiting on it.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<Arc<V>, RecomputeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, BoxError>> + Send + 'static,
    {
        if !self.config.enabled {
            return compute()
                .await
                .map(Arc::new)
                .map_err(|err| RecomputeError::Failed(err.to_string()));
        }

        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(CacheEntry::new()))
            .clone();

        let rx = {
            let mut state = lock_or_recover(&entry.state, "cache.get_or_compute");
            let now = OffsetDateTime::now_utc();

            if let Some(stored) = &state.value {
                if now < stored.expires_at {
                    counter!(METRIC_CACHE_HIT).increment(1);
                    return Ok(stored.value.clone());
                }
            }

            if let Some(flight) = &state.flight {
                // A recomputation is already in flight for this key.
                if let Some(stored) = &state.value {
                    counter!(METRIC_CACHE_STALE_SERVED).increment(1);
                    return Ok(stored.value.clone());
                }
                counter!(METRIC_CACHE_MISS).increment(1);
                flight.clone()
            } else {
                // Elected: this caller owns the recomputation.
                if state.value.is_none() {
                    counter!(METRIC_CACHE_MISS).increment(1);
                }
                let rx = launch(Arc::clone(&entry), key.clone(), ttl, compute());
                state.flight = Some(rx.clone());
                rx
            }
        };

        await_flight(rx).await
    }

    /// Drop the entry for `key`. An in-flight recomputation for it still runs
    /// to completion but its result is discarded with the detached entry.
    pub fn evict(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of keys with an entry (including entries still computing).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Spawn the detached recomputation and return the receiver its waiters
/// subscribe to. The caller stores the receiver in the entry while still
/// holding the entry lock, so a second election for the same key is
/// impossible.
fn launch<V, Fut>(
    entry: Arc<CacheEntry<V>>,
    key: CacheKey,
    ttl: Duration,
    fut: Fut,
) -> FlightReceiver<V>
where
    V: Send + Sync + 'static,
    Fut: Future<Output = Result<V, BoxError>> + Send + 'static,
{
    counter!(METRIC_CACHE_RECOMPUTE).increment(1);
    let (tx, rx) = watch::channel(None);

    tokio::spawn(async move {
        let started = Instant::now();
        let outcome = fut.await;

        let mut state = lock_or_recover(&entry.state, "cache.apply_result");
        state.flight = None;
        let result = match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                let now = OffsetDateTime::now_utc();
                let mut expires_at = now + ttl;
                if let Some(previous) = &state.value {
                    // Results apply in completion order; expiry must strictly
                    // advance even if the clock did not.
                    if expires_at <= previous.expires_at {
                        expires_at = previous.expires_at + Duration::from_millis(1);
                    }
                }
                state.value = Some(StoredValue {
                    value: Arc::clone(&value),
                    computed_at: now,
                    expires_at,
                });
                histogram!(METRIC_CACHE_RECOMPUTE_MS)
                    .record(started.elapsed().as_secs_f64() * 1000.0);
                debug!(target: "cache", key = %key, "cache entry refreshed");
                Ok(value)
            }
            Err(err) => {
                counter!(METRIC_CACHE_RECOMPUTE_FAILED).increment(1);
                warn!(
                    target: "cache",
                    key = %key,
                    error = %err,
                    "recomputation failed; keeping previous value if any"
                );
                Err(RecomputeError::Failed(err.to_string()))
            }
        };
        drop(state);
        let _ = tx.send(Some(result));
    });

    rx
}

async fn await_flight<V>(mut rx: FlightReceiver<V>) -> Result<Arc<V>, RecomputeError> {
    match rx.wait_for(|slot| slot.is_some()).await {
        Ok(slot) => match &*slot {
            Some(result) => result.clone(),
            None => Err(RecomputeError::Aborted),
        },
        Err(_) => Err(RecomputeError::Aborted),
    }
}
