//! The engine facade: the only public entry points combining the key
//! generator, the regenerating cache, the aggregator, and the observation
//! store.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::aggregate::{TREND_FUNCTION, compute_trend};
use crate::cache::{CacheKey, KeyBuilder, RegenCache};
use crate::config::Settings;
use crate::domain::entities::{LocationRecord, PriceObservation, ProductRecord, TrendView};
use crate::domain::error::DomainError;
use crate::domain::types::{LocationId, ProductId};
use crate::store::ObservationStore;

use super::error::EngineError;

/// Input for one price fact.
#[derive(Debug, Clone)]
pub struct NewObservation {
    pub product: ProductId,
    pub location: LocationId,
    pub observed_at: OffsetDateTime,
    pub price: Decimal,
    pub currency: String,
}

/// Cached price aggregation engine.
///
/// Explicitly constructed with its collaborators and passed by handle;
/// created at process start, dropped at shutdown. The cache it owns is
/// in-memory and dies with it.
pub struct PriceEngine {
    store: Arc<ObservationStore>,
    trends: RegenCache<TrendView>,
    retry_attempts: NonZeroU32,
    cache_ttl: Duration,
    window_days: i64,
    timezone: Tz,
}

impl PriceEngine {
    pub fn new(settings: &Settings) -> Self {
        Self::with_store(settings, Arc::new(ObservationStore::new()))
    }

    /// Build the engine around an existing store handle, e.g. one shared
    /// with an ingestion pipeline.
    pub fn with_store(settings: &Settings, store: Arc<ObservationStore>) -> Self {
        Self {
            store,
            trends: RegenCache::new((&settings.cache).into()),
            retry_attempts: settings.store.retry_attempts,
            cache_ttl: settings.cache.expiration,
            window_days: settings.aggregation.window_days,
            timezone: settings.aggregation.timezone,
        }
    }

    pub fn store(&self) -> &Arc<ObservationStore> {
        &self.store
    }

    /// Window length used by [`PriceEngine::get_default_trend`].
    pub fn default_window_days(&self) -> i64 {
        self.window_days
    }

    /// Register a product. Re-registering an existing id updates display
    /// metadata only.
    pub fn register_product(
        &self,
        id: ProductId,
        title: impl Into<String>,
        unit: impl Into<String>,
    ) -> Result<ProductRecord, EngineError> {
        let title = title.into();
        let unit = unit.into();
        if id.as_str().is_empty() {
            return Err(DomainError::validation("product id must not be empty").into());
        }
        if title.trim().is_empty() {
            return Err(DomainError::validation("product title must not be empty").into());
        }

        let record = ProductRecord {
            id,
            title,
            unit,
            created_at: OffsetDateTime::now_utc(),
        };
        self.store.with_retry(self.retry_attempts, |txn| {
            txn.put_product(record.clone());
            Ok(())
        })?;
        info!(target: "application::engine", product = %record.id, "product registered");
        Ok(record)
    }

    /// Register a location.
    pub fn register_location(
        &self,
        id: LocationId,
        name: impl Into<String>,
        region: Option<String>,
    ) -> Result<LocationRecord, EngineError> {
        let name = name.into();
        if id.as_str().is_empty() {
            return Err(DomainError::validation("location id must not be empty").into());
        }
        if name.trim().is_empty() {
            return Err(DomainError::validation("location name must not be empty").into());
        }

        let record = LocationRecord {
            id,
            name,
            region,
            created_at: OffsetDateTime::now_utc(),
        };
        self.store.with_retry(self.retry_attempts, |txn| {
            txn.put_location(record.clone());
            Ok(())
        })?;
        info!(target: "application::engine", location = %record.id, "location registered");
        Ok(record)
    }

    /// Commit one immutable price fact.
    ///
    /// The write runs in a transaction retried on conflict up to the
    /// configured attempt budget; exhaustion surfaces a retryable
    /// [`EngineError`]. Nothing is invalidated synchronously: trend views
    /// pick the fact up when their cache entries expire.
    pub fn record_observation(
        &self,
        observation: NewObservation,
    ) -> Result<PriceObservation, EngineError> {
        let record = PriceObservation {
            id: Uuid::new_v4(),
            product: observation.product,
            location: observation.location,
            observed_at: observation.observed_at,
            price: observation.price,
            currency: observation.currency,
        };
        self.store.with_retry(self.retry_attempts, |txn| {
            txn.append(record.clone());
            Ok(())
        })?;
        debug!(
            target: "application::engine",
            product = %record.product,
            location = %record.location,
            observed_at = %record.observed_at,
            "observation recorded"
        );
        Ok(record)
    }

    /// Trend for (product, location) over the trailing `window_days`.
    ///
    /// Served from the regenerating cache: a fresh view returns untouched, a
    /// stale one is served while a single recomputation refreshes it in the
    /// background. Within one expiration window, repeated calls return the
    /// identical view, `computed_at` included.
    pub async fn get_trend(
        &self,
        product: &ProductId,
        location: &LocationId,
        window_days: i64,
    ) -> Result<Arc<TrendView>, EngineError> {
        if window_days <= 0 {
            return Err(EngineError::InvalidWindow { days: window_days });
        }

        let key = trend_key(product, location, window_days);
        let store = Arc::clone(&self.store);
        let product = product.clone();
        let location = location.clone();
        let timezone = self.timezone;

        let view = self
            .trends
            .get_or_compute(&key, self.cache_ttl, move || async move {
                let now = OffsetDateTime::now_utc();
                let since = now - time::Duration::days(window_days);
                let observations = store.query_since(&product, &location, since);
                let view = compute_trend(
                    &observations,
                    product,
                    location,
                    window_days,
                    now,
                    timezone,
                )?;
                Ok(view)
            })
            .await?;
        Ok(view)
    }

    /// [`PriceEngine::get_trend`] with the configured default window.
    pub async fn get_default_trend(
        &self,
        product: &ProductId,
        location: &LocationId,
    ) -> Result<Arc<TrendView>, EngineError> {
        self.get_trend(product, location, self.window_days).await
    }

    /// Drop the cached trend for one (product, location, window).
    pub fn evict_trend(
        &self,
        product: &ProductId,
        location: &LocationId,
        window_days: i64,
    ) -> bool {
        self.trends.evict(&trend_key(product, location, window_days))
    }

    /// Drop every cached trend.
    pub fn clear_trends(&self) {
        self.trends.clear();
    }

    pub fn product(&self, id: &ProductId) -> Option<ProductRecord> {
        self.store.product(id)
    }

    pub fn location(&self, id: &LocationId) -> Option<LocationRecord> {
        self.store.location(id)
    }

    pub fn products(&self) -> Vec<ProductRecord> {
        self.store.products()
    }

    pub fn locations(&self) -> Vec<LocationRecord> {
        self.store.locations()
    }
}

fn trend_key(product: &ProductId, location: &LocationId, window_days: i64) -> CacheKey {
    KeyBuilder::new(TREND_FUNCTION)
        .text(product.as_str())
        .text(location.as_str())
        .named_int("window_days", window_days)
        .finish()
}
