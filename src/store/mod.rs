//! Transactional observation store.
//!
//! An in-memory, append-only object store for the product/location catalog
//! and their price observation series. Writes are staged on a [`StoreTxn`]
//! and committed with optimistic concurrency: the commit fails with
//! [`ConflictError`] when a concurrent transaction already wrote one of the
//! same targets. Reads run under a single consistent snapshot and never
//! observe a partially committed transaction.

mod root;
mod txn;

use std::num::NonZeroU32;
use std::sync::RwLock;

use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::domain::entities::{LocationRecord, PriceObservation, ProductRecord};
use crate::domain::types::{LocationId, ProductId};
use crate::util::sync::read_or_recover;

use root::{SeriesKey, StoreRoot};
pub use txn::StoreTxn;

pub(crate) const METRIC_STORE_CONFLICT: &str = "mercato_store_conflict_total";
pub(crate) const METRIC_STORE_RETRY: &str = "mercato_store_retry_total";

/// A transactional write that lost the race against a concurrent commit.
#[derive(Debug, Clone, Error)]
#[error("concurrent transaction already committed to `{namespace}`")]
pub struct ConflictError {
    pub namespace: &'static str,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error("unknown product `{0}`")]
    UnknownProduct(ProductId),
    #[error("unknown location `{0}`")]
    UnknownLocation(LocationId),
}

/// The shared store handle. Explicitly constructed and passed around; there
/// is no ambient global instance.
#[derive(Debug, Default)]
pub struct ObservationStore {
    pub(crate) root: RwLock<StoreRoot>,
}

impl ObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a transaction against the current store epoch.
    pub fn begin(&self) -> StoreTxn<'_> {
        let epoch = read_or_recover(&self.root, "store.begin").epoch;
        StoreTxn::new(self, epoch)
    }

    /// Run `unit` in a fresh transaction, retrying the whole unit of work on
    /// commit conflict up to `attempts` times.
    ///
    /// Non-conflict errors from `unit` or from the commit propagate
    /// immediately; conflict exhaustion surfaces the final [`ConflictError`].
    pub fn with_retry<T, F>(&self, attempts: NonZeroU32, mut unit: F) -> Result<T, StoreError>
    where
        F: FnMut(&mut StoreTxn<'_>) -> Result<T, StoreError>,
    {
        let mut last_conflict = None;
        for attempt in 1..=attempts.get() {
            if attempt > 1 {
                counter!(METRIC_STORE_RETRY).increment(1);
                debug!(target: "store", attempt, "retrying transactional unit after conflict");
            }
            let mut txn = self.begin();
            let value = unit(&mut txn)?;
            match txn.commit() {
                Ok(()) => return Ok(value),
                Err(StoreError::Conflict(err)) => {
                    last_conflict = Some(err);
                }
                Err(other) => return Err(other),
            }
        }
        Err(StoreError::Conflict(last_conflict.unwrap_or(ConflictError {
            namespace: "store",
        })))
    }

    /// Time-ordered observations for (product, location) with
    /// `observed_at >= since`, read under one consistent snapshot.
    pub fn query_since(
        &self,
        product: &ProductId,
        location: &LocationId,
        since: OffsetDateTime,
    ) -> Vec<PriceObservation> {
        let root = read_or_recover(&self.root, "store.query_since");
        let key = SeriesKey {
            product: product.clone(),
            location: location.clone(),
        };
        match root.series.get(&key) {
            Some(series) => series
                .observations
                .range((since, Uuid::nil())..)
                .map(|(_, obs)| obs.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn product(&self, id: &ProductId) -> Option<ProductRecord> {
        read_or_recover(&self.root, "store.product")
            .products
            .get(id)
            .map(|versioned| versioned.record.clone())
    }

    pub fn location(&self, id: &LocationId) -> Option<LocationRecord> {
        read_or_recover(&self.root, "store.location")
            .locations
            .get(id)
            .map(|versioned| versioned.record.clone())
    }

    /// All products, ordered by id.
    pub fn products(&self) -> Vec<ProductRecord> {
        read_or_recover(&self.root, "store.products")
            .products
            .values()
            .map(|versioned| versioned.record.clone())
            .collect()
    }

    /// All locations, ordered by id.
    pub fn locations(&self) -> Vec<LocationRecord> {
        read_or_recover(&self.root, "store.locations")
            .locations
            .values()
            .map(|versioned| versioned.record.clone())
            .collect()
    }

    /// Commit counter; advances by one per committed transaction.
    pub fn epoch(&self) -> u64 {
        read_or_recover(&self.root, "store.epoch").epoch
    }
}
