//! Staged transactions with optimistic commit.

use std::collections::{BTreeMap, BTreeSet};

use metrics::counter;
use tracing::warn;

use crate::domain::entities::{LocationRecord, PriceObservation, ProductRecord};
use crate::domain::types::{LocationId, ProductId};
use crate::util::sync::write_or_recover;

use super::root::{SeriesKey, Versioned};
use super::{ConflictError, METRIC_STORE_CONFLICT, ObservationStore, StoreError};

/// A unit of staged writes against a snapshot of the store epoch.
///
/// Nothing staged here is visible to readers until [`StoreTxn::commit`]
/// succeeds; a commit succeeds only if no concurrent transaction has written
/// any of the same targets since this transaction began.
pub struct StoreTxn<'a> {
    store: &'a ObservationStore,
    begin_epoch: u64,
    products: BTreeMap<ProductId, ProductRecord>,
    locations: BTreeMap<LocationId, LocationRecord>,
    appends: Vec<PriceObservation>,
}

impl<'a> StoreTxn<'a> {
    pub(super) fn new(store: &'a ObservationStore, begin_epoch: u64) -> Self {
        Self {
            store,
            begin_epoch,
            products: BTreeMap::new(),
            locations: BTreeMap::new(),
            appends: Vec::new(),
        }
    }

    /// Stage a product registration or display-metadata update.
    pub fn put_product(&mut self, record: ProductRecord) {
        self.products.insert(record.id.clone(), record);
    }

    /// Stage a location registration.
    pub fn put_location(&mut self, record: LocationRecord) {
        self.locations.insert(record.id.clone(), record);
    }

    /// Stage an immutable price fact. Referential checks run at commit.
    pub fn append(&mut self, observation: PriceObservation) {
        self.appends.push(observation);
    }

    /// Atomically apply all staged writes.
    ///
    /// Conflict detection is per written target: entities and observation
    /// series this transaction did not touch never cause a conflict.
    pub fn commit(self) -> Result<(), StoreError> {
        let mut root = write_or_recover(&self.store.root, "txn.commit");

        for id in self.products.keys() {
            if let Some(existing) = root.products.get(id) {
                if existing.modified_epoch > self.begin_epoch {
                    return Err(conflict("products"));
                }
            }
        }
        for id in self.locations.keys() {
            if let Some(existing) = root.locations.get(id) {
                if existing.modified_epoch > self.begin_epoch {
                    return Err(conflict("locations"));
                }
            }
        }

        let touched: BTreeSet<SeriesKey> = self
            .appends
            .iter()
            .map(|obs| SeriesKey {
                product: obs.product.clone(),
                location: obs.location.clone(),
            })
            .collect();
        for key in &touched {
            if let Some(series) = root.series.get(key) {
                if series.modified_epoch > self.begin_epoch {
                    return Err(conflict("observations"));
                }
            }
        }

        for obs in &self.appends {
            if !self.products.contains_key(&obs.product) && !root.products.contains_key(&obs.product)
            {
                return Err(StoreError::UnknownProduct(obs.product.clone()));
            }
            if !self.locations.contains_key(&obs.location)
                && !root.locations.contains_key(&obs.location)
            {
                return Err(StoreError::UnknownLocation(obs.location.clone()));
            }
        }

        let epoch = root.next_epoch();
        for (id, record) in self.products {
            root.products.insert(
                id,
                Versioned {
                    record,
                    modified_epoch: epoch,
                },
            );
        }
        for (id, record) in self.locations {
            root.locations.insert(
                id,
                Versioned {
                    record,
                    modified_epoch: epoch,
                },
            );
        }
        for obs in self.appends {
            let key = SeriesKey {
                product: obs.product.clone(),
                location: obs.location.clone(),
            };
            let series = root.series.entry(key).or_default();
            series.modified_epoch = epoch;
            series.observations.insert((obs.observed_at, obs.id), obs);
        }

        Ok(())
    }
}

fn conflict(namespace: &'static str) -> StoreError {
    counter!(METRIC_STORE_CONFLICT).increment(1);
    warn!(
        target: "store::txn",
        namespace,
        "commit lost the race against a concurrent transaction"
    );
    StoreError::Conflict(ConflictError { namespace })
}
