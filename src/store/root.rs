//! In-memory object graph behind the store's lock.
//!
//! Every namespace entry remembers the epoch of the commit that last wrote
//! it; transactions compare those against their begin epoch to detect
//! conflicting concurrent commits.

use std::collections::BTreeMap;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{LocationRecord, PriceObservation, ProductRecord};
use crate::domain::types::{LocationId, ProductId};

/// Commit counter. Epoch 0 is "never written".
pub(crate) type Epoch = u64;

#[derive(Debug, Clone)]
pub(crate) struct Versioned<T> {
    pub record: T,
    pub modified_epoch: Epoch,
}

/// Identity of one observation series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct SeriesKey {
    pub product: ProductId,
    pub location: LocationId,
}

/// Observations for one (product, location), ordered by timestamp then id so
/// same-instant facts have a stable total order.
#[derive(Debug, Default)]
pub(crate) struct ObservationSeries {
    pub modified_epoch: Epoch,
    pub observations: BTreeMap<(OffsetDateTime, Uuid), PriceObservation>,
}

#[derive(Debug, Default)]
pub(crate) struct StoreRoot {
    pub epoch: Epoch,
    pub products: BTreeMap<ProductId, Versioned<ProductRecord>>,
    pub locations: BTreeMap<LocationId, Versioned<LocationRecord>>,
    pub series: BTreeMap<SeriesKey, ObservationSeries>,
}

impl StoreRoot {
    pub fn next_epoch(&mut self) -> Epoch {
        self.epoch += 1;
        self.epoch
    }
}
