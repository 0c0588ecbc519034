//! Domain records: the persistent catalog, immutable price facts, and the
//! derived trend views served from the cache.

use rust_decimal::Decimal;
use serde::Serialize;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::domain::types::{LocationId, ProductId};

/// A tracked product. Created administratively; only display metadata may
/// change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub title: String,
    /// Unit of measure the price refers to, e.g. `"kg"` or `"l"`.
    pub unit: String,
    pub created_at: OffsetDateTime,
}

/// A place where prices are observed. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRecord {
    pub id: LocationId,
    pub name: String,
    pub region: Option<String>,
    pub created_at: OffsetDateTime,
}

/// One recorded price fact. Append-only: corrections are newer observations
/// superseding older ones by timestamp, never edits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceObservation {
    pub id: Uuid,
    pub product: ProductId,
    pub location: LocationId,
    pub observed_at: OffsetDateTime,
    pub price: Decimal,
    pub currency: String,
}

/// One day of the aggregated series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: Date,
    /// Arithmetic mean of the day's observations.
    pub price: Decimal,
    pub samples: u32,
}

/// Window-wide statistics across every in-window observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub min: Decimal,
    pub max: Decimal,
    pub mean: Decimal,
}

/// Price movement between the first and last day of the series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceDelta {
    pub absolute: Decimal,
    /// `None` when the base price is zero.
    pub relative: Option<Decimal>,
}

/// The cacheable aggregate: per-day mean series plus window statistics.
///
/// Never persisted; always reconstructable from the observation store and
/// discarded when its cache entry expires.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendView {
    pub product: ProductId,
    pub location: LocationId,
    pub window_days: i64,
    pub points: Vec<TrendPoint>,
    pub summary: Option<TrendSummary>,
    pub delta: Option<PriceDelta>,
    pub computed_at: OffsetDateTime,
}

impl TrendView {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
