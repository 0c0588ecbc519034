//! JSON fixture loading for tests and seeding.
//!
//! A fixture document registers catalog records first, then replays
//! observations through the normal write path, so every integrity rule the
//! engine enforces applies to fixture data too.

use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::types::{LocationId, ProductId};

use super::engine::{NewObservation, PriceEngine};
use super::error::EngineError;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("fixture document could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Deserialize)]
struct FixtureDocument {
    #[serde(default)]
    products: Vec<ProductFixture>,
    #[serde(default)]
    locations: Vec<LocationFixture>,
    #[serde(default)]
    observations: Vec<ObservationFixture>,
}

#[derive(Debug, Deserialize)]
struct ProductFixture {
    id: String,
    title: String,
    unit: String,
}

#[derive(Debug, Deserialize)]
struct LocationFixture {
    id: String,
    name: String,
    #[serde(default)]
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObservationFixture {
    product: String,
    location: String,
    #[serde(with = "time::serde::rfc3339")]
    observed_at: OffsetDateTime,
    price: rust_decimal::Decimal,
    currency: String,
}

/// Counts of records a fixture load registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixtureStats {
    pub products: usize,
    pub locations: usize,
    pub observations: usize,
}

/// Parse `json` and replay it into `engine`.
pub fn load_fixtures(engine: &PriceEngine, json: &str) -> Result<FixtureStats, FixtureError> {
    let document: FixtureDocument = serde_json::from_str(json)?;
    let mut stats = FixtureStats::default();

    for product in document.products {
        engine.register_product(ProductId::new(product.id), product.title, product.unit)?;
        stats.products += 1;
    }
    for location in document.locations {
        engine.register_location(LocationId::new(location.id), location.name, location.region)?;
        stats.locations += 1;
    }
    for obs in document.observations {
        engine.record_observation(NewObservation {
            product: ProductId::new(obs.product),
            location: LocationId::new(obs.location),
            observed_at: obs.observed_at,
            price: obs.price,
            currency: obs.currency,
        })?;
        stats.observations += 1;
    }

    Ok(stats)
}
