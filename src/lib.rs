//! Mercato, a cached price aggregation engine.
//!
//! Turns a stream of immutable price observations, persisted transactionally,
//! into bounded-staleness trend views served from a stampede-safe
//! regenerating cache.
//!
//! ```
//! use mercato::{NewObservation, PriceEngine, Settings};
//! use mercato::domain::types::{LocationId, ProductId};
//! use rust_decimal::Decimal;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = PriceEngine::new(&Settings::default());
//! let milk = ProductId::new("milk");
//! let riga = LocationId::new("riga");
//!
//! engine.register_product(milk.clone(), "Milk, whole", "l")?;
//! engine.register_location(riga.clone(), "Riga", None)?;
//! engine.record_observation(NewObservation {
//!     product: milk.clone(),
//!     location: riga.clone(),
//!     observed_at: time::OffsetDateTime::now_utc(),
//!     price: Decimal::new(109, 2),
//!     currency: "EUR".to_string(),
//! })?;
//!
//! let trend = engine.get_trend(&milk, &riga, 30).await?;
//! assert_eq!(trend.points.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod store;

pub(crate) mod util;

pub use application::engine::{NewObservation, PriceEngine};
pub use application::error::EngineError;
pub use application::fixtures::{FixtureStats, load_fixtures};
pub use config::Settings;
pub use domain::entities::{PriceObservation, TrendPoint, TrendSummary, TrendView};
