//! Regenerating trend cache.
//!
//! A time-expiring key/value layer in front of expensive aggregation:
//!
//! - **Keys** (`keys`): deterministic, Unicode-normalizing derivation from a
//!   function identity plus its arguments.
//! - **Store** (`store`): per-key single-recompute election with stale
//!   serving, backed by detached background recomputation.
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `mercato.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! expiration_seconds = 30
//! ```

mod config;
mod keys;
mod store;

pub use config::CacheConfig;
pub use keys::{CacheKey, KeyBuilder};
pub use store::{BoxError, RecomputeError, RegenCache};

pub(crate) const METRIC_CACHE_HIT: &str = "mercato_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "mercato_cache_miss_total";
pub(crate) const METRIC_CACHE_STALE_SERVED: &str = "mercato_cache_stale_served_total";
pub(crate) const METRIC_CACHE_RECOMPUTE: &str = "mercato_cache_recompute_total";
pub(crate) const METRIC_CACHE_RECOMPUTE_FAILED: &str = "mercato_cache_recompute_failed_total";
pub(crate) const METRIC_CACHE_RECOMPUTE_MS: &str = "mercato_cache_recompute_ms";
