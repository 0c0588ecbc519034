//! Windowed trend aggregation.
//!
//! Pure computation from an observation sequence to a [`TrendView`]: bucket
//! by civil calendar day, average each day, and summarize the window. All
//! price arithmetic stays in `Decimal`; binary floating point never touches
//! a price.

use std::collections::BTreeMap;

use chrono_tz::Tz;
use rust_decimal::Decimal;
use thiserror::Error;
use time::{Date, Duration, OffsetDateTime};

use crate::domain::entities::{PriceDelta, PriceObservation, TrendPoint, TrendSummary, TrendView};
use crate::domain::types::{LocationId, ProductId};
use crate::util::timezone::civil_date;

/// Stable identity of the trend computation, used for cache key derivation.
pub const TREND_FUNCTION: &str = "mercato::aggregate::compute_trend";

#[derive(Debug, Clone, Error)]
pub enum AggregateError {
    #[error("aggregation window must be a positive number of days, got {days}")]
    InvalidWindow { days: i64 },
}

/// Aggregate `observations` into a trend over the trailing `window_days`
/// ending at `now`.
///
/// Only observations with `observed_at >= now - window_days` participate.
/// Days with multiple observations aggregate by arithmetic mean; days with
/// none are omitted from the series, never interpolated. An empty input
/// yields an empty series, not an error.
pub fn compute_trend(
    observations: &[PriceObservation],
    product: ProductId,
    location: LocationId,
    window_days: i64,
    now: OffsetDateTime,
    tz: Tz,
) -> Result<TrendView, AggregateError> {
    if window_days <= 0 {
        return Err(AggregateError::InvalidWindow { days: window_days });
    }
    let cutoff = now - Duration::days(window_days);

    let mut buckets: BTreeMap<Date, (Decimal, u32)> = BTreeMap::new();
    let mut min: Option<Decimal> = None;
    let mut max: Option<Decimal> = None;
    let mut total = Decimal::ZERO;
    let mut count = 0_u32;

    for obs in observations {
        if obs.observed_at < cutoff {
            continue;
        }
        let day = civil_date(obs.observed_at, tz);
        let bucket = buckets.entry(day).or_insert((Decimal::ZERO, 0));
        bucket.0 += obs.price;
        bucket.1 += 1;

        min = Some(min.map_or(obs.price, |m| m.min(obs.price)));
        max = Some(max.map_or(obs.price, |m| m.max(obs.price)));
        total += obs.price;
        count += 1;
    }

    let points: Vec<TrendPoint> = buckets
        .into_iter()
        .map(|(date, (sum, samples))| TrendPoint {
            date,
            price: sum / Decimal::from(samples),
            samples,
        })
        .collect();

    let summary = match (min, max) {
        (Some(min), Some(max)) if count > 0 => Some(TrendSummary {
            min,
            max,
            mean: total / Decimal::from(count),
        }),
        _ => None,
    };

    let delta = endpoint_delta(&points);

    Ok(TrendView {
        product,
        location,
        window_days,
        points,
        summary,
        delta,
        computed_at: now,
    })
}

/// Movement between the first and last day of the series; `None` for series
/// shorter than two days. Relative movement is undefined for a zero base.
fn endpoint_delta(points: &[TrendPoint]) -> Option<PriceDelta> {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 2 => (first, last),
        _ => return None,
    };
    let absolute = last.price - first.price;
    let relative = (!first.price.is_zero()).then(|| absolute / first.price);
    Some(PriceDelta { absolute, relative })
}
