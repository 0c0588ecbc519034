//! End-to-end trend behavior through the public engine surface.

use std::time::Duration as StdDuration;

use mercato::domain::types::{LocationId, ProductId};
use mercato::{NewObservation, PriceEngine, Settings, load_fixtures};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

fn settings_with_expiration(expiration: StdDuration) -> Settings {
    let mut settings = Settings::default();
    settings.cache.expiration = expiration;
    settings
}

fn seeded_engine() -> PriceEngine {
    let engine = PriceEngine::new(&Settings::default());
    engine
        .register_product(ProductId::new("milk"), "Milk, whole", "l")
        .expect("register product");
    engine
        .register_location(LocationId::new("riga"), "Riga", Some("LV".into()))
        .expect("register location");
    engine
}

fn observation(price: Decimal, observed_at: OffsetDateTime) -> NewObservation {
    NewObservation {
        product: ProductId::new("milk"),
        location: LocationId::new("riga"),
        observed_at,
        price,
        currency: "EUR".to_string(),
    }
}

#[tokio::test]
async fn two_days_of_observations_form_an_ordered_series() {
    let engine = seeded_engine();
    let now = OffsetDateTime::now_utc();

    engine
        .record_observation(observation(dec!(10.00), now - Duration::days(2)))
        .expect("record day 1");
    engine
        .record_observation(observation(dec!(12.00), now - Duration::days(1)))
        .expect("record day 2");

    let view = engine
        .get_trend(&ProductId::new("milk"), &LocationId::new("riga"), 30)
        .await
        .expect("trend");

    assert_eq!(view.points.len(), 2);
    assert_eq!(view.points[0].price, dec!(10.00));
    assert_eq!(view.points[1].price, dec!(12.00));
    assert!(view.points[0].date < view.points[1].date);

    let delta = view.delta.as_ref().expect("two-day delta");
    assert_eq!(delta.absolute, dec!(2.00));
    assert_eq!(delta.relative, Some(dec!(0.2)));
}

#[tokio::test]
async fn same_day_observations_average_to_the_mean() {
    let engine = seeded_engine();
    let now = OffsetDateTime::now_utc();

    engine
        .record_observation(observation(dec!(10.00), now - Duration::seconds(30)))
        .expect("record first");
    engine
        .record_observation(observation(dec!(14.00), now - Duration::seconds(10)))
        .expect("record second");

    let view = engine
        .get_trend(&ProductId::new("milk"), &LocationId::new("riga"), 30)
        .await
        .expect("trend");

    let summary = view.summary.as_ref().expect("summary");
    assert_eq!(summary.mean, dec!(12.00));
    assert_eq!(summary.min, dec!(10.00));
    assert_eq!(summary.max, dec!(14.00));
    assert_eq!(
        view.points.iter().map(|p| p.samples).sum::<u32>(),
        2,
        "both observations participate"
    );
}

#[tokio::test]
async fn trend_without_observations_is_empty_not_an_error() {
    let engine = seeded_engine();

    let view = engine
        .get_trend(&ProductId::new("milk"), &LocationId::new("riga"), 30)
        .await
        .expect("empty trend");

    assert!(view.is_empty());
    assert!(view.summary.is_none());
    assert!(view.delta.is_none());
}

#[tokio::test]
async fn repeated_calls_within_the_window_return_the_identical_view() {
    let engine = seeded_engine();
    let now = OffsetDateTime::now_utc();
    engine
        .record_observation(observation(dec!(10.00), now - Duration::days(1)))
        .expect("record");

    let milk = ProductId::new("milk");
    let riga = LocationId::new("riga");
    let first = engine.get_trend(&milk, &riga, 30).await.expect("first");
    let second = engine.get_trend(&milk, &riga, 30).await.expect("second");

    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(first.computed_at, second.computed_at);
}

#[tokio::test]
async fn writes_do_not_invalidate_a_fresh_view() {
    let engine = seeded_engine();
    let now = OffsetDateTime::now_utc();
    let milk = ProductId::new("milk");
    let riga = LocationId::new("riga");

    engine
        .record_observation(observation(dec!(10.00), now - Duration::days(1)))
        .expect("record");
    let before = engine.get_trend(&milk, &riga, 30).await.expect("cached");

    engine
        .record_observation(observation(dec!(99.00), now - Duration::minutes(5)))
        .expect("record after caching");
    let after = engine.get_trend(&milk, &riga, 30).await.expect("still cached");

    // Staleness is bounded by expiration, not by writes.
    assert!(std::sync::Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn eviction_forces_a_fresh_view() {
    let engine = seeded_engine();
    let now = OffsetDateTime::now_utc();
    let milk = ProductId::new("milk");
    let riga = LocationId::new("riga");

    engine
        .record_observation(observation(dec!(10.00), now - Duration::days(1)))
        .expect("record");
    let before = engine.get_trend(&milk, &riga, 30).await.expect("cached");

    engine
        .record_observation(observation(dec!(12.00), now - Duration::minutes(5)))
        .expect("record after caching");
    assert!(engine.evict_trend(&milk, &riga, 30));

    let after = engine.get_trend(&milk, &riga, 30).await.expect("recomputed");
    assert!(!std::sync::Arc::ptr_eq(&before, &after));
    assert!(after.points.iter().map(|p| p.samples).sum::<u32>() > before
        .points
        .iter()
        .map(|p| p.samples)
        .sum::<u32>());
}

#[tokio::test]
async fn distinct_windows_are_cached_independently() {
    let engine = seeded_engine();
    let now = OffsetDateTime::now_utc();
    let milk = ProductId::new("milk");
    let riga = LocationId::new("riga");

    engine
        .record_observation(observation(dec!(10.00), now - Duration::days(10)))
        .expect("older observation");
    engine
        .record_observation(observation(dec!(12.00), now - Duration::days(1)))
        .expect("recent observation");

    let wide = engine.get_trend(&milk, &riga, 30).await.expect("30-day");
    let narrow = engine.get_trend(&milk, &riga, 7).await.expect("7-day");

    assert_eq!(wide.points.len(), 2);
    assert_eq!(narrow.points.len(), 1);
    assert_eq!(narrow.points[0].price, dec!(12.00));
}

#[tokio::test]
async fn unregistered_pair_reads_as_an_empty_view() {
    let engine = PriceEngine::new(&Settings::default());
    let view = engine
        .get_trend(&ProductId::new("nothing"), &LocationId::new("nowhere"), 30)
        .await
        .expect("reads are lenient");
    assert!(view.is_empty());
}

#[tokio::test]
async fn default_window_comes_from_settings() {
    let engine = seeded_engine();
    assert_eq!(engine.default_window_days(), 30);

    let view = engine
        .get_default_trend(&ProductId::new("milk"), &LocationId::new("riga"))
        .await
        .expect("default trend");
    assert_eq!(view.window_days, 30);
}

#[tokio::test]
async fn fixtures_feed_the_trend_pipeline() {
    let engine = PriceEngine::new(&settings_with_expiration(StdDuration::from_secs(30)));
    let now = OffsetDateTime::now_utc();
    let day1 = (now - Duration::days(2)).format(&Rfc3339).expect("format");
    let day2 = (now - Duration::days(1)).format(&Rfc3339).expect("format");

    let document = format!(
        r#"{{
            "products": [{{"id": "rye bread", "title": "Rye bread", "unit": "kg"}}],
            "locations": [{{"id": "tallinn", "name": "Tallinn"}}],
            "observations": [
                {{"product": "rye bread", "location": "tallinn",
                  "observed_at": "{day1}", "price": "2.40", "currency": "EUR"}},
                {{"product": "rye bread", "location": "tallinn",
                  "observed_at": "{day2}", "price": "2.60", "currency": "EUR"}}
            ]
        }}"#
    );

    let stats = load_fixtures(&engine, &document).expect("fixtures");
    assert_eq!(stats.observations, 2);

    let view = engine
        .get_trend(&ProductId::new("rye bread"), &LocationId::new("tallinn"), 30)
        .await
        .expect("trend");
    assert_eq!(view.points.len(), 2);
    assert_eq!(view.points[0].price, dec!(2.40));
    assert_eq!(view.points[1].price, dec!(2.60));
}
