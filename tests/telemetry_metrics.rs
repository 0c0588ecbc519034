//! Metric keys emitted along the cache and store paths.

use std::time::Duration as StdDuration;

use metrics_util::debugging::DebuggingRecorder;
use rust_decimal_macros::dec;

use mercato::domain::types::{LocationId, ProductId};
use mercato::{NewObservation, PriceEngine, Settings};

#[tokio::test]
async fn hot_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let mut settings = Settings::default();
    settings.cache.expiration = StdDuration::from_millis(40);
    mercato::infra::telemetry::init(&settings.logging)
        .expect("tracing subscriber should install in this test process");
    let engine = PriceEngine::new(&settings);
    let milk = ProductId::new("milk");
    let riga = LocationId::new("riga");

    engine
        .register_product(milk.clone(), "Milk, whole", "l")
        .expect("register product");
    engine
        .register_location(riga.clone(), "Riga", None)
        .expect("register location");
    engine
        .record_observation(NewObservation {
            product: milk.clone(),
            location: riga.clone(),
            observed_at: time::OffsetDateTime::now_utc() - time::Duration::hours(1),
            price: dec!(1.09),
            currency: "EUR".to_string(),
        })
        .expect("record observation");

    // Miss then hit.
    engine.get_trend(&milk, &riga, 30).await.expect("first trend");
    engine.get_trend(&milk, &riga, 30).await.expect("cached trend");

    // Expire and recompute.
    tokio::time::sleep(StdDuration::from_millis(60)).await;
    engine.get_trend(&milk, &riga, 30).await.expect("recomputed trend");

    // Conflict: two raw transactions racing on one series.
    let store = engine.store();
    let mut first = store.begin();
    let mut second = store.begin();
    let obs = NewObservation {
        product: milk.clone(),
        location: riga.clone(),
        observed_at: time::OffsetDateTime::now_utc(),
        price: dec!(1.19),
        currency: "EUR".to_string(),
    };
    first.append(mercato::PriceObservation {
        id: uuid::Uuid::new_v4(),
        product: obs.product.clone(),
        location: obs.location.clone(),
        observed_at: obs.observed_at,
        price: obs.price,
        currency: obs.currency.clone(),
    });
    second.append(mercato::PriceObservation {
        id: uuid::Uuid::new_v4(),
        product: obs.product.clone(),
        location: obs.location.clone(),
        observed_at: obs.observed_at,
        price: obs.price,
        currency: obs.currency,
    });
    first.commit().expect("first commit wins");
    assert!(second.commit().is_err());

    let snapshot = snapshotter.snapshot().into_vec();
    let keys: Vec<String> = snapshot
        .iter()
        .map(|(key, _, _, _)| key.key().name().to_string())
        .collect();

    for expected in [
        "mercato_cache_hit_total",
        "mercato_cache_miss_total",
        "mercato_cache_recompute_total",
        "mercato_store_conflict_total",
    ] {
        assert!(
            keys.iter().any(|key| key == expected),
            "missing metric key `{expected}` in {keys:?}"
        );
    }
}
