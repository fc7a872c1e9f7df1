use catalog_engine::{EngineConfig, Reconciler};
use catalog_protocol::{CatalogRecord, FieldValue, RecordId, RecordKind, RunMode};
use catalog_rules::{ImageIntent, RuleRegistry};
use catalog_store::{
    CatalogStore, FaultPlan, InMemoryPrincipals, InMemoryStore, PrincipalDirectory,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn product(id: &str, name: &str, slug: Option<&str>, price: i64) -> CatalogRecord {
    let mut rec = CatalogRecord::new(RecordId::from(id), RecordKind::Product, 1);
    rec.set_field("name", FieldValue::text(name));
    rec.set_field("slug", slug.map_or(FieldValue::Null, FieldValue::text));
    rec.set_field("base_price", FieldValue::Int(price));
    rec.set_field("images", FieldValue::list(vec!["https://cdn.example.com/real/x.jpg"]));
    rec
}

fn test_config() -> EngineConfig {
    EngineConfig {
        // Single worker keeps evaluation order deterministic in tests.
        workers: 1,
        throttle_ms: 0,
        retry_base_ms: 1,
        ..EngineConfig::default()
    }
}

fn reconciler(store: &Arc<InMemoryStore>, intent: ImageIntent) -> Reconciler {
    let principals: Arc<dyn PrincipalDirectory> = Arc::new(InMemoryPrincipals::default());
    let catalog: Arc<dyn CatalogStore> = store.clone();
    Reconciler::new(
        catalog,
        principals,
        RuleRegistry::standard(intent),
        test_config(),
    )
}

#[tokio::test]
async fn duplicate_names_get_deterministic_suffixes() {
    let store = Arc::new(InMemoryStore::new());
    store.seed(product("p1", "Café Clásico", None, 4500));
    store.seed(product("p2", "Café Clásico", None, 4500));

    let report = reconciler(&store, ImageIntent::Off).run(RunMode::Commit).await;
    assert_eq!(report.patched, 2);
    assert!(report.completed());

    let first = store.snapshot(RecordKind::Product, &RecordId::from("p1")).await;
    let second = store.snapshot(RecordKind::Product, &RecordId::from("p2")).await;
    assert_eq!(first.text("slug"), Some("cafe-clasico"));
    assert_eq!(second.text("slug"), Some("cafe-clasico-2"));
}

#[tokio::test]
async fn concurrent_workers_keep_slugs_unique() {
    let store = Arc::new(InMemoryStore::new());
    store.seed(product("p1", "Café Clásico", None, 4500));
    store.seed(product("p2", "Café Clásico", None, 4500));
    store.seed(product("p3", "Café Clásico", None, 4500));

    let principals: Arc<dyn PrincipalDirectory> = Arc::new(InMemoryPrincipals::default());
    let catalog: Arc<dyn CatalogStore> = store.clone();
    let config = EngineConfig {
        workers: 5,
        throttle_ms: 0,
        retry_base_ms: 1,
        ..EngineConfig::default()
    };
    let engine = Reconciler::new(
        catalog,
        principals,
        RuleRegistry::standard(ImageIntent::Off),
        config,
    );

    let report = engine.run(RunMode::Commit).await;
    assert!(report.completed());
    assert_eq!(report.patched, 3);

    // Which record lands which suffix depends on worker interleaving;
    // the invariant is that no two share one.
    let mut slugs = std::collections::BTreeSet::new();
    for id in ["p1", "p2", "p3"] {
        let rec = store.snapshot(RecordKind::Product, &RecordId::from(id)).await;
        let slug = rec.text("slug").expect("slug written").to_string();
        assert!(slug.starts_with("cafe-clasico"), "unexpected slug {slug}");
        slugs.insert(slug);
    }
    assert_eq!(slugs.len(), 3);
}

#[tokio::test]
async fn second_commit_run_performs_zero_writes() {
    let store = Arc::new(InMemoryStore::new());
    // One defect per record: rules are mutually exclusive per run, so a
    // record with several defects converges over several runs instead.
    store.seed(product("p1", "CafÃ© ClÃ¡sico", Some("cafe-clasico"), 4500));
    store.seed(product("p2", "Plain Thing", None, 900));
    let mut no_images = product("p3", "Bare", Some("bare"), 2000);
    no_images.set_field("images", FieldValue::Null);
    store.seed(no_images);

    let first = reconciler(&store, ImageIntent::Seed).run(RunMode::Commit).await;
    assert!(first.patched > 0);
    let writes_after_first = store.write_count();
    assert!(writes_after_first > 0);

    let second = reconciler(&store, ImageIntent::Seed).run(RunMode::Commit).await;
    assert_eq!(store.write_count(), writes_after_first);
    assert_eq!(second.patched, 0);
    assert_eq!(second.skipped, second.scanned);
}

#[tokio::test]
async fn encoding_repair_precedes_slug_derivation() {
    let store = Arc::new(InMemoryStore::new());
    store.seed(product("p1", "CafÃ© ClÃ¡sico", None, 4500));

    // First run fixes the name; the slug derives from the repaired name on
    // the following run, never from the garbled one.
    reconciler(&store, ImageIntent::Off).run(RunMode::Commit).await;
    let after_first = store.snapshot(RecordKind::Product, &RecordId::from("p1")).await;
    assert_eq!(after_first.text("name"), Some("Café Clásico"));

    reconciler(&store, ImageIntent::Off).run(RunMode::Commit).await;
    let after_second = store.snapshot(RecordKind::Product, &RecordId::from("p1")).await;
    assert_eq!(after_second.text("slug"), Some("cafe-clasico"));
}

#[tokio::test]
async fn dry_run_reports_patches_without_writing() {
    let store = Arc::new(InMemoryStore::new());
    store.seed(product("p1", "Café Clásico", None, 4500));

    let report = reconciler(&store, ImageIntent::Off).run(RunMode::DryRun).await;
    assert_eq!(report.patched, 1);
    assert_eq!(store.write_count(), 0);
    let untouched = store.snapshot(RecordKind::Product, &RecordId::from("p1")).await;
    assert_eq!(untouched.field("slug"), Some(&FieldValue::Null));
}

#[tokio::test]
async fn ambiguous_prices_surface_as_manual_review() {
    let store = Arc::new(InMemoryStore::new());
    store.seed(product("p1", "Cheap", Some("cheap"), 5));
    store.seed(product("p2", "Zero", Some("zero"), 0));

    let report = reconciler(&store, ImageIntent::Off).run(RunMode::Commit).await;
    assert_eq!(report.manual_review.len(), 2);
    assert_eq!(report.patched, 0);
    assert_eq!(store.write_count(), 0);
    assert!(report
        .manual_review
        .iter()
        .all(|item| item.rule == "price_range"));
}

#[tokio::test]
async fn placeholder_seed_and_clean_are_inverse_passes() {
    let store = Arc::new(InMemoryStore::new());
    let mut bare = product("p1", "Bare", Some("bare"), 2000);
    bare.set_field("images", FieldValue::Null);
    store.seed(bare);
    store.seed(product("p2", "Real", Some("real"), 2000));

    reconciler(&store, ImageIntent::Seed).run(RunMode::Commit).await;
    let seeded = store.snapshot(RecordKind::Product, &RecordId::from("p1")).await;
    assert_eq!(
        seeded.list("images"),
        Some(&["https://cdn.example.com/placeholders/default.jpg".to_string()][..])
    );
    // Real images were never overwritten.
    let real = store.snapshot(RecordKind::Product, &RecordId::from("p2")).await;
    assert_eq!(
        real.list("images"),
        Some(&["https://cdn.example.com/real/x.jpg".to_string()][..])
    );

    reconciler(&store, ImageIntent::Clean).run(RunMode::Commit).await;
    let cleaned = store.snapshot(RecordKind::Product, &RecordId::from("p1")).await;
    assert_eq!(cleaned.list("images"), Some(&[] as &[String]));
    let real = store.snapshot(RecordKind::Product, &RecordId::from("p2")).await;
    assert_eq!(
        real.list("images"),
        Some(&["https://cdn.example.com/real/x.jpg".to_string()][..])
    );
}

#[tokio::test]
async fn source_outage_aborts_the_run() {
    let store = Arc::new(InMemoryStore::new());
    store.seed(product("p1", "Fine", Some("fine"), 2000));
    store.inject(FaultPlan::unavailable_lists(20));

    let report = reconciler(&store, ImageIntent::Off).run(RunMode::Commit).await;
    assert!(report.aborted);
    assert!(!report.completed());
}

#[tokio::test]
async fn per_record_failures_do_not_abort() {
    let store = Arc::new(InMemoryStore::new());
    store.seed(product("p1", "Broken Write", None, 2000));
    store.seed(product("p2", "Fine", Some("fine"), 2000));
    // Enough injected write failures to exhaust retries for p1's patch.
    store.inject(FaultPlan::transient_updates(10));

    let report = reconciler(&store, ImageIntent::Off).run(RunMode::Commit).await;
    assert!(report.completed());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].failure, "transient");
    assert_eq!(report.scanned, 2);
}

#[tokio::test]
async fn cancellation_stops_between_records() {
    let store = Arc::new(InMemoryStore::new());
    for i in 0..50 {
        store.seed(product(&format!("p{i:02}"), "Fine", Some("fine"), 2000));
    }

    let engine = reconciler(&store, ImageIntent::Off);
    engine.cancellation().cancel();
    let report = engine.run(RunMode::Commit).await;
    assert!(report.completed());
    assert_eq!(report.scanned, 0);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn rule_allowlist_limits_evaluation() {
    let store = Arc::new(InMemoryStore::new());
    store.seed(product("p1", "Café Clásico", None, 0));

    let principals: Arc<dyn PrincipalDirectory> = Arc::new(InMemoryPrincipals::default());
    let catalog: Arc<dyn CatalogStore> = store.clone();
    let registry =
        RuleRegistry::standard(ImageIntent::Off).with_allowlist(&["price_range".to_string()]);
    let engine = Reconciler::new(catalog, principals, registry, test_config());

    let report = engine.run(RunMode::Commit).await;
    // Only the price rule ran: the slug stayed null and nothing was written.
    assert_eq!(report.manual_review.len(), 1);
    assert_eq!(store.write_count(), 0);
    let rec = store.snapshot(RecordKind::Product, &RecordId::from("p1")).await;
    assert_eq!(rec.field("slug"), Some(&FieldValue::Null));
}
