mod helpers;

use helpers::{service, stub_vector, Behavior, CountingLoader, StubBackend, DIM, MODEL};
use shelfvec::catalog::{self, meta, store, types::NewProduct, CatalogError};
use shelfvec::enrich::{EmbeddingStatus, EnrichmentResult, FallbackReason};
use tempfile::TempDir;

fn product(name: &str) -> NewProduct {
    NewProduct {
        name: name.into(),
        category: "electronics".into(),
        description: Some("Powerful laptop".into()),
        tags: vec!["laptop".into()],
        price_cents: Some(89_900),
        vendor_id: None,
    }
}

#[test]
fn open_creates_catalog_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("nested").join("catalog.db");
    assert!(!db_path.exists());

    let conn = catalog::open_catalog(&db_path, DIM, MODEL).unwrap();

    assert!(db_path.exists());
    assert_eq!(meta::get_schema_version(&conn).unwrap(), meta::SCHEMA_VERSION);
    assert_eq!(meta::get_embedding_dimensions(&conn).unwrap(), Some(DIM));
}

#[test]
fn new_catalog_records_the_configured_model() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("catalog.db");

    let conn = catalog::open_catalog(&db_path, 1536, "text-embedding-3-small").unwrap();
    assert_eq!(
        meta::get_embedding_model(&conn).unwrap().as_deref(),
        Some("text-embedding-3-small")
    );

    let report = catalog::check_catalog_health(&conn).unwrap();
    assert_eq!(report.embedding_model.as_deref(), Some("text-embedding-3-small"));
}

#[test]
fn reopening_with_another_model_keeps_the_recorded_one() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("catalog.db");

    drop(catalog::open_catalog(&db_path, DIM, "all-MiniLM-L6-v2").unwrap());
    let conn = catalog::open_catalog(&db_path, DIM, "bge-small-en-v1.5").unwrap();

    assert_eq!(
        meta::get_embedding_model(&conn).unwrap().as_deref(),
        Some("all-MiniLM-L6-v2")
    );
}

#[test]
fn reopening_with_a_different_length_fails() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("catalog.db");

    drop(catalog::open_catalog(&db_path, 384, MODEL).unwrap());
    let err = catalog::open_catalog(&db_path, 1536, MODEL).unwrap_err();

    let mismatch = err.downcast_ref::<CatalogError>();
    assert!(matches!(
        mismatch,
        Some(CatalogError::DimensionMismatch { expected: 384, actual: 1536 })
    ));

    // Same length still opens.
    catalog::open_catalog(&db_path, 384, MODEL).unwrap();
}

#[test]
fn busy_timeout_is_set() {
    let tmp = TempDir::new().unwrap();
    let conn = catalog::open_catalog(tmp.path().join("catalog.db"), DIM, MODEL).unwrap();

    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 5000);
}

#[test]
fn placeholder_rows_are_distinguishable_from_real_ones() {
    let mut conn = catalog::open_memory_catalog(DIM, MODEL).unwrap();

    let real = store::insert_product(
        &mut conn,
        &product("Dell Inspiron 15"),
        &EnrichmentResult::Embedded(stub_vector(DIM)),
        DIM,
    )
    .unwrap();
    let fallback = store::insert_product(
        &mut conn,
        &product("Lenovo ThinkPad"),
        &EnrichmentResult::placeholder(DIM, FallbackReason::BackendCallFailed),
        DIM,
    )
    .unwrap();

    assert_eq!(real.embedding_status, EmbeddingStatus::Embedded);
    assert_eq!(fallback.embedding_status, EmbeddingStatus::Placeholder);
    assert_eq!(store::get_embedding(&conn, &fallback.id).unwrap().unwrap(), vec![0.0; DIM]);

    let report = catalog::check_catalog_health(&conn).unwrap();
    assert_eq!(report.product_count, 2);
    assert_eq!(report.placeholder_count, 1);
    assert_eq!(report.vector_count, 2);
}

#[tokio::test]
async fn re_enrichment_pass_replaces_placeholders() {
    let mut conn = catalog::open_memory_catalog(DIM, MODEL).unwrap();

    // First pass: backend down.
    let down = service(CountingLoader::failing(StubBackend::new(Behavior::Answer { len: DIM })));
    for name in ["Desk lamp", "Office chair"] {
        let p = product(name);
        let result = down.enrich(&p.to_enrichment_request()).await.unwrap();
        store::insert_product(&mut conn, &p, &result, DIM).unwrap();
    }
    assert_eq!(store::catalog_stats(&conn).unwrap().placeholder, 2);

    // Second pass: backend back.
    let backend = StubBackend::new(Behavior::Answer { len: DIM });
    let up = service(CountingLoader::new(backend.clone()));
    let pending = store::list_for_reenrich(&conn, true).unwrap();
    let requests: Vec<_> = pending.iter().map(|p| p.to_enrichment_request()).collect();
    let results = up.enrich_batch(&requests).await.unwrap();
    for (product, result) in pending.iter().zip(&results) {
        assert!(store::apply_reenrichment(&mut conn, product, result, DIM).unwrap());
    }

    let stats = store::catalog_stats(&conn).unwrap();
    assert_eq!(stats.placeholder, 0);
    assert_eq!(stats.embedded, 2);
    assert_eq!(backend.call_count(), 2);
    assert!(store::list_for_reenrich(&conn, true).unwrap().is_empty());
    for product in &pending {
        assert_eq!(store::get_embedding(&conn, &product.id).unwrap().unwrap(), stub_vector(DIM));
    }
}

#[tokio::test]
async fn full_pass_with_backend_down_keeps_real_vectors() {
    let mut conn = catalog::open_memory_catalog(DIM, MODEL).unwrap();
    let real = EnrichmentResult::Embedded(stub_vector(DIM));
    let stored = store::insert_product(&mut conn, &product("Desk lamp"), &real, DIM).unwrap();

    let slow = StubBackend::new(Behavior::Hang(std::time::Duration::from_secs(5)));
    let timing_out = shelfvec::enrich::EnrichmentService::new(
        CountingLoader::new(slow),
        helpers::test_config(std::time::Duration::from_millis(20)),
    );

    let pending = store::list_for_reenrich(&conn, false).unwrap();
    assert_eq!(pending.len(), 1);
    let result = timing_out.enrich(&pending[0].to_enrichment_request()).await.unwrap();
    assert_eq!(result.fallback_reason(), Some(FallbackReason::Timeout));

    assert!(!store::apply_reenrichment(&mut conn, &pending[0], &result, DIM).unwrap());
    assert_eq!(store::get_embedding(&conn, &stored.id).unwrap().unwrap(), stub_vector(DIM));
    assert_eq!(store::catalog_stats(&conn).unwrap().embedded, 1);
}

#[test]
fn legacy_length_fallback_cannot_be_stored() {
    let mut conn = catalog::open_memory_catalog(384, MODEL).unwrap();
    let legacy = EnrichmentResult::placeholder(1536, FallbackReason::BackendUnavailable);

    let err = store::insert_product(&mut conn, &product("Mug"), &legacy, 384).unwrap_err();

    assert!(matches!(
        err,
        CatalogError::DimensionMismatch { expected: 384, actual: 1536 }
    ));
}
