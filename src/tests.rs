//! Integration tests for sitekeeper.
//!
//! Each test runs against a real SQLite file and an in-process HTTP host that
//! serves the published documents.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, keys, KvStore, SqliteKvStore};
use crate::models::{ImagePayload, VersionToken};
use crate::reconcile::{load_catalog_from_store, load_theme_from_store, ReconcilePath};
use crate::remote::HttpRemote;
use crate::restore::RestoreOutcome;
use crate::AppState;

const LFS_POINTER: &str =
    "version https://git-lfs.github.com/spec/v1\noid sha256:4d7a2146\nsize 31457280\n";

#[derive(Clone)]
struct HostedFile {
    status: u16,
    content_type: String,
    body: String,
}

/// Static host double: serves configured files and records what it was asked.
#[derive(Default)]
struct MockHost {
    files: Mutex<HashMap<String, HostedFile>>,
    hits: AtomicUsize,
    last_query: Mutex<HashMap<String, String>>,
    last_cache_control: Mutex<Option<String>>,
}

impl MockHost {
    fn serve(&self, file: &str, status: u16, content_type: &str, body: &str) {
        self.files.lock().unwrap().insert(
            file.to_string(),
            HostedFile {
                status,
                content_type: content_type.to_string(),
                body: body.to_string(),
            },
        );
    }

    fn serve_json(&self, file: &str, body: &Value) {
        self.serve(file, 200, "application/json", &body.to_string());
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn serve_file(
    State(host): State<Arc<MockHost>>,
    Path(file): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    host.hits.fetch_add(1, Ordering::SeqCst);
    *host.last_query.lock().unwrap() = query;
    *host.last_cache_control.lock().unwrap() = headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let hosted = host.files.lock().unwrap().get(&file).cloned();
    match hosted {
        Some(f) => (
            StatusCode::from_u16(f.status).unwrap(),
            [(CONTENT_TYPE, f.content_type)],
            f.body,
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            [(CONTENT_TYPE, "text/html".to_string())],
            "<html>Not Found</html>".to_string(),
        )
            .into_response(),
    }
}

/// Test fixture for integration tests.
struct TestFixture {
    host: Arc<MockHost>,
    pool: SqlitePool,
    config: Arc<Config>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_ttl(Duration::from_secs(10)).await
    }

    async fn with_ttl(force_local_ttl: Duration) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("site.sqlite");
        let pool = init_database(&db_path).await.expect("Failed to init DB");

        let host = Arc::new(MockHost::default());
        let app = Router::new()
            .route("/{file}", get(serve_file))
            .with_state(Arc::clone(&host));

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = Config {
            db_path,
            remote_base_url: format!("http://{}", addr),
            log_level: "warn".to_string(),
            force_local_ttl,
            save_debounce: Duration::from_millis(20),
            restore_batch_size: 10,
            max_payload_bytes: 64 * 1024 * 1024,
            fetch_timeout: Some(Duration::from_secs(5)),
        };

        TestFixture {
            host,
            pool,
            config: Arc::new(config),
            _temp_dir: temp_dir,
        }
    }

    fn store(&self) -> SqliteKvStore {
        SqliteKvStore::new(self.pool.clone())
    }

    /// Start the application against the fixture's database, as a fresh
    /// process would.
    async fn open(&self) -> AppState<SqliteKvStore, HttpRemote> {
        let remote = HttpRemote::new(self.config.remote_base_url.clone(), self.config.fetch_timeout)
            .expect("Failed to build remote");
        let state = AppState::init(
            self.store(),
            SqliteKvStore::flags(self.pool.clone()),
            remote,
            Arc::clone(&self.config),
        )
        .await;
        state.wait_for_background().await;
        state
    }

    fn publish_split(&self, version: &str, products: usize) {
        self.host.serve_json(
            "data_core.json",
            &json!({ "version": version, "theme": { "heroImage": format!("hero-{}.jpg", version) } }),
        );
        self.host.serve_json(
            "data_about.json",
            &json!({ "version": version, "theme": { "productionImages": ["line.jpg"] } }),
        );
        self.host.serve_json(
            "data_products.json",
            &json!({
                "version": version,
                "products": product_list("remote", products),
                "categories": [{ "name": "Plugs", "subs": ["Europe"] }]
            }),
        );
    }
}

fn product_list(prefix: &str, n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "id": format!("{}-{}", prefix, i),
                "sku": format!("XRT-{:03}", i),
                "category": "Plugs",
                "subCategory": "Europe",
                "nameEn": format!("Plug {}", i),
                "nameZh": format!("插头 {}", i),
                "images": [format!("data:image/jpeg;base64,{}", "A".repeat(64))]
            })
        })
        .collect()
}

fn backup_text(version: &str, products: usize) -> String {
    json!({
        "version": version,
        "theme": {
            "heroImage": "data:image/jpeg;base64,HERO",
            "certImages": { "china": ["data:application/pdf;base64,CCC"] }
        },
        "products": product_list("backup", products),
        "categories": [{ "name": "Plugs", "subs": ["Europe", "Asia"] }]
    })
    .to_string()
}

#[tokio::test]
async fn test_fresh_install_adopts_published_documents() {
    let fixture = TestFixture::new().await;
    fixture.publish_split("1700000000000", 12);

    let state = fixture.open().await;

    let theme = state.theme().await;
    assert_eq!(theme.hero_image, ImagePayload::from("hero-1700000000000.jpg"));
    assert_eq!(theme.production_images, vec![ImagePayload::from("line.jpg")]);
    assert_eq!(state.catalog().await.products.len(), 12);

    let reports = state.reports().await;
    assert!(reports.iter().all(|r| r.path == ReconcilePath::RemoteOverwrite));

    // Remote data is durable once the background writes settle
    let store = fixture.store();
    assert_eq!(load_theme_from_store(&store).await, theme);
    assert_eq!(load_catalog_from_store(&store).await, state.catalog().await);
    assert_eq!(
        store.get_string(keys::CATALOG_VERSION).await.as_deref(),
        Some("1700000000000")
    );

    // Every fetch bypasses caches
    let query = fixture.host.last_query.lock().unwrap().clone();
    assert!(query.get("t").unwrap().parse::<i64>().is_ok());
    assert!(query.get("r").unwrap().parse::<u32>().is_ok());
    assert_eq!(
        fixture.host.last_cache_control.lock().unwrap().as_deref(),
        Some("no-store")
    );
}

#[tokio::test]
async fn test_html_fallback_page_is_not_data() {
    let fixture = TestFixture::new().await;
    fixture.host.serve(
        "data_products.json",
        200,
        "text/html; charset=utf-8",
        "<!doctype html><html><body>App shell</body></html>",
    );

    let state = fixture.open().await;
    let catalog_report = &state.reports().await[1];
    assert_eq!(catalog_report.provider, "catalog");
    assert_eq!(catalog_report.path, ReconcilePath::Local);
    // The legacy document is tried after the HTML response and is missing too
    assert_eq!(catalog_report.fetch_status, "HTTP 404");
    assert!(state.catalog().await.products.is_empty());
}

#[tokio::test]
async fn test_lfs_pointer_falls_back_to_legacy_then_local() {
    let fixture = TestFixture::new().await;
    for file in ["data_core.json", "data_about.json", "data_products.json"] {
        fixture.host.serve(file, 200, "application/json", LFS_POINTER);
    }
    fixture.host.serve_json(
        "data.json",
        &json!({
            "version": "1.3.1",
            "theme": { "logoImage": "logo.png" },
            "content": { "products": product_list("legacy", 3), "categories": [] }
        }),
    );

    let state = fixture.open().await;
    assert_eq!(state.catalog().await.products.len(), 3);
    assert_eq!(state.theme().await.logo_image, Some(ImagePayload::from("logo.png")));
    state.shutdown().await.unwrap();

    // With every document unusable the stored copy is used
    fixture.host.serve("data.json", 200, "application/json", LFS_POINTER);
    let restarted = fixture.open().await;
    assert!(restarted
        .reports()
        .await
        .iter()
        .all(|r| r.path == ReconcilePath::Local && r.fetch_status.contains("large-file")));
    assert_eq!(restarted.catalog().await.products.len(), 3);
    assert_eq!(restarted.theme().await.logo_image, Some(ImagePayload::from("logo.png")));
}

#[tokio::test]
async fn test_restore_survives_restart_without_fetching() {
    let fixture = TestFixture::new().await;
    fixture.publish_split("1.3.1", 2);
    let state = fixture.open().await;
    let hits_before = fixture.host.hits();

    let mut percents = Vec::new();
    let outcome = state
        .restore_backup(
            &backup_text("1700000000123", 37),
            |preview| preview.product_count == 37,
            |p| percents.push(p.percent),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, RestoreOutcome::Restored(_)));
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] < w[1]));

    // Reload after restore reads only the store
    assert_eq!(fixture.host.hits(), hits_before);
    assert_eq!(state.catalog().await.products.len(), 37);
    state.shutdown().await.unwrap();

    let store = fixture.store();
    assert_eq!(
        store.get(keys::CATALOG_META).await,
        Some(json!({ "chunks": 4, "totalItems": 37 }))
    );
    let last_chunk = store.get(&keys::chunk_key(3)).await.unwrap();
    assert_eq!(last_chunk.as_array().unwrap().len(), 7);
    assert!(store.get(&keys::chunk_key(4)).await.is_none());

    // A new process inside the flag lifetime also skips the network
    let restarted = fixture.open().await;
    assert_eq!(fixture.host.hits(), hits_before);
    assert_eq!(
        restarted.theme().await.hero_image,
        ImagePayload::from("data:image/jpeg;base64,HERO")
    );
    assert_eq!(
        restarted.theme().await.cert_images["china"][0].name,
        "Certificate 1.pdf"
    );
}

#[tokio::test]
async fn test_flag_expiry_resumes_fetching() {
    let fixture = TestFixture::with_ttl(Duration::from_millis(200)).await;
    fixture.publish_split("1.3.1", 2);
    let state = fixture.open().await;
    state
        .restore_backup(&backup_text("1700000000000", 5), |_| true, |_| {})
        .await
        .unwrap();
    let hits_after_restore = fixture.host.hits();

    tokio::time::sleep(Duration::from_millis(400)).await;
    state.reload().await;
    assert!(fixture.host.hits() > hits_after_restore);

    // A release tag never replaces an imported backup
    assert_eq!(state.catalog().await.products.len(), 5);
    assert!(state.reports().await.iter().all(|r| r.path == ReconcilePath::Local));

    // A newer backup-shaped version does
    fixture.publish_split("1700000000999", 8);
    state.reload().await;
    state.wait_for_background().await;
    assert_eq!(state.catalog().await.products.len(), 8);
    assert_eq!(
        fixture.store().get_string(keys::CATALOG_VERSION).await.as_deref(),
        Some("1700000000999")
    );

    // An older one does not
    fixture.publish_split("1700000000500", 1);
    state.reload().await;
    assert_eq!(state.catalog().await.products.len(), 8);
    state.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_export_restore_round_trip() {
    let fixture = TestFixture::new().await;
    let state = fixture.open().await;

    state
        .set_hero_image(ImagePayload::from("data:image/png;base64,AAAA"))
        .await
        .unwrap();
    state.add_cert_image("europe", "ce.pdf", "CE").await.unwrap();
    state
        .set_about_certs_image(Some(ImagePayload::from("wall.jpg")))
        .await
        .unwrap();
    for raw in product_list("edit", 14) {
        state.add_product(&raw).await;
    }
    state.add_category("Adapters").await;
    state.shutdown().await.unwrap();

    let theme = state.theme().await;
    let catalog = state.catalog().await;

    let backup_path = fixture._temp_dir.path().join("backup.json");
    state.export_backup(&backup_path).await.unwrap();

    state.hard_reset().await.unwrap();
    assert!(state.catalog().await.products.is_empty());

    let text = tokio::fs::read_to_string(&backup_path).await.unwrap();
    state.restore_backup(&text, |_| true, |_| {}).await.unwrap();

    assert_eq!(state.theme().await, theme);
    assert_eq!(state.catalog().await, catalog);

    let stored_version = fixture.store().get_string(keys::DATA_VERSION).await.unwrap();
    assert!(VersionToken::new(stored_version).is_backup_shaped());
}

#[tokio::test]
async fn test_publish_documents_are_served_back() {
    let fixture = TestFixture::new().await;
    let state = fixture.open().await;
    state.set_logo_image(Some(ImagePayload::from("logo.png"))).await.unwrap();
    for raw in product_list("pub", 3) {
        state.add_product(&raw).await;
    }

    let out_dir = fixture._temp_dir.path().join("public");
    let written = state.publish_documents(&out_dir).await.unwrap();
    assert_eq!(written.len(), 3);

    for file in &written {
        let name = file.path.file_name().unwrap().to_str().unwrap();
        let body = std::fs::read_to_string(&file.path).unwrap();
        fixture.host.serve(name, 200, "application/json", &body);
    }

    // A different installation picks the published documents up
    let other = TestFixture::new().await;
    for name in ["data_core.json", "data_about.json", "data_products.json"] {
        let body = std::fs::read_to_string(out_dir.join(name)).unwrap();
        other.host.serve(name, 200, "application/json", &body);
    }
    let mirrored = other.open().await;
    assert_eq!(mirrored.theme().await, state.theme().await);
    assert_eq!(mirrored.catalog().await, state.catalog().await);

    let probes = state.probe_remote().await;
    assert_eq!(probes[0].document, "data_core.json");
    assert_eq!(probes[0].status, "Small");
    assert_eq!(probes[3].status, "HTTP 404");
}

#[tokio::test]
async fn test_failed_restore_keeps_current_data() {
    let fixture = TestFixture::new().await;
    let state = fixture.open().await;
    state.add_product(&json!({ "id": "keep-me" })).await;
    state.shutdown().await.unwrap();

    let result = state
        .restore_backup(r#"{"version": "1", "products": []}"#, |_| true, |_| {})
        .await;
    assert!(result.is_err());
    assert_eq!(state.catalog().await.products[0].id, "keep-me");

    let declined = state
        .restore_backup(&backup_text("1700000000000", 3), |_| false, |_| {})
        .await
        .unwrap();
    assert_eq!(declined, RestoreOutcome::Declined);
    assert_eq!(
        load_catalog_from_store(&fixture.store()).await.products[0].id,
        "keep-me"
    );
}
