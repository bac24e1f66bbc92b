//! End-to-end tests driving real resources through the store.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use confdrive::document::ConfigDocument;
use confdrive::driver::http::{ConnectionHandler, HttpListener};
use confdrive::driver::{Driver, DriverState};
use confdrive::error::{DriverError, StoreError};
use confdrive::store::ConfigStore;
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio_test::{assert_err, assert_ok};

#[cfg(feature = "sqlite")]
use confdrive::driver::db::SqliteDatabase;
#[cfg(feature = "sqlite")]
use std::fs;

struct Quiet;

#[async_trait]
impl ConnectionHandler for Quiet {
    async fn handle(&self, _stream: TcpStream, _peer: SocketAddr) {}
}

fn store_at(dir: &TempDir) -> ConfigStore {
    ConfigStore::builder()
        .with_file(dir.path().join("drivers.json"))
        .build()
        .unwrap()
}

/// Reserve currently-free local ports, all distinct.
fn reserve_ports(count: usize) -> Vec<u16> {
    let sockets: Vec<_> = (0..count)
        .map(|_| std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap())
        .collect();
    sockets
        .iter()
        .map(|socket| socket.local_addr().unwrap().port())
        .collect()
}

fn reserve_port() -> u16 {
    reserve_ports(1)[0]
}

fn listener_fragment(port: u16) -> serde_json::Value {
    json!({ "host": "127.0.0.1", "port": port })
}

#[tokio::test]
async fn test_accepted_config_starts_a_parked_listener() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    let http = Driver::builder("http", HttpListener::new(Arc::new(Quiet)))
        .attach(&store)
        .await
        .unwrap();

    let deferred = http.startup().await;
    assert!(matches!(deferred, Err(DriverError::AwaitingConfig)));
    assert_eq!(http.state().await, DriverState::AwaitingConfig);

    let port = reserve_port();
    let candidate = ConfigDocument::new().with_fragment("http", listener_fragment(port));
    store.update(candidate).await.unwrap();

    assert!(http.is_running().await);
    assert_eq!(http.bound_addr().await.unwrap().port(), port);
    assert_ok!(TcpStream::connect(("127.0.0.1", port)).await);

    http.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rejected_candidate_leaves_everything_untouched() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    let http = Driver::builder("http", HttpListener::new(Arc::new(Quiet)))
        .attach(&store)
        .await
        .unwrap();

    let port = reserve_port();
    let committed = ConfigDocument::new().with_fragment("http", listener_fragment(port));
    store.update(committed.clone()).await.unwrap();
    http.startup().await.unwrap();

    let result = store
        .update(ConfigDocument::new().with_fragment("http", listener_fragment(0)))
        .await;

    match result {
        Err(StoreError::Rejected { rejections }) => {
            assert_eq!(rejections.len(), 1);
            assert_eq!(rejections[0].driver, "http");
        }
        other => panic!("expected a rejection, got {:?}", other),
    }

    // Store and driver both still carry the committed configuration.
    assert_eq!(*store.get(), committed);
    assert!(http.is_running().await);
    assert_eq!(http.bound_addr().await.unwrap().port(), port);

    http.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_port_change_restarts_the_listener() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    let http = Driver::builder("http", HttpListener::new(Arc::new(Quiet)))
        .attach(&store)
        .await
        .unwrap();

    let ports = reserve_ports(2);
    let (old_port, new_port) = (ports[0], ports[1]);

    store
        .update(ConfigDocument::new().with_fragment("http", listener_fragment(old_port)))
        .await
        .unwrap();
    http.startup().await.unwrap();
    assert_eq!(http.bound_addr().await.unwrap().port(), old_port);

    store
        .update(ConfigDocument::new().with_fragment("http", listener_fragment(new_port)))
        .await
        .unwrap();

    assert!(http.is_running().await);
    assert_eq!(http.bound_addr().await.unwrap().port(), new_port);
    assert_ok!(TcpStream::connect(("127.0.0.1", new_port)).await);
    assert_err!(TcpStream::connect(("127.0.0.1", old_port)).await);

    http.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_vacuous_update_commits_without_a_restart() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    let http = Driver::builder("http", HttpListener::new(Arc::new(Quiet)))
        .attach(&store)
        .await
        .unwrap();

    let port = reserve_port();
    let candidate = ConfigDocument::new().with_fragment("http", listener_fragment(port));
    store.update(candidate.clone()).await.unwrap();
    http.startup().await.unwrap();
    let addr = http.bound_addr().await.unwrap();

    assert_ok!(store.update(candidate.clone()).await);

    assert_eq!(*store.get(), candidate);
    assert!(http.is_running().await);
    assert_eq!(http.bound_addr().await, Some(addr));

    http.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_cancels_a_pending_start_through_the_store() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    let http = Driver::builder("http", HttpListener::new(Arc::new(Quiet)))
        .attach(&store)
        .await
        .unwrap();

    let _ = http.startup().await;
    http.shutdown().await.unwrap();
    assert_eq!(http.state().await, DriverState::Stopped);

    // The accepted configuration is adopted, but the cancelled start stays
    // cancelled.
    let port = reserve_port();
    store
        .update(ConfigDocument::new().with_fragment("http", listener_fragment(port)))
        .await
        .unwrap();
    assert!(!http.is_running().await);
    assert!(http.is_configured().await);

    http.startup().await.unwrap();
    assert_eq!(http.bound_addr().await.unwrap().port(), port);

    http.shutdown().await.unwrap();
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_one_bad_fragment_holds_back_the_whole_document() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    let db = Driver::builder("db", SqliteDatabase::new())
        .attach(&store)
        .await
        .unwrap();
    let http = Driver::builder("http", HttpListener::new(Arc::new(Quiet)))
        .attach(&store)
        .await
        .unwrap();

    let _ = db.startup().await;
    let _ = http.startup().await;

    let port = reserve_port();
    let db_path = dir.path().join("tasks.sqlite");
    let broken = ConfigDocument::new()
        .with_fragment("http", listener_fragment(port))
        .with_fragment("db", json!({ "path": db_path, "max_connections": 0 }));

    let result = store.update(broken).await;
    match result {
        Err(StoreError::Rejected { rejections }) => {
            assert_eq!(rejections.len(), 1);
            assert_eq!(rejections[0].driver, "db");
        }
        other => panic!("expected a rejection, got {:?}", other),
    }

    // The valid http fragment was held back along with the bad db one.
    assert!(!http.is_running().await);
    assert!(!db.is_connected().await);
    assert!(store.get().is_empty());

    let fixed = ConfigDocument::new()
        .with_fragment("http", listener_fragment(port))
        .with_fragment("db", json!({ "path": db_path }));
    store.update(fixed).await.unwrap();

    assert!(http.is_running().await);
    assert!(db.is_connected().await);

    http.shutdown().await.unwrap();
    db.shutdown().await.unwrap();
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_database_lifecycle_through_the_store() {
    use sqlx::Row;

    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    let db = Driver::builder("db", SqliteDatabase::new())
        .attach(&store)
        .await
        .unwrap();

    let _ = db.startup().await;
    store
        .update(
            ConfigDocument::new()
                .with_fragment("db", json!({ "path": dir.path().join("tasks.sqlite") })),
        )
        .await
        .unwrap();
    assert!(db.is_connected().await);

    let pool = db.pool().await.unwrap();
    sqlx::query("CREATE TABLE tasks (id INTEGER PRIMARY KEY, title TEXT NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO tasks (title) VALUES (?1)")
        .bind("write the manual")
        .execute(&pool)
        .await
        .unwrap();
    let row = sqlx::query("SELECT COUNT(*) FROM tasks")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.get::<i64, _>(0), 1);

    db.shutdown().await.unwrap();
    assert!(!db.is_connected().await);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_failed_deferred_start_allows_a_manual_retry() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    let db = Driver::builder("db", SqliteDatabase::new())
        .attach(&store)
        .await
        .unwrap();

    let _ = db.startup().await;

    // The fragment is statically valid, but the parent directory does not
    // exist yet, so the deferred start fails.
    let db_path = dir.path().join("nested").join("tasks.sqlite");
    let result = store
        .update(ConfigDocument::new().with_fragment("db", json!({ "path": db_path })))
        .await;

    assert_ok!(result);
    assert_eq!(db.state().await, DriverState::Stopped);
    assert!(!db.is_connected().await);
    assert!(db.is_configured().await);

    // Once the operator fixes the environment, a manual startup reuses the
    // adopted configuration.
    fs::create_dir(dir.path().join("nested")).unwrap();
    db.startup().await.unwrap();
    assert!(db.is_connected().await);

    db.shutdown().await.unwrap();
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_first_boot_from_a_blank_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("drivers.json");
    fs::write(&path, "").unwrap();

    let store = ConfigStore::builder().with_file(&path).build().unwrap();
    let db = Driver::builder("db", SqliteDatabase::new())
        .attach(&store)
        .await
        .unwrap();
    let http = Driver::builder("http", HttpListener::new(Arc::new(Quiet)))
        .attach(&store)
        .await
        .unwrap();

    let _ = db.startup().await;
    let _ = http.startup().await;
    assert_eq!(db.state().await, DriverState::AwaitingConfig);
    assert_eq!(http.state().await, DriverState::AwaitingConfig);

    let port = reserve_port();
    let seed = ConfigDocument::new()
        .with_fragment("db", json!({ "path": dir.path().join("tasks.sqlite") }))
        .with_fragment("http", listener_fragment(port));
    store.update(seed).await.unwrap();

    assert!(db.is_connected().await);
    assert!(http.is_running().await);

    // The seeded document survives the process.
    let raw = fs::read_to_string(&path).unwrap();
    let persisted: ConfigDocument = serde_json::from_str(&raw).unwrap();
    assert!(persisted.fragment("db").is_some());
    assert!(persisted.fragment("http").is_some());

    http.shutdown().await.unwrap();
    db.shutdown().await.unwrap();
}
