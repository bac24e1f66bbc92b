//! Bringup of a small daemon gating two resources on one configuration file.
//!
//! This example shows how to:
//! - Build a store over a JSON configuration file
//! - Attach a database driver and a listener driver
//! - Seed a first configuration when the file is blank
//! - Retry a failing startup and tear down in reverse order
//!
//! Run with: cargo run --example bringup
//!
//! While running, `curl 127.0.0.1:8080` talks to the managed listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use confdrive::driver::db::SqliteDatabase;
use confdrive::driver::http::{ConnectionHandler, HttpListener};
use confdrive::prelude::*;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

struct Hello;

#[async_trait]
impl ConnectionHandler for Hello {
    async fn handle(&self, mut stream: TcpStream, peer: SocketAddr) {
        info!(%peer, "Connection accepted");

        let body = "hello from confdrive\n";
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        if let Err(err) = stream.write_all(response.as_bytes()).await {
            warn!(error = %err, "Failed to write response");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let store = ConfigStore::builder().with_file("drivers.json").build()?;

    let db = Driver::builder("db", SqliteDatabase::new())
        .attach(&store)
        .await?;
    let http = Driver::builder("http", HttpListener::new(Arc::new(Hello)))
        .attach(&store)
        .await?;

    // First boot: hand the file a working configuration to start from.
    if store.get().is_empty() {
        info!("Seeding a first configuration");
        let seed = ConfigDocument::new()
            .with_fragment("db", json!({ "path": "confdrive.sqlite" }))
            .with_fragment("http", json!({ "host": "127.0.0.1", "port": 8080 }));
        store.update(seed).await?;
    }

    // The listener is useless without its storage, so the database comes up
    // first and is retried until it sticks.
    while let Err(err) = db.startup().await {
        warn!(error = %err, "Database startup failed; retrying");
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    if let Err(err) = http.startup().await {
        warn!(error = %err, "Listener parked until a configuration is accepted");
    }

    info!(path = %store.path().display(), "Up; press Ctrl-C to shut down");
    tokio::signal::ctrl_c().await?;

    // Reverse bringup order: no connection should outlive its storage.
    http.shutdown().await?;
    db.shutdown().await?;
    info!("Shut down cleanly");

    Ok(())
}
