//! # confdrive
//!
//! Configuration-reactive lifecycle management for resource drivers.
//!
//! ## Overview
//!
//! `confdrive` keeps one process-wide configuration document and the
//! external resources it describes in lockstep:
//! - A [`ConfigStore`](store::ConfigStore) validates, persists, and fans out
//!   configuration changes, replaying the latest document to every new
//!   subscriber
//! - A [`Driver`](driver::Driver) state machine gates one managed resource
//!   (a listener, a database pool) on the configuration it has adopted,
//!   starting, stopping, restarting, or parking it as documents come and go
//! - Candidate documents commit all-or-nothing: one refused fragment rejects
//!   the whole update and running resources keep their current state
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! use confdrive::driver::http::{ConnectionHandler, HttpListener};
//! use confdrive::prelude::*;
//! use tokio::net::TcpStream;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl ConnectionHandler for Echo {
//!     async fn handle(&self, mut stream: TcpStream, _peer: SocketAddr) {
//!         let (mut reader, mut writer) = stream.split();
//!         let _ = tokio::io::copy(&mut reader, &mut writer).await;
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ConfigStore::builder().with_file("drivers.json").build()?;
//!
//! // Attaching registers the driver's validator and subscribes it; a
//! // fragment already persisted under "http" is adopted right away.
//! let http = Driver::builder("http", HttpListener::new(Arc::new(Echo)))
//!     .attach(&store)
//!     .await?;
//!
//! // Nothing is configured yet, so the listener parks instead of starting.
//! let _ = http.startup().await;
//!
//! // Accepted updates are persisted and pushed to every attached driver;
//! // the parked listener starts itself with the new configuration.
//! let candidate = ConfigDocument::new()
//!     .with_fragment("http", serde_json::json!({ "host": "127.0.0.1", "port": 8080 }));
//! store.update(candidate).await?;
//!
//! assert!(http.is_running().await);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! The `sqlite` feature (enabled by default) ships the embedded SQLite
//! driver resource backed by `sqlx`:
//!
//! ```toml
//! [dependencies]
//! confdrive = { version = "0.1", default-features = false }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod document;
pub mod driver;
pub mod error;
pub mod store;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::document::{ConfigDocument, Fragment};
    pub use crate::driver::{Driver, DriverBuilder, DriverState, ManagedResource};
    pub use crate::error::{DriverError, Result, StoreError, ValidationError};
    pub use crate::store::{
        ConfigStore, ConfigStoreBuilder, ConfigSubscriber, FragmentValidator, Validate, Verdict,
    };
}
