//! TCP listener resource for the HTTP driver.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::driver::{Driver, ManagedResource};
use crate::error::{DriverError, ValidationError};
use crate::store::Validate;

/// Configuration fragment for an [`HttpListener`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HttpListenerConfig {
    /// Interface to bind, e.g. `"0.0.0.0"` or `"::1"`.
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
}

impl Validate for HttpListenerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::invalid_field("host", "must not be empty"));
        }

        if self.port == 0 {
            return Err(ValidationError::invalid_field("port", "must be non-zero"));
        }

        Ok(())
    }
}

/// Callback invoked for every accepted connection.
///
/// The listener hands over the raw stream on a dedicated task; protocol
/// handling lives entirely in the implementation.
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handle one accepted connection.
    async fn handle(&self, stream: TcpStream, peer: SocketAddr);
}

struct AcceptLoop {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// A TCP listener managed as a driver resource.
///
/// Starting binds the configured address and spawns an accept loop that
/// dispatches every connection to the injected [`ConnectionHandler`];
/// stopping signals the loop, awaits it, and releases the port.
pub struct HttpListener {
    handler: Arc<dyn ConnectionHandler>,
    active: Option<AcceptLoop>,
}

impl HttpListener {
    /// Create a listener that hands accepted connections to `handler`.
    pub fn new(handler: Arc<dyn ConnectionHandler>) -> Self {
        Self {
            handler,
            active: None,
        }
    }

    /// Address actually bound, once serving.
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        self.active.as_ref().map(|active| active.local_addr)
    }

    /// True while the accept loop is running.
    pub fn is_serving(&self) -> bool {
        self.active.is_some()
    }
}

#[async_trait]
impl ManagedResource for HttpListener {
    type Config = HttpListenerConfig;

    async fn start(&mut self, config: Option<&HttpListenerConfig>) -> Result<(), DriverError> {
        let config = config.ok_or(DriverError::NotConfigured)?;

        if self.active.is_some() {
            self.stop().await?;
        }

        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "Listener bound");

        let (shutdown, mut stopped) = watch::channel(false);
        let handler = Arc::clone(&self.handler);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stopped.changed() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            let handler = Arc::clone(&handler);
                            tokio::spawn(async move {
                                handler.handle(stream, peer).await;
                            });
                        }
                        Err(err) => {
                            warn!(error = %err, "Failed to accept connection");
                        }
                    },
                }
            }
        });

        self.active = Some(AcceptLoop {
            local_addr,
            shutdown,
            task,
        });
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), DriverError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };

        let _ = active.shutdown.send(true);
        if let Err(err) = active.task.await {
            warn!(error = %err, "Accept loop ended abnormally");
        }
        info!(address = %active.local_addr, "Listener closed");
        Ok(())
    }
}

impl Driver<HttpListener> {
    /// Address the listener is bound to, when serving.
    pub async fn bound_addr(&self) -> Option<SocketAddr> {
        self.with_resource(HttpListener::bound_addr).await
    }

    /// True while the accept loop is running.
    pub async fn is_serving(&self) -> bool {
        self.with_resource(HttpListener::is_serving).await
    }
}
