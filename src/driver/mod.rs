//! Driver state machines gating managed resources on configuration.

pub mod http;

#[cfg(feature = "sqlite")]
pub mod db;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::document::{ConfigDocument, Fragment};
use crate::error::{DriverError, StoreError, ValidationError};
use crate::store::{ConfigStore, ConfigSubscriber, FragmentValidator, Validate, Verdict};

/// A start/stop capability paired with the typed configuration it consumes.
///
/// Implementations own the external resource (a socket, a connection pool)
/// and contain no lifecycle rules of their own; the surrounding [`Driver`]
/// decides when `start` and `stop` run and with which configuration.
#[async_trait]
pub trait ManagedResource: Send + Sync + 'static {
    /// The typed configuration decoded from this driver's fragment.
    type Config: DeserializeOwned + Validate + Clone + PartialEq + Send + Sync + 'static;

    /// Bring the resource up.
    ///
    /// `config` is `None` only for drivers built with
    /// [`requires_config(false)`](DriverBuilder::requires_config).
    ///
    /// # Errors
    ///
    /// Any failure must leave the resource down; the driver records
    /// `Stopped`.
    async fn start(&mut self, config: Option<&Self::Config>) -> Result<(), DriverError>;

    /// Tear the resource down.
    ///
    /// # Errors
    ///
    /// A failure leaves the driver in its prior state; a later `shutdown`
    /// may retry.
    async fn stop(&mut self) -> Result<(), DriverError>;
}

/// Lifecycle state of a [`Driver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// The resource is down and no start is pending.
    Stopped,
    /// A start was requested before any configuration was adopted; the
    /// driver starts itself on the next accepted configuration.
    AwaitingConfig,
    /// The resource is up.
    Running,
}

/// Outcome of screening one fragment against the adopted configuration.
enum Screen<C> {
    Adopt(C),
    Unchanged,
    Invalid(ValidationError),
}

struct Inner<R: ManagedResource> {
    resource: R,
    state: DriverState,
    config: Option<R::Config>,
}

/// State machine tying one [`ManagedResource`] to a configuration store.
///
/// The driver acts as both the validator and the subscriber for the
/// fragment stored under its name: candidates are screened before the store
/// commits, and committed documents are adopted on delivery, starting or
/// restarting the resource as the state machine dictates.
///
/// # Examples
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use confdrive::prelude::*;
/// use serde::Deserialize;
///
/// #[derive(Debug, Clone, Deserialize, PartialEq)]
/// struct CacheConfig {
///     capacity: usize,
/// }
///
/// impl Validate for CacheConfig {
///     fn validate(&self) -> Result<(), ValidationError> {
///         if self.capacity == 0 {
///             return Err(ValidationError::invalid_field("capacity", "must be non-zero"));
///         }
///         Ok(())
///     }
/// }
///
/// #[derive(Default)]
/// struct Cache;
///
/// #[async_trait]
/// impl ManagedResource for Cache {
///     type Config = CacheConfig;
///
///     async fn start(&mut self, _config: Option<&CacheConfig>) -> Result<(), DriverError> {
///         Ok(())
///     }
///
///     async fn stop(&mut self) -> Result<(), DriverError> {
///         Ok(())
///     }
/// }
///
/// # async fn example(store: &ConfigStore) -> Result<(), StoreError> {
/// let cache = Driver::builder("cache", Cache::default())
///     .attach(store)
///     .await?;
///
/// // Parked until a configuration for "cache" is accepted.
/// assert!(!cache.is_running().await);
/// # Ok(())
/// # }
/// ```
pub struct Driver<R: ManagedResource> {
    name: String,
    requires_config: bool,
    inner: Mutex<Inner<R>>,
}

/// Builder wiring a [`Driver`] to a [`ConfigStore`].
pub struct DriverBuilder<R: ManagedResource> {
    name: String,
    resource: R,
    requires_config: bool,
}

impl<R: ManagedResource> DriverBuilder<R> {
    /// Whether the resource needs an adopted configuration before it can
    /// start. Defaults to `true`; a driver built with `false` starts with
    /// `None` in place of a configuration.
    pub fn requires_config(mut self, required: bool) -> Self {
        self.requires_config = required;
        self
    }

    /// Register the driver's validator, subscribe it, and return the shared
    /// handle.
    ///
    /// Registration triggers a fresh load and the new subscription replays
    /// the loaded document, so a fragment already persisted under this
    /// driver's name is adopted before `attach` returns.
    ///
    /// # Errors
    ///
    /// Fails when a validator is already registered under this name or when
    /// the triggered load fails; the store is left unchanged either way.
    pub async fn attach(self, store: &ConfigStore) -> Result<Arc<Driver<R>>, StoreError> {
        let driver = Arc::new(Driver {
            name: self.name,
            requires_config: self.requires_config,
            inner: Mutex::new(Inner {
                resource: self.resource,
                state: DriverState::Stopped,
                config: None,
            }),
        });

        let validator: Arc<dyn FragmentValidator> = driver.clone();
        store.register_validator(driver.name.clone(), validator).await?;

        let subscriber: Arc<dyn ConfigSubscriber> = driver.clone();
        store.subscribe(subscriber).await;

        Ok(driver)
    }
}

impl<R: ManagedResource> Driver<R> {
    /// Create a new builder around `resource`. `name` keys the driver's
    /// fragment in the configuration document.
    pub fn builder(name: impl Into<String>, resource: R) -> DriverBuilder<R> {
        DriverBuilder {
            name: name.into(),
            resource,
            requires_config: true,
        }
    }

    /// The driver's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> DriverState {
        self.inner.lock().await.state
    }

    /// True while the resource is up.
    pub async fn is_running(&self) -> bool {
        self.state().await == DriverState::Running
    }

    /// True once a configuration fragment has been adopted.
    pub async fn is_configured(&self) -> bool {
        self.inner.lock().await.config.is_some()
    }

    /// Run a closure against the resource, for resource-specific observers.
    pub async fn with_resource<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        let inner = self.inner.lock().await;
        f(&inner.resource)
    }

    /// Request startup.
    ///
    /// Idempotent: a `Running` driver returns `Ok` with no side effect.
    ///
    /// # Errors
    ///
    /// - [`DriverError::AwaitingConfig`] when configuration is required but
    ///   none has been adopted; the driver parks and starts on the next
    ///   accepted configuration.
    /// - The resource's own error when the start procedure fails; the
    ///   driver records `Stopped` and the pending start request is cleared.
    pub async fn startup(&self) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().await;
        self.startup_locked(&mut inner).await
    }

    /// Request shutdown.
    ///
    /// Idempotent: a `Stopped` driver returns `Ok` with no side effect. A
    /// driver parked in `AwaitingConfig` returns to `Stopped` without
    /// invoking the stop procedure, cancelling the pending start request.
    ///
    /// # Errors
    ///
    /// The resource's own error when the stop procedure fails; the driver
    /// keeps its prior state so a later shutdown can retry.
    pub async fn shutdown(&self) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().await;
        self.shutdown_locked(&mut inner).await
    }

    /// Stop then start, under a single lock acquisition so no configuration
    /// delivery can interleave between the two halves.
    ///
    /// # Errors
    ///
    /// Propagates the first failing half; a failed stop never leads to a
    /// start attempt.
    pub async fn restart(&self) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().await;
        self.restart_locked(&mut inner).await
    }

    async fn startup_locked(&self, inner: &mut Inner<R>) -> Result<(), DriverError> {
        if inner.state == DriverState::Running {
            return Ok(());
        }

        if self.requires_config && inner.config.is_none() {
            info!(driver = %self.name, "Startup deferred until a configuration is adopted");
            inner.state = DriverState::AwaitingConfig;
            return Err(DriverError::AwaitingConfig);
        }

        match inner.resource.start(inner.config.as_ref()).await {
            Ok(()) => {
                inner.state = DriverState::Running;
                info!(driver = %self.name, "Driver started");
                Ok(())
            }
            Err(err) => {
                inner.state = DriverState::Stopped;
                warn!(driver = %self.name, error = %err, "Driver failed to start");
                Err(err)
            }
        }
    }

    async fn shutdown_locked(&self, inner: &mut Inner<R>) -> Result<(), DriverError> {
        match inner.state {
            DriverState::Stopped => Ok(()),
            DriverState::AwaitingConfig => {
                inner.state = DriverState::Stopped;
                info!(driver = %self.name, "Cancelled pending startup");
                Ok(())
            }
            DriverState::Running => match inner.resource.stop().await {
                Ok(()) => {
                    inner.state = DriverState::Stopped;
                    info!(driver = %self.name, "Driver stopped");
                    Ok(())
                }
                Err(err) => {
                    warn!(driver = %self.name, error = %err, "Driver failed to stop");
                    Err(err)
                }
            },
        }
    }

    async fn restart_locked(&self, inner: &mut Inner<R>) -> Result<(), DriverError> {
        self.shutdown_locked(inner).await?;
        self.startup_locked(inner).await
    }

    /// Decode and check a fragment against the adopted configuration.
    fn screen(&self, inner: &Inner<R>, fragment: &Fragment) -> Screen<R::Config> {
        let candidate: R::Config = match serde_json::from_value(fragment.clone()) {
            Ok(candidate) => candidate,
            Err(err) => return Screen::Invalid(ValidationError::custom(err.to_string())),
        };

        if let Err(reason) = candidate.validate() {
            return Screen::Invalid(reason);
        }

        if inner.config.as_ref() == Some(&candidate) {
            Screen::Unchanged
        } else {
            Screen::Adopt(candidate)
        }
    }
}

#[async_trait]
impl<R: ManagedResource> FragmentValidator for Driver<R> {
    async fn inspect(&self, candidate: &Fragment) -> Verdict {
        let inner = self.inner.lock().await;
        match self.screen(&inner, candidate) {
            Screen::Adopt(_) => Verdict::Accepted,
            Screen::Unchanged => Verdict::Unchanged,
            Screen::Invalid(reason) => Verdict::Invalid(reason),
        }
    }
}

#[async_trait]
impl<R: ManagedResource> ConfigSubscriber for Driver<R> {
    async fn config_changed(&self, document: &ConfigDocument) {
        let mut inner = self.inner.lock().await;

        // An empty document never tears a configured driver down.
        if document.is_empty() {
            if inner.config.is_some() {
                warn!(driver = %self.name, "Ignoring empty configuration document");
            }
            return;
        }

        let Some(fragment) = document.fragment(&self.name) else {
            return;
        };

        let config = match self.screen(&inner, fragment) {
            Screen::Adopt(config) => config,
            Screen::Unchanged => {
                debug!(driver = %self.name, "Configuration unchanged");
                return;
            }
            Screen::Invalid(reason) => {
                warn!(driver = %self.name, %reason, "Ignoring invalid configuration fragment");
                return;
            }
        };

        inner.config = Some(config);
        info!(driver = %self.name, "Adopted new configuration");

        let applied = match inner.state {
            DriverState::AwaitingConfig => self.startup_locked(&mut inner).await,
            DriverState::Running => self.restart_locked(&mut inner).await,
            DriverState::Stopped => Ok(()),
        };
        if let Err(err) = applied {
            error!(driver = %self.name, error = %err, "Failed to apply new configuration");
        }
    }
}
