//! The configuration store: validated updates, persistence, ordered fan-out.

mod builder;
mod persist;
mod subscribe;
mod validation;

pub use builder::ConfigStoreBuilder;
pub use subscribe::{ConfigSubscriber, SubscriptionId};
pub use validation::{FragmentValidator, Validate, Verdict};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::document::ConfigDocument;
use crate::error::{Rejection, Result, StoreError};

use persist::DocumentFile;

/// Registered validators and subscribers.
///
/// Guarded by one async lock; holding it across a whole
/// commit-persist-notify sequence is what gives subscribers a totally
/// ordered view of commits.
struct Registry {
    validators: BTreeMap<String, Arc<dyn FragmentValidator>>,
    subscribers: Vec<(SubscriptionId, Arc<dyn ConfigSubscriber>)>,
    next_subscription: usize,
}

/// Single source of truth for the process-wide configuration document.
///
/// All changes pass through the registered validators before they are
/// committed, persisted, and fanned out to subscribers in registration
/// order. New subscribers receive the current document once, immediately,
/// before any later change.
///
/// Reads are lock-free: [`get`](Self::get) returns a point-in-time snapshot
/// without touching the registry lock.
///
/// # Examples
///
/// ```rust,no_run
/// use confdrive::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let store = ConfigStore::builder()
///     .with_file("drivers.json")
///     .build()?;
///
/// // Lock-free snapshot of the current document.
/// let document = store.get();
/// println!("{} driver(s) configured", document.len());
/// # Ok(())
/// # }
/// ```
pub struct ConfigStore {
    /// The current document, wrapped in ArcSwap for atomic replacement.
    current: ArcSwap<ConfigDocument>,
    /// The JSON file backing the document.
    file: DocumentFile,
    /// Validators, subscribers, and the commit serialization lock.
    registry: Mutex<Registry>,
}

impl ConfigStore {
    /// Create a new builder for constructing a store.
    pub fn builder() -> ConfigStoreBuilder {
        ConfigStoreBuilder::new()
    }

    pub(crate) fn from_parts(initial: ConfigDocument, file: DocumentFile) -> Self {
        Self {
            current: ArcSwap::new(Arc::new(initial)),
            file,
            registry: Mutex::new(Registry {
                validators: BTreeMap::new(),
                subscribers: Vec::new(),
                next_subscription: 0,
            }),
        }
    }

    /// Get a reference-counted snapshot of the current document.
    ///
    /// This is a lock-free operation; readers never block writers or other
    /// readers.
    pub fn get(&self) -> Arc<ConfigDocument> {
        self.current.load_full()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Re-read the backing file and republish, even when nothing changed.
    ///
    /// An absent or blank file loads as the empty document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed; the
    /// in-memory document is left untouched and nothing is republished.
    pub async fn load(&self) -> Result<()> {
        let registry = self.registry.lock().await;
        self.load_locked(&registry).await
    }

    async fn load_locked(&self, registry: &Registry) -> Result<()> {
        let document = self.file.read()?.unwrap_or_default();
        info!(
            path = %self.file.path().display(),
            drivers = document.len(),
            "Loaded configuration"
        );
        self.current.store(Arc::new(document));
        self.notify_locked(registry).await;
        Ok(())
    }

    /// Persist the current document and republish.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. The in-memory document stays
    /// authoritative and subscribers are notified regardless.
    pub async fn save(&self) -> Result<()> {
        let registry = self.registry.lock().await;

        let result = self.file.write(&self.get());
        if let Err(err) = &result {
            warn!(error = %err, "Failed to persist configuration");
        }

        self.notify_locked(&registry).await;
        result
    }

    /// Validate, commit, persist, and republish a candidate document.
    ///
    /// Every registered validator whose name keys a fragment in the
    /// candidate is asked for a verdict; fragments under names with no
    /// registered validator pass through untouched. A candidate in which
    /// every addressed fragment is merely unchanged still commits and
    /// republishes.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NoValidators`] when the registry is empty; nothing
    ///   is committed.
    /// - [`StoreError::Rejected`] when any validator refuses, carrying every
    ///   rejection; nothing is committed.
    /// - [`StoreError::Persist`] when the write fails after the commit; the
    ///   new document is still in memory and has been republished.
    pub async fn update(&self, candidate: ConfigDocument) -> Result<()> {
        let registry = self.registry.lock().await;

        if registry.validators.is_empty() {
            warn!("Refusing configuration update: no validators registered");
            return Err(StoreError::NoValidators);
        }

        let mut rejections = Vec::new();
        for (name, validator) in &registry.validators {
            let Some(fragment) = candidate.fragment(name) else {
                continue;
            };

            match validator.inspect(fragment).await {
                Verdict::Accepted => {}
                Verdict::Unchanged => {
                    debug!(driver = %name, "Fragment unchanged");
                }
                Verdict::Invalid(reason) => {
                    warn!(driver = %name, %reason, "Fragment rejected");
                    rejections.push(Rejection {
                        driver: name.clone(),
                        reason,
                    });
                }
            }
        }

        if !rejections.is_empty() {
            return Err(StoreError::Rejected { rejections });
        }

        info!(drivers = candidate.len(), "Committing configuration");
        self.current.store(Arc::new(candidate));

        let persisted = self.file.write(&self.get());
        if let Err(err) = &persisted {
            warn!(error = %err, "Failed to persist configuration; in-memory document kept");
        }

        self.notify_locked(&registry).await;
        persisted
    }

    /// Register a subscriber and replay the current document to it.
    ///
    /// The subscriber is appended to the fan-out order and receives the
    /// current document exactly once before this call returns, even when
    /// the document is empty.
    pub async fn subscribe(&self, subscriber: Arc<dyn ConfigSubscriber>) -> SubscriptionId {
        let mut registry = self.registry.lock().await;

        let id = SubscriptionId(registry.next_subscription);
        registry.next_subscription += 1;
        registry.subscribers.push((id, Arc::clone(&subscriber)));

        // Replay under the lock so no commit can slip in between.
        let document = self.get();
        subscriber.config_changed(&document).await;

        id
    }

    /// Register a validation capability under a driver name.
    ///
    /// Registration triggers an immediate [`load`](Self::load), so a driver
    /// attached after the process came up still sees the persisted
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateValidator`] when the name is taken. A
    /// failing triggered load unwinds the registration and leaves the store
    /// exactly as it was.
    pub async fn register_validator(
        &self,
        name: impl Into<String>,
        validator: Arc<dyn FragmentValidator>,
    ) -> Result<()> {
        let name = name.into();
        let mut registry = self.registry.lock().await;

        if registry.validators.contains_key(&name) {
            return Err(StoreError::DuplicateValidator(name));
        }
        registry.validators.insert(name.clone(), validator);
        debug!(driver = %name, "Validator registered");

        if let Err(err) = self.load_locked(&registry).await {
            registry.validators.remove(&name);
            return Err(err);
        }

        Ok(())
    }

    /// Number of registered validators.
    pub async fn validator_count(&self) -> usize {
        self.registry.lock().await.validators.len()
    }

    /// Number of registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.registry.lock().await.subscribers.len()
    }

    async fn notify_locked(&self, registry: &Registry) {
        let document = self.get();
        for (_, subscriber) in &registry.subscribers {
            subscriber.config_changed(&document).await;
        }
    }
}
