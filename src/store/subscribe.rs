//! Subscriber contract for configuration fan-out.

use async_trait::async_trait;

use crate::document::ConfigDocument;

/// Identifier handed out by [`ConfigStore::subscribe`](crate::store::ConfigStore::subscribe).
///
/// Subscriptions live for the life of the store; the id exists so callers
/// can correlate log output with a registration, not to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) usize);

/// A recipient of committed configuration documents.
///
/// Subscribers are invoked in registration order, once immediately with the
/// current document when they subscribe, then once per committed change.
/// Delivery is awaited, so a slow subscriber delays the triggering call, not
/// the ordering.
#[async_trait]
pub trait ConfigSubscriber: Send + Sync {
    /// Receive the current document.
    async fn config_changed(&self, document: &ConfigDocument);
}
