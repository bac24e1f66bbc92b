//! The process-wide configuration document.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The slice of a [`ConfigDocument`] addressed to one driver.
///
/// Fragments are carried as raw JSON until a driver decodes its own fragment
/// into the strongly-typed configuration it declares.
pub type Fragment = serde_json::Value;

/// Mapping from driver name to configuration fragment.
///
/// A document is either empty (no drivers configured) or holds one complete
/// fragment per configured driver. Documents are committed atomically by the
/// store; a driver only ever reads the fragment stored under its own name.
///
/// Serialization is transparent: the document is exactly one JSON object,
/// `{"<driver>": { ... }, ...}`, which is also the on-disk format.
///
/// # Examples
///
/// ```rust
/// use confdrive::document::ConfigDocument;
///
/// let document = ConfigDocument::new()
///     .with_fragment("http", serde_json::json!({ "host": "0.0.0.0", "port": 8080 }));
///
/// assert_eq!(document.len(), 1);
/// assert!(document.fragment("http").is_some());
/// assert!(document.fragment("db").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDocument {
    fragments: BTreeMap<String, Fragment>,
}

impl ConfigDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no driver is configured.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Number of configured drivers.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// The raw fragment stored under `name`, if any.
    pub fn fragment(&self, name: &str) -> Option<&Fragment> {
        self.fragments.get(name)
    }

    /// Driver names present in the document, in lexical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }

    /// Insert or replace the fragment stored under `name`.
    pub fn insert(&mut self, name: impl Into<String>, fragment: Fragment) {
        self.fragments.insert(name.into(), fragment);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_fragment(mut self, name: impl Into<String>, fragment: Fragment) -> Self {
        self.insert(name, fragment);
        self
    }

    /// Decode the fragment stored under `name` into a typed configuration.
    ///
    /// Returns `Ok(None)` when the document carries no fragment for `name`.
    ///
    /// # Errors
    ///
    /// Returns the decode error when the fragment does not match `T`.
    pub fn decode<T>(&self, name: &str) -> Result<Option<T>, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        match self.fragments.get(name) {
            Some(fragment) => serde_json::from_value(fragment.clone()).map(Some),
            None => Ok(None),
        }
    }
}
