//! Builder for constructing ConfigStore instances.

use std::path::PathBuf;

use crate::error::{Result, StoreError};
use crate::store::persist::DocumentFile;
use crate::store::ConfigStore;

/// Builder for constructing a [`ConfigStore`].
///
/// # Examples
///
/// ```rust,no_run
/// use confdrive::prelude::*;
///
/// # fn example() -> Result<()> {
/// let store = ConfigStore::builder()
///     .with_file("drivers.json")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigStoreBuilder {
    path: Option<PathBuf>,
}

impl ConfigStoreBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self { path: None }
    }

    /// Set the JSON file backing the store. Mandatory.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Build the store, performing the initial read of the backing file.
    ///
    /// An absent or blank file seeds an empty document; the file is created
    /// on the first successful persist. Nothing is published at build time
    /// since no subscriber can be attached yet.
    ///
    /// # Errors
    ///
    /// Returns an error if no backing file was configured, or if the file
    /// exists but cannot be read or parsed.
    pub fn build(self) -> Result<ConfigStore> {
        let path = self.path.ok_or(StoreError::NoBackingFile)?;
        let file = DocumentFile::new(path);
        let initial = file.read()?.unwrap_or_default();
        Ok(ConfigStore::from_parts(initial, file))
    }
}

impl Default for ConfigStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
