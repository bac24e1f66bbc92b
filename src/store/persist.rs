//! Whole-document JSON persistence.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::document::ConfigDocument;
use crate::error::StoreError;

/// The JSON file backing a store.
///
/// The file holds exactly one pretty-printed JSON object, the serialized
/// [`ConfigDocument`]. An absent or blank file reads as "no document yet";
/// anything else must parse.
#[derive(Debug)]
pub(crate) struct DocumentFile {
    path: PathBuf,
}

impl DocumentFile {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted document. Absent or blank files read as `None`.
    pub(crate) fn read(&self) -> Result<Option<ConfigDocument>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(StoreError::Load {
                    path: self.path.clone(),
                    source: Box::new(err),
                });
            }
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }

        let document = serde_json::from_str(&raw).map_err(|err| StoreError::Load {
            path: self.path.clone(),
            source: Box::new(err),
        })?;

        Ok(Some(document))
    }

    /// Write the document as pretty-printed JSON, replacing the file.
    pub(crate) fn write(&self, document: &ConfigDocument) -> Result<(), StoreError> {
        let raw = serde_json::to_vec_pretty(document).map_err(|err| StoreError::Persist {
            path: self.path.clone(),
            source: Box::new(err),
        })?;

        fs::write(&self.path, raw).map_err(|err| StoreError::Persist {
            path: self.path.clone(),
            source: Box::new(err),
        })
    }
}
