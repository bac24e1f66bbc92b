//! Error types for confdrive.

use std::fmt;
use std::path::PathBuf;

/// Result type alias for confdrive operations, defaulting to [`StoreError`].
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Errors that can occur when working with the configuration store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An update was refused because no validator is registered at all.
    #[error("Refusing configuration update: no validators registered")]
    NoValidators,

    /// One or more validators rejected their fragment of the candidate.
    #[error("Configuration rejected: {}", format_rejections(.rejections))]
    Rejected {
        /// Every rejection, one per refusing validator.
        rejections: Vec<Rejection>,
    },

    /// A validator is already registered under this driver name.
    #[error("A validator is already registered for driver '{0}'")]
    DuplicateValidator(String),

    /// The builder was finished without a backing file.
    #[error("No backing file configured for the store")]
    NoBackingFile,

    /// Reading or parsing the backing file failed.
    #[error("Failed to load configuration from {}: {}", .path.display(), .source)]
    Load {
        /// The backing file.
        path: PathBuf,
        /// The underlying read or parse failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Writing the backing file failed. The in-memory document is still
    /// authoritative and has already been republished.
    #[error("Failed to persist configuration to {}: {}", .path.display(), .source)]
    Persist {
        /// The backing file.
        path: PathBuf,
        /// The underlying write failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// A single validator's refusal of a candidate document.
#[derive(Debug)]
pub struct Rejection {
    /// Name of the driver whose validator refused.
    pub driver: String,
    /// Why the fragment was refused.
    pub reason: ValidationError,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.driver, self.reason)
    }
}

fn format_rejections(rejections: &[Rejection]) -> String {
    rejections
        .iter()
        .map(Rejection::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors reported by driver lifecycle operations and managed resources.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Startup was requested before a configuration was adopted; the driver
    /// is parked and starts on the next accepted configuration.
    #[error("Driver is awaiting configuration before it can start")]
    AwaitingConfig,

    /// The resource was started without the configuration it requires.
    #[error("Resource requires a configuration but none was provided")]
    NotConfigured,

    /// IO error from the managed resource.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error from the connection pool.
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Any other failure reported by a resource implementation.
    #[error("Resource error: {0}")]
    Resource(String),
}

/// Validation error for typed configuration fragments.
#[derive(Debug)]
pub enum ValidationError {
    /// Custom validation error with a message.
    Custom(String),

    /// A specific field has an invalid value.
    InvalidField {
        /// The field name/path
        field: String,
        /// The reason why it's invalid
        reason: String,
    },
}

impl ValidationError {
    /// Create a custom validation error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(msg) => write!(f, "{}", msg),
            Self::InvalidField { field, reason } => {
                write!(f, "Field '{}' is invalid: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {}
