//! Validation contracts for configuration fragments.

use async_trait::async_trait;

use crate::document::Fragment;
use crate::error::ValidationError;

/// Trait for typed driver configurations.
///
/// Implement this trait on the configuration type a driver decodes from its
/// fragment. Field-level checks run here, once, at validation time; a value
/// that passes is safe to hand to the resource's start procedure.
///
/// # Examples
///
/// ```rust
/// use confdrive::error::ValidationError;
/// use confdrive::store::Validate;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize, Clone, PartialEq)]
/// struct ListenerConfig {
///     host: String,
///     port: u16,
/// }
///
/// impl Validate for ListenerConfig {
///     fn validate(&self) -> Result<(), ValidationError> {
///         if self.host.is_empty() {
///             return Err(ValidationError::invalid_field("host", "must not be empty"));
///         }
///
///         if self.port == 0 {
///             return Err(ValidationError::invalid_field("port", "must be non-zero"));
///         }
///
///         Ok(())
///     }
/// }
/// ```
pub trait Validate {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Should return a `ValidationError` describing what validation failed.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Outcome of screening one candidate fragment.
///
/// An `Invalid` verdict vetoes the whole candidate document; `Unchanged`
/// marks a well-formed fragment equal to the one already adopted, which
/// commits as a no-op rather than being rejected.
#[derive(Debug)]
pub enum Verdict {
    /// The fragment is usable and differs from the adopted configuration.
    Accepted,
    /// The fragment is usable but identical to the adopted configuration.
    Unchanged,
    /// The fragment is unusable; the update must not be committed.
    Invalid(ValidationError),
}

/// A validation capability registered with the store under a driver name.
///
/// The store consults the validator whenever a candidate document carries a
/// fragment under that name. Drivers implement this themselves; standalone
/// validators work too.
#[async_trait]
pub trait FragmentValidator: Send + Sync {
    /// Judge one candidate fragment.
    async fn inspect(&self, candidate: &Fragment) -> Verdict;
}
