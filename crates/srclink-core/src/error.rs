use thiserror::Error;

/// Core error types for srclink.
///
/// Session-state failures are deliberately small in number: disk loads can
/// fail, and edit application can be handed a location or version the client
/// never synchronized. Everything else in the link pipeline degrades silently
/// (an unparsable or unresolvable reference is not an error).
///
/// # Examples
///
/// ```
/// use srclink_core::error::{Result, SrclinkError};
///
/// fn apply(version: i32, current: i32, location: &str) -> Result<()> {
///     if version <= current {
///         return Err(SrclinkError::StaleVersion {
///             location: location.into(),
///             current,
///             received: version,
///         });
///     }
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum SrclinkError {
    #[error("no open document registered for {location}")]
    DocumentNotFound { location: String },

    #[error("stale edit batch for {location}: received version {received}, current version is {current}")]
    StaleVersion {
        location: String,
        current: i32,
        received: i32,
    },

    #[error("location cannot be loaded from disk: {0}")]
    NotFileBacked(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, SrclinkError>`.
pub type Result<T> = std::result::Result<T, SrclinkError>;
