//! Error taxonomy for the sampling engine.
//!
//! Every error reflects either a static declaration mistake or an
//! environment precondition. Nothing here is retried; all failures surface
//! synchronously at the point of first use.

use std::path::PathBuf;

/// All errors that can be returned by the sampling engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid or incomplete sample declaration: arity mismatch, duplicate
    /// sample id, a matcher over a type without registered equality, or a
    /// stubbed value whose type does not fit the intercepted method.
    #[error("invalid sample configuration: {0}")]
    InvalidConfig(String),

    /// A value could not be converted to or from its persistent form.
    #[error("cannot convert value of type {type_name}: {reason}")]
    Serialization { type_name: String, reason: String },

    /// Saving would overwrite an existing sample file. Recording must never
    /// silently clobber prior samples; pass an explicit overwrite intent.
    #[error("sample file already exists: {0}")]
    FileAlreadyExists(PathBuf),

    /// The requested sample file does not exist.
    #[error("sample file not found: {0}")]
    SampleFileNotFound(PathBuf),

    /// A loaded document references a method that has no live recording
    /// declaration in the current repository.
    #[error("sample document references unknown method: {0}")]
    MethodNotFound(String),

    /// The document could not be parsed or has an unexpected shape.
    #[error("malformed sample document: {0}")]
    Document(String),

    /// Underlying file-system failure while reading or writing samples.
    #[error("sample file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Document(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Document(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
