//! Error types for the audit pipeline

use thiserror::Error;

/// A document source call failed.
///
/// Recovered locally by the traversal engine: the affected subtree or leaf is
/// skipped and the walk continues.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The backend could not be reached or answered with a failure status.
    #[error("source unavailable for '{identifier}': {message}")]
    Unavailable { identifier: String, message: String },

    /// The backend answered, but with something we cannot interpret.
    #[error("unexpected response for '{identifier}': {message}")]
    Unexpected { identifier: String, message: String },

    #[error("'{0}' not found in source")]
    NotFound(String),
}

impl SourceError {
    pub fn unavailable(identifier: impl Into<String>, message: impl ToString) -> Self {
        Self::Unavailable {
            identifier: identifier.into(),
            message: message.to_string(),
        }
    }

    pub fn unexpected(identifier: impl Into<String>, message: impl ToString) -> Self {
        Self::Unexpected {
            identifier: identifier.into(),
            message: message.to_string(),
        }
    }
}

/// Embedded metadata could not be used.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("front matter is not valid YAML: {0}")]
    Malformed(#[from] serde_yaml::Error),

    #[error("front matter must be a mapping of keys to values")]
    NotAMapping,

    #[error("front matter block is not terminated")]
    Unterminated,

    #[error("content is not valid UTF-8")]
    NotUtf8,
}

/// Failure while building or publishing the marker change-set.
///
/// Fatal for the marking phase only. Edits already applied are not rolled back.
#[derive(Error, Debug)]
pub enum MarkingError {
    #[error("could not create change-set: {0}")]
    CreateChangeSet(#[source] SourceError),

    #[error("could not update '{identifier}': {source}")]
    Write {
        identifier: String,
        #[source]
        source: SourceError,
    },

    #[error("could not publish change-set '{change_set}': {source}")]
    Publish {
        change_set: String,
        #[source]
        source: SourceError,
    },
}

/// Result type alias for source calls
pub type SourceResult<T> = std::result::Result<T, SourceError>;
