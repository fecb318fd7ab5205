//! Storage error types for rlogic-storage.
//!
//! [`StorageError`] covers every way a save or load can be refused: container
//! framing, version and feature-level checks, payload encoding, file access,
//! content-state refusals on save and reconstruction failures on load.

use rlogic_core::{CoreError, ErrorData, ErrorKind, FeatureLevel, LogicEngine};
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The buffer is too short to hold the container header.
    #[error("{source_desc} contains corrupted data! Data should be at least 8 bytes")]
    Truncated { source_desc: String },

    /// Bytes 4-5 do not carry the logic engine tag.
    #[error("{source_desc}: Tried loading a binary data which doesn't store Ramses Logic content! Expected file bytes 4-5 to be '{expected}', but found '{found}' instead")]
    WrongIdentifier {
        source_desc: String,
        expected: String,
        found: String,
    },

    /// Bytes 6-7 carry a schema version this build cannot read.
    #[error("{source_desc}: Version mismatch while loading binary data! Expected version '{expected}', but found '{found}'")]
    SchemaVersion {
        source_desc: String,
        expected: String,
        found: String,
    },

    /// The payload does not start where the header says it does.
    #[error("{source_desc} contains corrupted data!")]
    Corrupted { source_desc: String },

    /// The payload could not be decoded.
    #[error("{source_desc} doesn't contain logic engine data with readable version specifiers: {reason}")]
    Decode { source_desc: String, reason: String },

    #[error("Version mismatch while loading {source_desc}! Expected host engine version {expected}.x.x but found {found}")]
    HostVersion {
        source_desc: String,
        expected: u32,
        found: String,
    },

    #[error("Feature level mismatch while loading {source_desc}! Loaded file with feature level {found:02} but LogicEngine was instantiated with feature level {expected}")]
    FeatureLevelMismatch {
        source_desc: String,
        found: u32,
        expected: FeatureLevel,
    },

    /// The stored feature level is not one this build knows.
    #[error("Could not recognize feature level {found} in {source_desc}")]
    UnknownFeatureLevel { source_desc: String, found: u32 },

    #[error("Fatal error while loading {source_desc}: doesn't contain API objects!")]
    MissingApiObjects { source_desc: String },

    /// Objects or links could not be rebuilt. Every problem found is listed.
    #[error("{}", messages.join("\n"))]
    Reconstruction { messages: Vec<String> },

    /// The payload could not be encoded.
    #[error("serialization error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Reading or writing the backing file failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid file descriptor: {fd}")]
    InvalidFd { fd: i32 },

    #[error("Failed to load from file descriptor: size may not be 0")]
    EmptyRange,

    /// The engine is in a state that cannot be saved.
    #[error("{reason}")]
    ContentState { reason: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl StorageError {
    /// The [`ErrorKind`] this error is recorded under in the engine's error
    /// list.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::ContentState { .. } => ErrorKind::ContentState,
            StorageError::Core(err) => err.kind(),
            _ => ErrorKind::Serialization,
        }
    }

    /// Logs the error and appends it to the engine's error list. Core errors
    /// are already recorded by the engine call that produced them.
    pub(crate) fn recorded(self, engine: &mut LogicEngine) -> Self {
        tracing::error!(kind = ?self.kind(), "{self}");
        match &self {
            StorageError::Core(_) => {}
            StorageError::Reconstruction { messages } => {
                for msg in messages {
                    engine.record_error(ErrorData::error(self.kind(), msg.clone(), None));
                }
            }
            _ => engine.record_error(ErrorData::error(self.kind(), self.to_string(), None)),
        }
        self
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        StorageError::Io {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_source_description() {
        let err = StorageError::Truncated {
            source_desc: "data buffer (size: 7)".into(),
        };
        assert_eq!(
            err.to_string(),
            "data buffer (size: 7) contains corrupted data! Data should be at least 8 bytes"
        );

        let err = StorageError::FeatureLevelMismatch {
            source_desc: "file 'a.rlogic'".into(),
            found: 2,
            expected: FeatureLevel::Level01,
        };
        assert_eq!(
            err.to_string(),
            "Feature level mismatch while loading file 'a.rlogic'! Loaded file with feature level 02 but LogicEngine was instantiated with feature level 01"
        );
    }

    #[test]
    fn reconstruction_lists_every_message() {
        let err = StorageError::Reconstruction {
            messages: vec!["first".into(), "second".into()],
        };
        assert_eq!(err.to_string(), "first\nsecond");
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }
}
