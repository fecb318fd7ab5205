//! Binary persistence for rlogic engines.
//!
//! A saved engine is a small fixed header followed by a MessagePack payload
//! holding versions, the feature level, optional asset metadata and the full
//! object table (modules, data arrays, nodes with their property values, and
//! links).
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`format`]: header framing and identifier checks
//! - [`schema`]: persisted payload types
//! - [`convert`]: ApiObjects decompose/recompose functions
//! - [`config`]: SaveFileConfig
//! - [`save`] / [`load`]: buffer, file and file descriptor entry points
//! - [`inspect`]: FileSummary of a saved file

pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod inspect;
pub mod load;
pub mod save;
pub mod schema;

// Re-export key types for ergonomic use.
pub use config::SaveFileConfig;
pub use error::StorageError;
pub use inspect::{inspect, FileSummary};
#[cfg(unix)]
pub use load::load_from_fd;
pub use load::{feature_level_from_buffer, feature_level_from_file, load_from_bytes, load_from_file, NoScene};
pub use save::{save_to_bytes, save_to_file, serialized_size};
pub use schema::{AssetMetadata, Version};
