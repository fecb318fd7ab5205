//! Options for saving an engine.

use crate::schema::{AssetMetadata, Version};

/// Configuration passed to [`save_to_bytes`](crate::save_to_bytes) and
/// [`save_to_file`](crate::save_to_file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFileConfig {
    /// Refuse to save when `validate()` reports warnings.
    pub validation_enabled: bool,
    /// Free-form string stored with the file and logged on load.
    pub metadata: String,
    /// Version of the exporting tool, if any.
    pub exporter_version: Option<Version>,
    pub exporter_file_version: u32,
}

impl Default for SaveFileConfig {
    fn default() -> Self {
        SaveFileConfig {
            validation_enabled: true,
            metadata: String::new(),
            exporter_version: None,
            exporter_file_version: 0,
        }
    }
}

impl SaveFileConfig {
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    pub fn with_exporter_version(mut self, major: u32, minor: u32, patch: u32, file_format_version: u32) -> Self {
        self.exporter_version = Some(Version::new(major, minor, patch));
        self.exporter_file_version = file_format_version;
        self
    }

    pub(crate) fn asset_metadata(&self) -> AssetMetadata {
        AssetMetadata {
            metadata: self.metadata.clone(),
            exporter_version: self.exporter_version.clone(),
            exporter_file_version: self.exporter_file_version,
        }
    }
}
