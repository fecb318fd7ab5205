//! Persisted payload layout.
//!
//! Every struct here is encoded as a MessagePack map with named fields, so
//! optional fields may be absent and readers tolerate fields they do not
//! know. Property values, node descriptors and data array contents reuse the
//! serde forms defined in `rlogic-core`.

use serde::{Deserialize, Serialize};

use rlogic_core::{DataArrayData, NodeDescriptor, PropertySnapshot};

/// A semantic version together with its display string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub string: String,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Version {
            major,
            minor,
            patch,
            string: format!("{major}.{minor}.{patch}"),
        }
    }

    /// The host engine version this build writes.
    pub fn host() -> Self {
        Version::new(crate::format::HOST_VERSION_MAJOR, 0, 0)
    }

    /// The version of this crate, taken from the package manifest.
    pub fn logic() -> Self {
        let parse = |s: &str| s.parse::<u32>().unwrap_or_default();
        Version {
            major: parse(env!("CARGO_PKG_VERSION_MAJOR")),
            minor: parse(env!("CARGO_PKG_VERSION_MINOR")),
            patch: parse(env!("CARGO_PKG_VERSION_PATCH")),
            string: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

/// Free-form information about the tool that produced a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    #[serde(default)]
    pub metadata: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exporter_version: Option<Version>,
    #[serde(default)]
    pub exporter_file_version: u32,
}

/// Root table of a saved file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineFile {
    pub host_version: Version,
    pub logic_version: Version,
    pub feature_level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_objects: Option<ApiObjectsData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_metadata: Option<AssetMetadata>,
}

/// Everything owned by an engine, in restore order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiObjectsData {
    #[serde(default)]
    pub modules: Vec<ModuleData>,
    #[serde(default)]
    pub data_arrays: Vec<DataArrayRecord>,
    #[serde(default)]
    pub nodes: Vec<NodeData>,
    #[serde(default)]
    pub links: Vec<LinkData>,
}

/// Identity of one logic object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectData {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<(u64, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleData {
    pub object: ObjectData,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataArrayRecord {
    pub object: ObjectData,
    pub data: DataArrayData,
}

/// A node: behavior configuration plus its property trees with values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub object: ObjectData,
    pub descriptor: NodeDescriptor,
    pub inputs: PropertySnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<PropertySnapshot>,
}

/// A leaf addressed by owning node id and its position in the node's
/// pre-order property listing (inputs first, then outputs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeafData {
    pub node: u64,
    pub property: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkData {
    pub source: LeafData,
    pub target: LeafData,
    #[serde(default)]
    pub weak: bool,
}
