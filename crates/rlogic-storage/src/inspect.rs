//! Read-only summary of a saved file.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::StorageError;
use crate::format;
use crate::load::decode;
use crate::schema::AssetMetadata;

/// What a saved file contains, without loading it into an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub size: usize,
    pub host_version: String,
    pub logic_version: String,
    pub feature_level: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_metadata: Option<AssetMetadata>,
    pub modules: usize,
    pub data_arrays: usize,
    /// Node count per kind, e.g. `"script" => 3`.
    pub nodes: BTreeMap<String, usize>,
    pub links: usize,
    pub weak_links: usize,
    /// blake3 of the payload, hex encoded.
    pub content_hash: String,
}

impl FileSummary {
    pub fn node_count(&self) -> usize {
        self.nodes.values().sum()
    }
}

/// Summarizes a framed buffer.
pub fn inspect(bytes: &[u8], source_desc: &str) -> Result<FileSummary, StorageError> {
    let payload = format::unframe(bytes, source_desc)?;
    let file = decode(bytes, source_desc)?;
    let objects = file.api_objects.unwrap_or_default();

    let mut nodes = BTreeMap::new();
    for node in &objects.nodes {
        *nodes.entry(node.descriptor.kind().to_string()).or_insert(0) += 1;
    }

    Ok(FileSummary {
        size: bytes.len(),
        host_version: file.host_version.string,
        logic_version: file.logic_version.string,
        feature_level: file.feature_level,
        asset_metadata: file.asset_metadata,
        modules: objects.modules.len(),
        data_arrays: objects.data_arrays.len(),
        nodes,
        links: objects.links.len(),
        weak_links: objects.links.iter().filter(|l| l.weak).count(),
        content_hash: blake3::hash(payload).to_hex().to_string(),
    })
}
