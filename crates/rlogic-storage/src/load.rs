//! Reading an engine back from the binary container.
//!
//! Loading is all-or-nothing. The header, versions, feature level and the
//! presence of the object table are checked before anything is rebuilt, and
//! the rebuilt store only replaces the engine's content once every object and
//! link was restored without error.

use std::path::Path;

use rlogic_core::objects::RestoreContext;
use rlogic_core::{BindingKind, BindingTarget, FeatureLevel, LogicEngine, ObjectResolver};

use crate::convert;
use crate::error::StorageError;
use crate::format;
use crate::schema::{AssetMetadata, EngineFile};

/// Resolver for content without bindings. Every lookup fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScene;

impl ObjectResolver for NoScene {
    fn resolve(&mut self, _kind: BindingKind, _name: &str, _object_id: u64) -> Option<Box<dyn BindingTarget>> {
        None
    }
}

/// Replaces the content of `engine` with the objects stored in `bytes`.
/// Binding targets are looked up through `resolver`.
pub fn load_from_bytes(
    engine: &mut LogicEngine,
    bytes: &[u8],
    resolver: &mut dyn ObjectResolver,
) -> Result<(), StorageError> {
    let source_desc = format!("data buffer (size: {})", bytes.len());
    load_described(engine, bytes, resolver, &source_desc)
}

pub fn load_from_file(
    engine: &mut LogicEngine,
    path: impl AsRef<Path>,
    resolver: &mut dyn ObjectResolver,
) -> Result<(), StorageError> {
    let path = path.as_ref();
    engine.clear_errors();
    let bytes = std::fs::read(path)
        .map_err(|e| StorageError::io(format!("Failed to load file '{}'", path.display()), e).recorded(engine))?;
    let source_desc = format!("file '{}' (size: {})", path.display(), bytes.len());
    load_described(engine, &bytes, resolver, &source_desc)
}

/// Loads `size` bytes starting at `offset` of an open file. The descriptor is
/// only borrowed.
#[cfg(unix)]
pub fn load_from_fd(
    engine: &mut LogicEngine,
    fd: std::os::fd::BorrowedFd<'_>,
    offset: u64,
    size: usize,
    resolver: &mut dyn ObjectResolver,
) -> Result<(), StorageError> {
    use std::os::fd::AsRawFd;
    use std::os::unix::fs::FileExt;

    engine.clear_errors();
    let raw = fd.as_raw_fd();
    if raw <= 0 {
        return Err(StorageError::InvalidFd { fd: raw }.recorded(engine));
    }
    if size == 0 {
        return Err(StorageError::EmptyRange.recorded(engine));
    }

    let context = || format!("Failed to load from file descriptor: fd: {raw} offset: {offset} size: {size}");
    let file = fd
        .try_clone_to_owned()
        .map(std::fs::File::from)
        .map_err(|e| StorageError::io(context(), e).recorded(engine))?;
    let mut bytes = vec![0u8; size];
    file.read_exact_at(&mut bytes, offset)
        .map_err(|e| StorageError::io(context(), e).recorded(engine))?;

    let source_desc = format!("fd: {raw} (offset: {offset}, size: {size})");
    load_described(engine, &bytes, resolver, &source_desc)
}

/// Feature level a buffer was saved with, without loading it.
pub fn feature_level_from_buffer(name: &str, bytes: &[u8]) -> Result<FeatureLevel, StorageError> {
    let file = decode(bytes, name)?;
    FeatureLevel::from_u32(file.feature_level).ok_or_else(|| StorageError::UnknownFeatureLevel {
        source_desc: name.to_owned(),
        found: file.feature_level,
    })
}

pub fn feature_level_from_file(path: impl AsRef<Path>) -> Result<FeatureLevel, StorageError> {
    let path = path.as_ref();
    let bytes =
        std::fs::read(path).map_err(|e| StorageError::io(format!("Failed to load file '{}'", path.display()), e))?;
    feature_level_from_buffer(&path.display().to_string(), &bytes)
}

/// Unframes and decodes a container without checking it against an engine.
pub fn decode(bytes: &[u8], source_desc: &str) -> Result<EngineFile, StorageError> {
    let payload = format::unframe(bytes, source_desc)?;
    rmp_serde::from_slice(payload).map_err(|e| StorageError::Decode {
        source_desc: source_desc.to_owned(),
        reason: e.to_string(),
    })
}

fn load_described(
    engine: &mut LogicEngine,
    bytes: &[u8],
    resolver: &mut dyn ObjectResolver,
    source_desc: &str,
) -> Result<(), StorageError> {
    engine.clear_errors();
    match restore(engine, bytes, resolver, source_desc) {
        Ok(objects) => {
            engine.replace_objects(objects);
            Ok(())
        }
        Err(err) => Err(err.recorded(engine)),
    }
}

fn restore(
    engine: &LogicEngine,
    bytes: &[u8],
    resolver: &mut dyn ObjectResolver,
    source_desc: &str,
) -> Result<rlogic_core::objects::ApiObjects, StorageError> {
    let file = decode(bytes, source_desc)?;

    tracing::info!(
        "Loading logic engine content from '{source_desc}' which was exported with host engine {} and logic engine {}",
        file.host_version.string,
        file.logic_version.string
    );

    if file.host_version.major != format::HOST_VERSION_MAJOR {
        return Err(StorageError::HostVersion {
            source_desc: source_desc.to_owned(),
            expected: format::HOST_VERSION_MAJOR,
            found: file.host_version.string,
        });
    }

    let level = engine.feature_level();
    if file.feature_level != level.as_u32() {
        return Err(StorageError::FeatureLevelMismatch {
            source_desc: source_desc.to_owned(),
            found: file.feature_level,
            expected: level,
        });
    }

    let Some(api_objects) = file.api_objects else {
        return Err(StorageError::MissingApiObjects {
            source_desc: source_desc.to_owned(),
        });
    };

    if let Some(meta) = &file.asset_metadata {
        log_asset_metadata(meta);
    }

    let mut ctx = RestoreContext {
        level,
        runtime: engine.script_runtime(),
        resolver,
    };
    convert::recompose(api_objects, &mut ctx)
}

fn log_asset_metadata(meta: &AssetMetadata) {
    tracing::info!("Logic engine content metadata: '{}'", meta.metadata);
    match &meta.exporter_version {
        Some(v) => tracing::info!(
            "Exporter version: {} (file format version {})",
            v.string,
            meta.exporter_file_version
        ),
        None => tracing::info!("Exporter version: undefined"),
    }
}
