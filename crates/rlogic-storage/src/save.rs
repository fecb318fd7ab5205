//! Writing an engine to the binary container.

use std::path::Path;

use rlogic_core::LogicEngine;

use crate::config::SaveFileConfig;
use crate::convert;
use crate::error::StorageError;
use crate::format;
use crate::schema::{EngineFile, Version};

/// Serializes `engine` into a framed buffer.
///
/// Refused when bindings point into more than one external scene, when the
/// strong-link graph has a cycle, or, with validation enabled, when
/// `validate()` reports anything. The refusal is also recorded in the
/// engine's error list.
pub fn save_to_bytes(engine: &mut LogicEngine, config: &SaveFileConfig) -> Result<Vec<u8>, StorageError> {
    engine.clear_errors();
    check_saveable(engine, config).map_err(|e| e.recorded(engine))?;
    encode(engine, config).map_err(|e| e.recorded(engine))
}

/// Saves `engine` to `path`, replacing any existing file.
pub fn save_to_file(
    engine: &mut LogicEngine,
    path: impl AsRef<Path>,
    config: &SaveFileConfig,
) -> Result<(), StorageError> {
    let path = path.as_ref();
    let bytes = save_to_bytes(engine, config)?;
    std::fs::write(path, &bytes).map_err(|e| {
        StorageError::io(format!("Failed to save content to path '{}'!", path.display()), e).recorded(engine)
    })?;
    tracing::info!(path = %path.display(), size = bytes.len(), "Saved logic engine to file");
    Ok(())
}

/// Size in bytes of the container `engine` would be saved to, without
/// running any of the save checks.
pub fn serialized_size(engine: &LogicEngine) -> Result<usize, StorageError> {
    encode(engine, &SaveFileConfig::default()).map(|b| b.len())
}

fn check_saveable(engine: &mut LogicEngine, config: &SaveFileConfig) -> Result<(), StorageError> {
    if engine.objects().scene_ids().len() > 1 {
        return Err(StorageError::ContentState {
            reason: "Can't save a logic engine to file while it has references to more than one external scene!"
                .to_owned(),
        });
    }

    engine.check_schedulable("saveToFile()")?;

    if config.validation_enabled {
        let warnings = engine.validate();
        if !warnings.is_empty() {
            return Err(StorageError::ContentState {
                reason: format!(
                    "Failed to saveToFile() because validation warnings were encountered! \
                     Resolve them or save with validation disabled. First warning: {}",
                    warnings[0].message
                ),
            });
        }
    }
    Ok(())
}

fn encode(engine: &LogicEngine, config: &SaveFileConfig) -> Result<Vec<u8>, StorageError> {
    let file = EngineFile {
        host_version: Version::host(),
        logic_version: Version::logic(),
        feature_level: engine.feature_level().as_u32(),
        api_objects: Some(convert::decompose(engine.objects())?),
        asset_metadata: Some(config.asset_metadata()),
    };
    let payload = rmp_serde::to_vec_named(&file)?;
    Ok(format::frame(&payload))
}
