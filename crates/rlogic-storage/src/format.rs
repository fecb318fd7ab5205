//! Container framing.
//!
//! ```text
//! bytes 0..4   little-endian u32 offset of the payload (always 8)
//! bytes 4..6   tag "rl"
//! bytes 6..8   schema version, two ASCII digits
//! bytes 8..    MessagePack payload (see `schema`)
//! ```

use crate::error::StorageError;

pub const TAG: &str = "rl";
pub const SCHEMA_VERSION: &str = "28";
pub const HEADER_LEN: usize = 8;

/// Major version of the host engine this build is compatible with. Files
/// written by a different host major are refused.
pub const HOST_VERSION_MAJOR: u32 = 28;

/// The four identifier bytes written at offset 4.
pub fn identifier() -> [u8; 4] {
    let mut id = [0u8; 4];
    id[..2].copy_from_slice(TAG.as_bytes());
    id[2..].copy_from_slice(SCHEMA_VERSION.as_bytes());
    id
}

/// Prepends the container header to an encoded payload.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&(HEADER_LEN as u32).to_le_bytes());
    out.extend_from_slice(&identifier());
    out.extend_from_slice(payload);
    out
}

/// Checks the header and returns the payload slice.
pub fn unframe<'a>(bytes: &'a [u8], source_desc: &str) -> Result<&'a [u8], StorageError> {
    if bytes.len() < HEADER_LEN {
        return Err(StorageError::Truncated {
            source_desc: source_desc.to_owned(),
        });
    }

    let id = &bytes[4..8];
    if &id[..2] != TAG.as_bytes() {
        return Err(StorageError::WrongIdentifier {
            source_desc: source_desc.to_owned(),
            expected: TAG.to_owned(),
            found: String::from_utf8_lossy(&id[..2]).into_owned(),
        });
    }
    if &id[2..] != SCHEMA_VERSION.as_bytes() {
        return Err(StorageError::SchemaVersion {
            source_desc: source_desc.to_owned(),
            expected: SCHEMA_VERSION.to_owned(),
            found: String::from_utf8_lossy(&id[2..]).into_owned(),
        });
    }

    let offset = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if offset < HEADER_LEN || offset > bytes.len() {
        return Err(StorageError::Corrupted {
            source_desc: source_desc.to_owned(),
        });
    }
    Ok(&bytes[offset..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_then_unframe() {
        let framed = frame(b"payload");
        assert_eq!(&framed[..8], &[8, 0, 0, 0, b'r', b'l', b'2', b'8']);
        assert_eq!(unframe(&framed, "buf").unwrap(), b"payload");
    }

    #[test]
    fn short_buffer_is_truncated() {
        let err = unframe(&[8, 0, 0, 0, b'r', b'l', b'2'], "data buffer").unwrap_err();
        assert!(matches!(err, StorageError::Truncated { .. }));
    }

    #[test]
    fn foreign_tag_is_reported_with_found_bytes() {
        let err = unframe(&[8, 0, 0, 0, b'x', b'y', b'2', b'8'], "data buffer").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"data buffer: Tried loading a binary data which doesn't store Ramses Logic content! Expected file bytes 4-5 to be 'rl', but found 'xy' instead");
    }

    #[test]
    fn other_schema_version_is_refused() {
        let err = unframe(&[8, 0, 0, 0, b'r', b'l', b'9', b'9'], "data buffer").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"data buffer: Version mismatch while loading binary data! Expected version '28', but found '99'");
    }

    #[test]
    fn offset_past_end_is_corrupted() {
        let err = unframe(&[64, 0, 0, 0, b'r', b'l', b'2', b'8'], "data buffer").unwrap_err();
        assert!(matches!(err, StorageError::Corrupted { .. }));
    }
}
