//! Feature levels and the capability table.
//!
//! A feature level is chosen when the engine is created and is persisted with
//! every saved file. Capabilities introduced at a given level are listed once in
//! [`CAPABILITY_TABLE`]; every gate in the workspace goes through
//! [`FeatureLevel::supports`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Capability tier of an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum FeatureLevel {
    #[default]
    Level01 = 1,
    Level02 = 2,
    Level03 = 3,
    Level04 = 4,
    Level05 = 5,
}

/// A gated capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    NodeBindingEnabled,
    CameraFrustumPlanes,
    RenderPassBinding,
    AnchorPoint,
    RenderGroupBinding,
    SkinBinding,
    FloatArrayDataArray,
    MeshNodeBinding,
}

impl Capability {
    pub fn label(self) -> &'static str {
        match self {
            Capability::NodeBindingEnabled => "Node binding 'enabled' input",
            Capability::CameraFrustumPlanes => "Camera binding with frustum planes",
            Capability::RenderPassBinding => "RenderPassBinding",
            Capability::AnchorPoint => "AnchorPoint",
            Capability::RenderGroupBinding => "RenderGroupBinding",
            Capability::SkinBinding => "SkinBinding",
            Capability::FloatArrayDataArray => "DataArray of float arrays",
            Capability::MeshNodeBinding => "MeshNodeBinding",
        }
    }
}

/// Level at which each capability first becomes available.
pub const CAPABILITY_TABLE: &[(FeatureLevel, &[Capability])] = &[
    (FeatureLevel::Level01, &[]),
    (
        FeatureLevel::Level02,
        &[
            Capability::NodeBindingEnabled,
            Capability::CameraFrustumPlanes,
            Capability::RenderPassBinding,
            Capability::AnchorPoint,
        ],
    ),
    (FeatureLevel::Level03, &[Capability::RenderGroupBinding]),
    (
        FeatureLevel::Level04,
        &[Capability::SkinBinding, Capability::FloatArrayDataArray],
    ),
    (FeatureLevel::Level05, &[Capability::MeshNodeBinding]),
];

impl FeatureLevel {
    pub const ALL: [FeatureLevel; 5] = [
        FeatureLevel::Level01,
        FeatureLevel::Level02,
        FeatureLevel::Level03,
        FeatureLevel::Level04,
        FeatureLevel::Level05,
    ];

    pub const LATEST: FeatureLevel = FeatureLevel::Level05;

    pub fn from_u32(value: u32) -> Option<FeatureLevel> {
        Self::ALL.into_iter().find(|level| level.as_u32() == value)
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Level at which `cap` is introduced.
    pub fn required_for(cap: Capability) -> FeatureLevel {
        CAPABILITY_TABLE
            .iter()
            .find(|(_, caps)| caps.contains(&cap))
            .map(|(level, _)| *level)
            .unwrap_or(FeatureLevel::LATEST)
    }

    pub fn supports(self, cap: Capability) -> bool {
        self >= Self::required_for(cap)
    }
}

impl fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.as_u32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_capability_is_listed_once() {
        let all = [
            Capability::NodeBindingEnabled,
            Capability::CameraFrustumPlanes,
            Capability::RenderPassBinding,
            Capability::AnchorPoint,
            Capability::RenderGroupBinding,
            Capability::SkinBinding,
            Capability::FloatArrayDataArray,
            Capability::MeshNodeBinding,
        ];
        for cap in all {
            let hits = CAPABILITY_TABLE
                .iter()
                .filter(|(_, caps)| caps.contains(&cap))
                .count();
            assert_eq!(hits, 1, "{cap:?}");
        }
    }

    #[test]
    fn gates_follow_levels() {
        assert!(!FeatureLevel::Level01.supports(Capability::AnchorPoint));
        assert!(FeatureLevel::Level02.supports(Capability::AnchorPoint));
        assert!(!FeatureLevel::Level02.supports(Capability::RenderGroupBinding));
        assert!(FeatureLevel::Level04.supports(Capability::SkinBinding));
        assert!(!FeatureLevel::Level04.supports(Capability::MeshNodeBinding));
        assert!(FeatureLevel::Level05.supports(Capability::MeshNodeBinding));
    }

    #[test]
    fn u32_conversion() {
        assert_eq!(FeatureLevel::from_u32(3), Some(FeatureLevel::Level03));
        assert_eq!(FeatureLevel::from_u32(0), None);
        assert_eq!(FeatureLevel::from_u32(6), None);
        assert_eq!(FeatureLevel::Level05.as_u32(), 5);
    }

    #[test]
    fn display_is_two_digits() {
        assert_eq!(FeatureLevel::Level01.to_string(), "01");
        assert_eq!(FeatureLevel::default(), FeatureLevel::Level01);
    }
}
