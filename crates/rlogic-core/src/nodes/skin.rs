use crate::id::ObjectId;
use crate::math::{self, Mat4};
use crate::property::{PropertySemantics, PropertySpec, PropertyTree};

/// Skinning: joint matrices computed from node bindings and pushed into an
/// appearance uniform.
pub struct SkinNode {
    pub(crate) joints: Vec<ObjectId>,
    pub(crate) inverse_bind_matrices: Vec<Mat4>,
    pub(crate) appearance: ObjectId,
    pub(crate) uniform: String,
}

pub(crate) fn build_tree() -> Result<PropertyTree, String> {
    PropertyTree::new(&PropertySpec::structure("", vec![]), None, PropertySemantics::Input)
}

impl SkinNode {
    pub fn joints(&self) -> &[ObjectId] {
        &self.joints
    }

    pub fn appearance(&self) -> ObjectId {
        self.appearance
    }

    pub fn uniform(&self) -> &str {
        &self.uniform
    }

    pub fn uses_binding(&self, id: ObjectId) -> bool {
        self.appearance == id || self.joints.contains(&id)
    }

    /// `world(joint_i) * inverse_bind_i` for every joint.
    pub(crate) fn joint_matrices(&self, worlds: &[Mat4]) -> Vec<Mat4> {
        worlds
            .iter()
            .zip(&self.inverse_bind_matrices)
            .map(|(w, inv)| math::mul(w, inv))
            .collect()
    }
}
