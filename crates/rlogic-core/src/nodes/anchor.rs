//! Anchor points: project a bound node's origin through a bound camera.

use crate::id::ObjectId;
use crate::math::{self, Mat4};
use crate::property::{PropertySemantics, PropertySpec, PropertyTree};
use crate::value::{PropertyType, PropertyValue};

pub struct AnchorNode {
    pub(crate) node_binding: ObjectId,
    pub(crate) camera_binding: ObjectId,
}

pub(crate) fn build_tree() -> Result<PropertyTree, String> {
    let outputs = PropertySpec::structure(
        "",
        vec![
            PropertySpec::leaf("viewportCoords", PropertyType::Vec2f),
            PropertySpec::leaf("depth", PropertyType::Float),
        ],
    );
    PropertyTree::new(&PropertySpec::structure("", vec![]), Some(&outputs), PropertySemantics::Input)
}

/// Viewport coordinates and normalized depth of the origin of `world`.
pub(crate) fn project(world: &Mat4, view_projection: &Mat4, viewport: [i32; 4]) -> ([f32; 2], f32) {
    let clip = math::transform_point(&math::mul(view_projection, world), [0.0, 0.0, 0.0]);
    let w = if clip[3] == 0.0 { 1.0 } else { clip[3] };
    let ndc = [clip[0] / w, clip[1] / w, clip[2] / w];
    let [x, y, width, height] = viewport.map(|v| v as f32);
    (
        [(ndc[0] + 1.0) * 0.5 * width + x, (ndc[1] + 1.0) * 0.5 * height + y],
        (ndc[2] + 1.0) * 0.5,
    )
}

impl AnchorNode {
    pub fn node_binding(&self) -> ObjectId {
        self.node_binding
    }

    pub fn camera_binding(&self) -> ObjectId {
        self.camera_binding
    }

    pub(crate) fn write_outputs(tree: &mut PropertyTree, coords: [f32; 2], depth: f32) {
        let Some(outputs) = tree.outputs() else { return };
        if let Some(idx) = tree.child_by_name(outputs, "viewportCoords") {
            tree.set_leaf(idx, PropertyValue::Vec2f(coords));
        }
        if let Some(idx) = tree.child_by_name(outputs, "depth") {
            tree.set_leaf(idx, PropertyValue::Float(depth));
        }
    }
}
