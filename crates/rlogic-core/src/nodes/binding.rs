//! Binding nodes: forward input values to a live external object.
//!
//! Each binding kind has a fixed input schema. Values flow only one way,
//! from the binding's inputs into the target, and only for leaves flagged
//! as carrying a new value since the last apply.

use crate::collab::BindingTarget;
use crate::feature::{Capability, FeatureLevel};
use crate::property::{PropertySemantics, PropertySpec, PropertyTree};
use crate::value::PropertyType;

use super::{BindingKind, ExternalRef};

pub struct BindingNode {
    pub(crate) kind: BindingKind,
    pub(crate) target: Box<dyn BindingTarget>,
    pub(crate) frustum_planes: bool,
    pub(crate) elements: Vec<String>,
}

fn floats(names: &[&str]) -> Vec<PropertySpec> {
    names.iter().map(|n| PropertySpec::leaf(*n, PropertyType::Float)).collect()
}

fn ints(names: &[&str]) -> Vec<PropertySpec> {
    names.iter().map(|n| PropertySpec::leaf(*n, PropertyType::Int32)).collect()
}

/// Input schema of a binding of `kind`.
pub(crate) fn input_spec(
    kind: BindingKind,
    level: FeatureLevel,
    frustum_planes: bool,
    elements: &[String],
    target: &dyn BindingTarget,
) -> Result<PropertySpec, String> {
    let children = match kind {
        BindingKind::Node => {
            let mut c = vec![PropertySpec::leaf("visibility", PropertyType::Bool)];
            if level.supports(Capability::NodeBindingEnabled) {
                c.push(PropertySpec::leaf("enabled", PropertyType::Bool));
            }
            c.push(PropertySpec::leaf("rotation", PropertyType::Vec3f));
            c.push(PropertySpec::leaf("translation", PropertyType::Vec3f));
            c.push(PropertySpec::leaf("scaling", PropertyType::Vec3f));
            c
        }
        BindingKind::Appearance => target
            .uniform_inputs()
            .map(|spec| spec.children)
            .unwrap_or_default(),
        BindingKind::Camera => {
            let frustum = if frustum_planes {
                floats(&["nearPlane", "farPlane", "leftPlane", "rightPlane", "bottomPlane", "topPlane"])
            } else {
                floats(&["nearPlane", "farPlane", "fieldOfView", "aspectRatio"])
            };
            vec![
                PropertySpec::structure("viewport", ints(&["offsetX", "offsetY", "width", "height"])),
                PropertySpec::structure("frustum", frustum),
            ]
        }
        BindingKind::RenderPass => vec![
            PropertySpec::leaf("enabled", PropertyType::Bool),
            PropertySpec::leaf("renderOrder", PropertyType::Int32),
            PropertySpec::leaf("clearColor", PropertyType::Vec4f),
            PropertySpec::leaf("renderOnce", PropertyType::Bool),
        ],
        BindingKind::RenderGroup => {
            if elements.is_empty() {
                return Err("Cannot create render group binding without elements".to_owned());
            }
            vec![PropertySpec::structure(
                "renderOrders",
                elements
                    .iter()
                    .map(|e| PropertySpec::leaf(e.clone(), PropertyType::Int32))
                    .collect(),
            )]
        }
        BindingKind::MeshNode => ints(&["vertexOffset", "indexOffset", "indexCount", "instanceCount"]),
    };
    let spec = PropertySpec::structure("", children);
    spec.validate()?;
    Ok(spec)
}

/// Builds the binding's tree and seeds it from the target's current state.
/// Seeded values are not flagged as new.
pub(crate) fn build_tree(spec: &PropertySpec, target: &dyn BindingTarget) -> Result<PropertyTree, String> {
    let mut tree = PropertyTree::new(spec, None, PropertySemantics::BindingInput)?;
    for leaf in tree.leaves(tree.inputs()) {
        if let Some(value) = target.initial_value(&tree.path_of(leaf)) {
            tree.set_leaf(leaf, value);
        }
    }
    Ok(tree)
}

impl BindingNode {
    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    pub fn target(&self) -> &dyn BindingTarget {
        self.target.as_ref()
    }

    pub(crate) fn target_mut(&mut self) -> &mut dyn BindingTarget {
        self.target.as_mut()
    }

    pub(crate) fn external_ref(&self) -> ExternalRef {
        ExternalRef {
            name: self.target.name().to_owned(),
            object_id: self.target.object_id(),
            scene_id: self.target.scene_id(),
        }
    }

    /// Forwards every leaf flagged as new to the target and clears the flag.
    pub(crate) fn execute(&mut self, tree: &mut PropertyTree) -> Result<(), String> {
        let pending = tree.pending_leaves();
        if pending.is_empty() {
            return Ok(());
        }
        if self.kind == BindingKind::Camera {
            check_viewport(tree, &pending)?;
        }
        for idx in pending {
            let path = tree.path_of(idx);
            let value = match tree.get_mut(idx) {
                Some(rec) => {
                    rec.has_new_value = false;
                    rec.value.clone()
                }
                None => None,
            };
            if let Some(value) = value {
                self.target.apply(&path, &value)?;
            }
        }
        Ok(())
    }
}

fn check_viewport(tree: &PropertyTree, pending: &[crate::id::PropertyIndex]) -> Result<(), String> {
    let touches_viewport = pending
        .iter()
        .any(|idx| tree.path_of(*idx).starts_with("viewport."));
    if !touches_viewport {
        return Ok(());
    }
    let read = |path: &str| {
        tree.resolve_path(tree.inputs(), path)
            .and_then(|idx| tree.value(idx))
            .and_then(|v| v.get::<i32>())
            .unwrap_or_default()
    };
    let (width, height) = (read("viewport.width"), read("viewport.height"));
    if width <= 0 || height <= 0 {
        return Err(format!(
            "Camera viewport size must be positive! (width: {width}; height: {height})"
        ));
    }
    Ok(())
}
