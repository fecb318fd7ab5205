//! Logic node kinds.
//!
//! A [`LogicNode`] couples identity, a property arena and a closed
//! [`NodeBehavior`]. Each behavior lives in its own submodule together with
//! the input/output schema it builds. [`NodeDescriptor`] is the persisted
//! configuration of a node, everything needed besides the property values to
//! rebuild its behavior on load.

pub mod anchor;
pub mod animation;
pub mod binding;
pub mod interface;
pub mod script;
pub mod skin;
pub mod timer;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::feature::Capability;
use crate::id::ObjectId;
use crate::math::Mat4;
use crate::object::ObjectMeta;
use crate::property::PropertyTree;

pub use anchor::AnchorNode;
pub use animation::{AnimationChannel, AnimationNode, AnimationNodeConfig, ChannelDescriptor, Interpolation};
pub use binding::BindingNode;
pub use script::{ScriptConfig, ScriptNode};
pub use skin::SkinNode;

/// Kind of external object a binding forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingKind {
    Node,
    Appearance,
    Camera,
    RenderPass,
    RenderGroup,
    MeshNode,
}

impl BindingKind {
    pub fn label(self) -> &'static str {
        match self {
            BindingKind::Node => "node",
            BindingKind::Appearance => "appearance",
            BindingKind::Camera => "camera",
            BindingKind::RenderPass => "render pass",
            BindingKind::RenderGroup => "render group",
            BindingKind::MeshNode => "mesh node",
        }
    }
}

/// Closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Script,
    Interface,
    Binding(BindingKind),
    Animation,
    Timer,
    SkinBinding,
    AnchorPoint,
}

impl NodeKind {
    /// Capability a node of this kind needs, if it is gated at all.
    pub fn required_capability(self) -> Option<Capability> {
        match self {
            NodeKind::Binding(BindingKind::RenderPass) => Some(Capability::RenderPassBinding),
            NodeKind::Binding(BindingKind::RenderGroup) => Some(Capability::RenderGroupBinding),
            NodeKind::Binding(BindingKind::MeshNode) => Some(Capability::MeshNodeBinding),
            NodeKind::SkinBinding => Some(Capability::SkinBinding),
            NodeKind::AnchorPoint => Some(Capability::AnchorPoint),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Script => f.write_str("script"),
            NodeKind::Interface => f.write_str("interface"),
            NodeKind::Binding(kind) => write!(f, "{} binding", kind.label()),
            NodeKind::Animation => f.write_str("animation node"),
            NodeKind::Timer => f.write_str("timer node"),
            NodeKind::SkinBinding => f.write_str("skin binding"),
            NodeKind::AnchorPoint => f.write_str("anchor point"),
        }
    }
}

/// Persisted reference to an external object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRef {
    pub name: String,
    pub object_id: u64,
    pub scene_id: u64,
}

/// Persisted configuration of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeDescriptor {
    Script {
        source: String,
        /// (alias, module id)
        modules: Vec<(String, ObjectId)>,
    },
    Interface,
    Binding {
        kind: BindingKind,
        target: ExternalRef,
        #[serde(default)]
        frustum_planes: bool,
        #[serde(default)]
        elements: Vec<String>,
    },
    Animation {
        channels: Vec<ChannelDescriptor>,
    },
    Timer,
    SkinBinding {
        joints: Vec<ObjectId>,
        inverse_bind_matrices: Vec<Mat4>,
        appearance: ObjectId,
        uniform: String,
    },
    AnchorPoint {
        node_binding: ObjectId,
        camera_binding: ObjectId,
    },
}

impl NodeDescriptor {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeDescriptor::Script { .. } => NodeKind::Script,
            NodeDescriptor::Interface => NodeKind::Interface,
            NodeDescriptor::Binding { kind, .. } => NodeKind::Binding(*kind),
            NodeDescriptor::Animation { .. } => NodeKind::Animation,
            NodeDescriptor::Timer => NodeKind::Timer,
            NodeDescriptor::SkinBinding { .. } => NodeKind::SkinBinding,
            NodeDescriptor::AnchorPoint { .. } => NodeKind::AnchorPoint,
        }
    }
}

pub enum NodeBehavior {
    Script(ScriptNode),
    Interface,
    Binding(BindingNode),
    Animation(AnimationNode),
    Timer,
    SkinBinding(SkinNode),
    AnchorPoint(AnchorNode),
}

/// A logic object owning an input tree, optional outputs and a behavior.
pub struct LogicNode {
    pub meta: ObjectMeta,
    pub tree: PropertyTree,
    pub behavior: NodeBehavior,
    pub(crate) dirty: bool,
}

impl LogicNode {
    pub(crate) fn new(meta: ObjectMeta, tree: PropertyTree, behavior: NodeBehavior) -> Self {
        LogicNode {
            meta,
            tree,
            behavior,
            dirty: true,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.meta.id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn kind(&self) -> NodeKind {
        match &self.behavior {
            NodeBehavior::Script(_) => NodeKind::Script,
            NodeBehavior::Interface => NodeKind::Interface,
            NodeBehavior::Binding(b) => NodeKind::Binding(b.kind),
            NodeBehavior::Animation(_) => NodeKind::Animation,
            NodeBehavior::Timer => NodeKind::Timer,
            NodeBehavior::SkinBinding(_) => NodeKind::SkinBinding,
            NodeBehavior::AnchorPoint(_) => NodeKind::AnchorPoint,
        }
    }

    /// Nodes whose inputs do not capture everything they depend on.
    pub(crate) fn always_dirty(&self) -> bool {
        matches!(
            self.behavior,
            NodeBehavior::Timer | NodeBehavior::SkinBinding(_) | NodeBehavior::AnchorPoint(_)
        )
    }

    pub fn descriptor(&self) -> NodeDescriptor {
        match &self.behavior {
            NodeBehavior::Script(s) => NodeDescriptor::Script {
                source: s.source.clone(),
                modules: s.modules.clone(),
            },
            NodeBehavior::Interface => NodeDescriptor::Interface,
            NodeBehavior::Binding(b) => NodeDescriptor::Binding {
                kind: b.kind,
                target: b.external_ref(),
                frustum_planes: b.frustum_planes,
                elements: b.elements.clone(),
            },
            NodeBehavior::Animation(a) => NodeDescriptor::Animation {
                channels: a.channels.clone(),
            },
            NodeBehavior::Timer => NodeDescriptor::Timer,
            NodeBehavior::SkinBinding(s) => NodeDescriptor::SkinBinding {
                joints: s.joints.clone(),
                inverse_bind_matrices: s.inverse_bind_matrices.clone(),
                appearance: s.appearance,
                uniform: s.uniform.clone(),
            },
            NodeBehavior::AnchorPoint(a) => NodeDescriptor::AnchorPoint {
                node_binding: a.node_binding,
                camera_binding: a.camera_binding,
            },
        }
    }

    /// Binding nodes this node reads from outside the link graph.
    pub(crate) fn binding_dependencies(&self) -> Vec<ObjectId> {
        match &self.behavior {
            NodeBehavior::AnchorPoint(a) => vec![a.node_binding, a.camera_binding],
            NodeBehavior::SkinBinding(s) => s.joints.clone(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn as_binding(&self) -> Option<&BindingNode> {
        match &self.behavior {
            NodeBehavior::Binding(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Debug for LogicNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicNode")
            .field("meta", &self.meta)
            .field("kind", &self.kind())
            .field("dirty", &self.dirty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_display() {
        assert_eq!(NodeKind::Binding(BindingKind::RenderPass).to_string(), "render pass binding");
        assert_eq!(NodeKind::AnchorPoint.to_string(), "anchor point");
    }

    #[test]
    fn descriptor_kind() {
        let d = NodeDescriptor::Binding {
            kind: BindingKind::Camera,
            target: ExternalRef {
                name: "cam".into(),
                object_id: 4,
                scene_id: 1,
            },
            frustum_planes: false,
            elements: vec![],
        };
        assert_eq!(d.kind(), NodeKind::Binding(BindingKind::Camera));
        assert_eq!(NodeDescriptor::Timer.kind(), NodeKind::Timer);
    }
}
