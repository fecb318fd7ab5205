//! The object store behind a [`LogicEngine`](crate::engine::LogicEngine).
//!
//! [`ApiObjects`] owns every node, data array and script module together with
//! the link registry and the dependency graph, and keeps the three in sync.
//! It also hosts the node builders shared by the engine factories and the
//! loader, so a node restored from a file goes through the same checks as a
//! freshly created one.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;

use crate::collab::{BindingTarget, Clock, ModuleSource, ObjectResolver, ScriptRuntime};
use crate::data_array::{DataArray, DataArrayData};
use crate::error::LinkError;
use crate::feature::{Capability, FeatureLevel};
use crate::id::ObjectId;
use crate::link::{LeafKey, Link, LinkRegistry};
use crate::math::Mat4;
use crate::nodes::{
    anchor, animation, binding, interface, skin, timer, AnchorNode, AnimationNode, BindingKind, BindingNode,
    ChannelDescriptor, LogicNode, NodeBehavior, NodeDescriptor, NodeKind, ScriptNode, SkinNode,
};
use crate::object::{ObjectMeta, ScriptModule};
use crate::property::{PropertyRecord, PropertySemantics, PropertySnapshot, PropertySpec, PropertyTree};
use crate::scheduler::DependencyGraph;
use crate::value::PropertyValue;

/// A freshly built node before it receives an identity.
pub(crate) type BuiltNode = (PropertyTree, NodeBehavior);

/// Collaborators needed to rebuild nodes from persisted descriptors.
pub struct RestoreContext<'a> {
    pub level: FeatureLevel,
    pub runtime: Option<&'a dyn ScriptRuntime>,
    pub resolver: &'a mut dyn ObjectResolver,
}

#[derive(Default)]
pub struct ApiObjects {
    nodes: IndexMap<ObjectId, LogicNode>,
    data_arrays: IndexMap<ObjectId, DataArray>,
    modules: IndexMap<ObjectId, ScriptModule>,
    links: LinkRegistry,
    dependencies: DependencyGraph,
}

impl ApiObjects {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn nodes(&self) -> impl Iterator<Item = &LogicNode> {
        self.nodes.values()
    }

    pub fn node(&self, id: ObjectId) -> Option<&LogicNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: ObjectId) -> Option<&mut LogicNode> {
        self.nodes.get_mut(&id)
    }

    pub fn data_arrays(&self) -> impl Iterator<Item = &DataArray> {
        self.data_arrays.values()
    }

    pub fn data_array(&self, id: ObjectId) -> Option<&DataArray> {
        self.data_arrays.get(&id)
    }

    pub(crate) fn data_array_mut(&mut self, id: ObjectId) -> Option<&mut DataArray> {
        self.data_arrays.get_mut(&id)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ScriptModule> {
        self.modules.values()
    }

    pub fn module(&self, id: ObjectId) -> Option<&ScriptModule> {
        self.modules.get(&id)
    }

    pub(crate) fn module_mut(&mut self, id: ObjectId) -> Option<&mut ScriptModule> {
        self.modules.get_mut(&id)
    }

    pub fn links(&self) -> &LinkRegistry {
        &self.links
    }

    pub(crate) fn dependencies_mut(&mut self) -> &mut DependencyGraph {
        &mut self.dependencies
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of nodes, data arrays and modules.
    pub fn object_count(&self) -> usize {
        self.nodes.len() + self.data_arrays.len() + self.modules.len()
    }

    /// Largest id in use, if any.
    pub fn max_object_id(&self) -> Option<ObjectId> {
        self.nodes
            .keys()
            .chain(self.data_arrays.keys())
            .chain(self.modules.keys())
            .max()
            .copied()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.nodes.contains_key(&id) || self.data_arrays.contains_key(&id) || self.modules.contains_key(&id)
    }

    pub fn leaf(&self, key: LeafKey) -> Option<&PropertyRecord> {
        self.nodes.get(&key.node)?.tree.get(key.index)
    }

    pub(crate) fn binding_target(&self, id: ObjectId) -> Option<&dyn BindingTarget> {
        self.nodes.get(&id)?.as_binding().map(|b| b.target())
    }

    fn binding_kind(&self, id: ObjectId) -> Option<BindingKind> {
        self.nodes.get(&id)?.as_binding().map(|b| b.kind)
    }

    fn property_path(&self, key: LeafKey) -> String {
        self.nodes
            .get(&key.node)
            .map(|n| n.tree.path_of(key.index))
            .unwrap_or_default()
    }

    fn node_name(&self, id: ObjectId) -> &str {
        self.nodes.get(&id).map_or("", |n| n.name())
    }

    /// Distinct external scenes referenced by binding nodes.
    pub fn scene_ids(&self) -> BTreeSet<u64> {
        self.nodes
            .values()
            .filter_map(|n| n.as_binding())
            .map(|b| b.target.scene_id())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Insertion and removal
    // -----------------------------------------------------------------------

    pub(crate) fn insert_node(&mut self, node: LogicNode) {
        let id = node.id();
        self.dependencies.add_node(id);
        for dep in node.binding_dependencies() {
            self.dependencies.add_edge(dep, id);
        }
        self.nodes.insert(id, node);
    }

    pub(crate) fn insert_data_array(&mut self, array: DataArray) {
        self.data_arrays.insert(array.meta.id, array);
    }

    pub(crate) fn insert_module(&mut self, module: ScriptModule) {
        self.modules.insert(module.meta.id, module);
    }

    /// Removes a node and every link touching its leaves.
    pub(crate) fn remove_node(&mut self, id: ObjectId) -> Option<LogicNode> {
        let removed = self.links.remove_node(id);
        tracing::debug!(node = %id, links = removed.len(), "removing node");
        self.dependencies.remove_node(id);
        self.nodes.shift_remove(&id)
    }

    pub(crate) fn remove_data_array(&mut self, id: ObjectId) -> Option<DataArray> {
        self.data_arrays.shift_remove(&id)
    }

    pub(crate) fn remove_module(&mut self, id: ObjectId) -> Option<ScriptModule> {
        self.modules.shift_remove(&id)
    }

    /// Reason a node cannot be destroyed, if any.
    pub(crate) fn node_in_use(&self, id: ObjectId) -> Option<String> {
        let node = self.nodes.get(&id)?;
        let kind = node.as_binding()?.kind;
        self.nodes.values().find_map(|other| match &other.behavior {
            NodeBehavior::AnchorPoint(a) if a.node_binding == id || a.camera_binding == id => Some(format!(
                "Failed to destroy {} binding '{}', it is used in anchor point '{}'",
                kind.label(),
                node.name(),
                other.name()
            )),
            NodeBehavior::SkinBinding(s) if s.uses_binding(id) => Some(format!(
                "Failed to destroy {} binding '{}', it is used in skin binding '{}'",
                kind.label(),
                node.name(),
                other.name()
            )),
            _ => None,
        })
    }

    pub(crate) fn data_array_in_use(&self, id: ObjectId) -> Option<String> {
        let array = self.data_arrays.get(&id)?;
        self.nodes.values().find_map(|node| match &node.behavior {
            NodeBehavior::Animation(a) => a.uses_data_array(id).map(|channel| {
                format!(
                    "Failed to destroy data array '{}', it is used in animation node '{}' channel '{}'",
                    array.meta.name,
                    node.name(),
                    channel
                )
            }),
            _ => None,
        })
    }

    pub(crate) fn module_in_use(&self, id: ObjectId) -> Option<String> {
        let module = self.modules.get(&id)?;
        self.nodes.values().find_map(|node| match &node.behavior {
            NodeBehavior::Script(s) if s.uses_module(id) => Some(format!(
                "Failed to destroy script module '{}', it is used in script '{}'",
                module.meta.name,
                node.name()
            )),
            _ => None,
        })
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    /// Checks a prospective link. The strong-cycle check only runs when
    /// `check_cycle` is set.
    pub(crate) fn check_link(&self, source: LeafKey, target: LeafKey, weak: bool, check_cycle: bool) -> Result<(), LinkError> {
        let (Some(src), Some(tgt)) = (self.leaf(source), self.leaf(target)) else {
            return Err(LinkError::NotPrimitive);
        };
        if !src.is_leaf() || !tgt.is_leaf() {
            return Err(LinkError::NotPrimitive);
        }
        if src.semantics != PropertySemantics::Output || !tgt.semantics.is_input() {
            return Err(LinkError::WrongDirection {
                from: self.property_path(source),
                from_semantics: src.semantics.label(),
                to: self.property_path(target),
                to_semantics: tgt.semantics.label(),
            });
        }
        if src.ty != tgt.ty {
            return Err(LinkError::TypeMismatch {
                from: self.property_path(source),
                from_type: src.ty.to_string(),
                to: self.property_path(target),
                to_type: tgt.ty.to_string(),
            });
        }
        if source.node == target.node {
            return Err(LinkError::SameNode {
                node: self.node_name(source.node).to_owned(),
            });
        }
        if let Some(existing) = self.links.incoming(target) {
            return Err(LinkError::AlreadyLinked {
                to: self.property_path(target),
                to_node: self.node_name(target.node).to_owned(),
                from: self.property_path(existing.source),
                from_node: self.node_name(existing.source.node).to_owned(),
            });
        }
        if !weak && check_cycle && self.dependencies.would_create_cycle(source.node, target.node) {
            return Err(LinkError::WouldCreateCycle {
                from: self.property_path(source),
                from_node: self.node_name(source.node).to_owned(),
                to: self.property_path(target),
                to_node: self.node_name(target.node).to_owned(),
            });
        }
        Ok(())
    }

    /// Inserts a checked link and marks the target node dirty.
    pub(crate) fn insert_link(&mut self, link: Link) {
        self.links.insert(link);
        if !link.weak {
            self.dependencies.add_edge(link.source.node, link.target.node);
        } else {
            self.dependencies.invalidate();
        }
        if let Some(node) = self.nodes.get_mut(&link.target.node) {
            node.dirty = true;
        }
    }

    pub(crate) fn remove_link(&mut self, source: LeafKey, target: LeafKey) -> Result<Link, LinkError> {
        match self.links.incoming(target) {
            Some(link) if link.source == source => {}
            _ => {
                return Err(LinkError::NotLinked {
                    to: self.property_path(target),
                })
            }
        }
        let link = self.links.remove(target).ok_or_else(|| LinkError::NotLinked {
            to: self.property_path(target),
        })?;
        if link.weak {
            self.dependencies.invalidate();
        } else {
            self.dependencies.remove_edge(link.source.node, link.target.node);
        }
        Ok(link)
    }

    /// Whether any leaf of `node` has an incoming or outgoing link.
    pub fn is_linked(&self, node: ObjectId) -> bool {
        self.links.touches_node(node)
    }

    // -----------------------------------------------------------------------
    // Node builders
    // -----------------------------------------------------------------------

    pub(crate) fn build_script(
        &self,
        runtime: Option<&dyn ScriptRuntime>,
        source: &str,
        modules: &[(String, ObjectId)],
        name: &str,
    ) -> Result<BuiltNode, String> {
        let runtime =
            runtime.ok_or_else(|| format!("Can't create script '{name}': no script runtime configured"))?;
        let mut sources = Vec::with_capacity(modules.len());
        for (alias, id) in modules {
            let module = self
                .modules
                .get(id)
                .ok_or_else(|| format!("Script '{name}' depends on unknown module '{alias}' ({id})"))?;
            sources.push(ModuleSource {
                alias,
                name: &module.meta.name,
                source: &module.source,
            });
        }
        let instance = runtime.compile(source, &sources, name)?;
        let tree = PropertyTree::new(
            &instance.inputs(),
            Some(&instance.outputs()),
            PropertySemantics::Input,
        )?;
        Ok((
            tree,
            NodeBehavior::Script(ScriptNode {
                source: source.to_owned(),
                modules: modules.to_vec(),
                instance,
            }),
        ))
    }

    pub(crate) fn build_interface(inputs: &PropertySpec) -> Result<BuiltNode, String> {
        Ok((interface::build_tree(inputs)?, NodeBehavior::Interface))
    }

    pub(crate) fn build_binding(
        kind: BindingKind,
        target: Box<dyn BindingTarget>,
        level: FeatureLevel,
        frustum_planes: bool,
        elements: Vec<String>,
    ) -> Result<BuiltNode, String> {
        let spec = binding::input_spec(kind, level, frustum_planes, &elements, target.as_ref())?;
        let tree = binding::build_tree(&spec, target.as_ref())?;
        Ok((
            tree,
            NodeBehavior::Binding(BindingNode {
                kind,
                target,
                frustum_planes,
                elements,
            }),
        ))
    }

    pub(crate) fn build_animation(&self, name: &str, channels: Vec<ChannelDescriptor>) -> Result<BuiltNode, String> {
        let duration = animation::validate_channels(name, &channels, &self.data_arrays)?;
        let tree = animation::build_tree(&channels, &self.data_arrays)?;
        Ok((tree, NodeBehavior::Animation(AnimationNode { channels, duration })))
    }

    pub(crate) fn build_timer() -> Result<BuiltNode, String> {
        Ok((timer::build_tree()?, NodeBehavior::Timer))
    }

    pub(crate) fn build_skin(
        &self,
        name: &str,
        joints: Vec<ObjectId>,
        inverse_bind_matrices: Vec<Mat4>,
        appearance: ObjectId,
        uniform: String,
    ) -> Result<BuiltNode, String> {
        if joints.is_empty() {
            return Err(format!("Cannot create skin binding '{name}' without joints"));
        }
        if joints.len() != inverse_bind_matrices.len() {
            return Err(format!(
                "Cannot create skin binding '{name}': number of inverse bind matrices ({}) must match number of joints ({})",
                inverse_bind_matrices.len(),
                joints.len()
            ));
        }
        if let Some(j) = joints.iter().find(|j| self.binding_kind(**j) != Some(BindingKind::Node)) {
            return Err(format!("Cannot create skin binding '{name}': joint ({j}) is not a node binding"));
        }
        if self.binding_kind(appearance) != Some(BindingKind::Appearance) {
            return Err(format!(
                "Cannot create skin binding '{name}': ({appearance}) is not an appearance binding"
            ));
        }
        Ok((
            skin::build_tree()?,
            NodeBehavior::SkinBinding(SkinNode {
                joints,
                inverse_bind_matrices,
                appearance,
                uniform,
            }),
        ))
    }

    pub(crate) fn build_anchor(&self, name: &str, node_binding: ObjectId, camera_binding: ObjectId) -> Result<BuiltNode, String> {
        if self.binding_kind(node_binding) != Some(BindingKind::Node) {
            return Err(format!("Cannot create anchor point '{name}': ({node_binding}) is not a node binding"));
        }
        if self.binding_kind(camera_binding) != Some(BindingKind::Camera) {
            return Err(format!(
                "Cannot create anchor point '{name}': ({camera_binding}) is not a camera binding"
            ));
        }
        Ok((
            anchor::build_tree()?,
            NodeBehavior::AnchorPoint(AnchorNode {
                node_binding,
                camera_binding,
            }),
        ))
    }

    // -----------------------------------------------------------------------
    // Restore
    // -----------------------------------------------------------------------

    pub fn restore_module(&mut self, meta: ObjectMeta, source: String) -> Result<(), String> {
        self.check_unclaimed(&meta)?;
        self.insert_module(ScriptModule { meta, source });
        Ok(())
    }

    pub fn restore_data_array(&mut self, meta: ObjectMeta, data: DataArrayData, level: FeatureLevel) -> Result<(), String> {
        self.check_unclaimed(&meta)?;
        data.validate(&meta.name, level)?;
        self.insert_data_array(DataArray { meta, data });
        Ok(())
    }

    /// Rebuilds a node from its descriptor and persisted property values.
    /// The persisted tree must have exactly the shape the descriptor builds.
    pub fn restore_node(
        &mut self,
        meta: ObjectMeta,
        descriptor: NodeDescriptor,
        inputs: &PropertySnapshot,
        outputs: Option<&PropertySnapshot>,
        ctx: &mut RestoreContext<'_>,
    ) -> Result<(), String> {
        self.check_unclaimed(&meta)?;
        let kind = descriptor.kind();
        let name = meta.name.clone();
        if let Some(cap) = kind.required_capability() {
            if !ctx.level.supports(cap) {
                return Err(format!(
                    "Fatal error during loading of {kind} '{name}': requires feature level {} but file has feature level {}",
                    FeatureLevel::required_for(cap),
                    ctx.level
                ));
            }
        }
        let restored = PropertyTree::from_snapshots(inputs, outputs)?;
        let (fresh, behavior) = match descriptor {
            NodeDescriptor::Script { source, modules } => self.build_script(ctx.runtime, &source, &modules, &name)?,
            NodeDescriptor::Interface => Self::build_interface(&spec_of(inputs))?,
            NodeDescriptor::Binding {
                kind,
                target,
                frustum_planes,
                elements,
            } => {
                if frustum_planes && !ctx.level.supports(Capability::CameraFrustumPlanes) {
                    return Err(format!(
                        "Fatal error during loading of camera binding '{name}': frustum planes require feature level {}",
                        FeatureLevel::required_for(Capability::CameraFrustumPlanes)
                    ));
                }
                let live = ctx.resolver.resolve(kind, &target.name, target.object_id).ok_or_else(|| {
                    format!(
                        "Fatal error during loading of {} binding '{name}': could not resolve referenced object '{}' by id '{}'!",
                        kind.label(),
                        target.name,
                        target.object_id
                    )
                })?;
                Self::build_binding(kind, live, ctx.level, frustum_planes, elements)?
            }
            NodeDescriptor::Animation { channels } => self.build_animation(&name, channels)?,
            NodeDescriptor::Timer => Self::build_timer()?,
            NodeDescriptor::SkinBinding {
                joints,
                inverse_bind_matrices,
                appearance,
                uniform,
            } => self.build_skin(&name, joints, inverse_bind_matrices, appearance, uniform)?,
            NodeDescriptor::AnchorPoint {
                node_binding,
                camera_binding,
            } => self.build_anchor(&name, node_binding, camera_binding)?,
        };
        if !fresh.same_shape(&restored) {
            return Err(format!(
                "Fatal error during loading of {kind} '{name}': persisted properties do not match its interface"
            ));
        }
        self.insert_node(LogicNode::new(meta, restored, behavior));
        Ok(())
    }

    /// Ids are unique across modules, data arrays and nodes.
    fn check_unclaimed(&self, meta: &ObjectMeta) -> Result<(), String> {
        if self.contains(meta.id) {
            return Err(format!(
                "Fatal error during loading of '{}': object id {} is used by more than one object",
                meta.name, meta.id
            ));
        }
        Ok(())
    }

    /// Re-creates a persisted link. Only structural checks run; cycles
    /// surface at the next update.
    pub fn restore_link(&mut self, source: LeafKey, target: LeafKey, weak: bool) -> Result<(), String> {
        self.check_link(source, target, weak, false).map_err(|e| {
            format!(
                "Fatal error during loading from serialized data! Could not link property '{}' to property '{}': {e}",
                self.property_path(source),
                self.property_path(target)
            )
        })?;
        self.insert_link(Link { source, target, weak });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------------

    /// Pushes link values into `id`'s inputs. Weak links read from `prior`,
    /// strong links from the live source. Returns how many targets changed.
    pub(crate) fn propagate_into(
        &mut self,
        id: ObjectId,
        incoming: &[Link],
        prior: &HashMap<LeafKey, PropertyValue>,
    ) -> usize {
        let mut activated = 0;
        for link in incoming {
            let value = if link.weak {
                prior.get(&link.source).cloned()
            } else {
                self.nodes
                    .get(&link.source.node)
                    .and_then(|n| n.tree.value(link.source.index))
                    .cloned()
            };
            let (Some(value), Some(node)) = (value, self.nodes.get_mut(&id)) else {
                continue;
            };
            if node.tree.set_leaf(link.target.index, value) == Some(true) {
                activated += 1;
                node.dirty = true;
                if let Some(rec) = node.tree.get_mut(link.target.index) {
                    if rec.semantics == PropertySemantics::BindingInput {
                        rec.has_new_value = true;
                    }
                }
            }
        }
        activated
    }

    /// Runs the behavior of node `id`.
    pub(crate) fn execute(&mut self, id: ObjectId, clock: &dyn Clock) -> Result<(), String> {
        match self.nodes.get(&id).map(LogicNode::kind) {
            None => return Ok(()),
            Some(NodeKind::SkinBinding) => return self.execute_skin(id),
            Some(NodeKind::AnchorPoint) => return self.execute_anchor(id),
            Some(_) => {}
        }
        let Some(node) = self.nodes.get_mut(&id) else {
            return Ok(());
        };
        let LogicNode { tree, behavior, .. } = node;
        match behavior {
            NodeBehavior::Script(s) => s.execute(tree),
            NodeBehavior::Interface => {
                interface::execute(tree);
                Ok(())
            }
            NodeBehavior::Binding(b) => b.execute(tree),
            NodeBehavior::Animation(a) => a.execute(tree, &self.data_arrays),
            NodeBehavior::Timer => timer::execute(tree, clock),
            NodeBehavior::SkinBinding(_) | NodeBehavior::AnchorPoint(_) => Ok(()),
        }
    }

    fn execute_skin(&mut self, id: ObjectId) -> Result<(), String> {
        let Some(NodeBehavior::SkinBinding(skin)) = self.nodes.get(&id).map(|n| &n.behavior) else {
            return Ok(());
        };
        let worlds = skin
            .joints
            .iter()
            .map(|j| {
                self.binding_target(*j)
                    .and_then(|t| t.world_matrix())
                    .ok_or_else(|| format!("Joint '{}' does not provide a world matrix", self.node_name(*j)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let matrices = skin.joint_matrices(&worlds);
        let (appearance, uniform) = (skin.appearance, skin.uniform.clone());
        let target = self
            .nodes
            .get_mut(&appearance)
            .and_then(|n| match &mut n.behavior {
                NodeBehavior::Binding(b) => Some(b.target_mut()),
                _ => None,
            })
            .ok_or_else(|| format!("Appearance binding ({appearance}) of skin binding not found"))?;
        target.set_joint_matrices(&uniform, &matrices)
    }

    fn execute_anchor(&mut self, id: ObjectId) -> Result<(), String> {
        let Some(NodeBehavior::AnchorPoint(a)) = self.nodes.get(&id).map(|n| &n.behavior) else {
            return Ok(());
        };
        let (node_binding, camera_binding) = (a.node_binding, a.camera_binding);
        let world = self
            .binding_target(node_binding)
            .and_then(|t| t.world_matrix())
            .ok_or_else(|| format!("Node '{}' does not provide a world matrix", self.node_name(node_binding)))?;
        let (view_projection, viewport) = self
            .binding_target(camera_binding)
            .and_then(|t| t.view_projection())
            .ok_or_else(|| {
                format!(
                    "Camera '{}' does not provide a view projection",
                    self.node_name(camera_binding)
                )
            })?;
        let (coords, depth) = anchor::project(&world, &view_projection, viewport);
        if let Some(node) = self.nodes.get_mut(&id) {
            AnchorNode::write_outputs(&mut node.tree, coords, depth);
        }
        Ok(())
    }
}

/// Property declaration of a persisted subtree.
fn spec_of(snapshot: &PropertySnapshot) -> PropertySpec {
    PropertySpec {
        name: snapshot.name.clone(),
        ty: snapshot.ty,
        children: snapshot.children.iter().map(spec_of).collect(),
    }
}
