//! LogicEngine: the public entry point owning one logic graph.
//!
//! Every object is created through a factory method here and addressed
//! afterwards through typed handles. Handles carry the [`EngineId`] of the
//! engine that issued them; passing a handle to another engine is refused.
//!
//! Fallible calls clear the error list, return `Result<_, CoreError>` and
//! record what went wrong in [`LogicEngine::errors`]. Property reads and
//! writes are not fallible in that sense: they report failure through
//! `None`/`false` and a `tracing::error!` line.

use std::time::Instant;

use crate::collab::{BindingTarget, Clock, ScriptRuntime, SystemClock};
use crate::data_array::{DataArray, DataArrayElement};
use crate::error::{CoreError, ErrorData, ErrorKind};
use crate::feature::{Capability, FeatureLevel};
use crate::id::{
    DataArrayHandle, EngineId, ModuleHandle, NodeHandle, ObjectHandle, ObjectId, PropertyIndex, PropertyRef,
};
use crate::link::{LeafKey, Link};
use crate::math::Mat4;
use crate::nodes::{AnimationNodeConfig, BindingKind, ChannelDescriptor, LogicNode, NodeKind, ScriptConfig};
use crate::object::{ObjectMeta, ScriptModule};
use crate::objects::{ApiObjects, BuiltNode};
use crate::property::{PropertyRecord, PropertySemantics, PropertySpec};
use crate::stats::UpdateStatistics;
use crate::update::{self, UpdateReport};
use crate::validation;
use crate::value::{PropertyScalar, PropertyType, PropertyValue};

/// A link as seen through the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyLink {
    pub source: PropertyRef,
    pub target: PropertyRef,
    pub weak: bool,
}

pub struct LogicEngine {
    id: EngineId,
    level: FeatureLevel,
    objects: ApiObjects,
    errors: Vec<ErrorData>,
    script_runtime: Option<Box<dyn ScriptRuntime>>,
    clock: Box<dyn Clock>,
    dirty_tracking: bool,
    report_enabled: bool,
    last_report: UpdateReport,
    statistics: UpdateStatistics,
}

impl Default for LogicEngine {
    fn default() -> Self {
        Self::new(FeatureLevel::default())
    }
}

impl LogicEngine {
    pub fn new(level: FeatureLevel) -> Self {
        LogicEngine {
            id: EngineId::next(),
            level,
            objects: ApiObjects::new(),
            errors: Vec::new(),
            script_runtime: None,
            clock: Box::new(SystemClock),
            dirty_tracking: true,
            report_enabled: false,
            last_report: UpdateReport::default(),
            statistics: UpdateStatistics::new(),
        }
    }

    /// Builder form of [`set_script_runtime`](Self::set_script_runtime).
    pub fn with_script_runtime(mut self, runtime: impl ScriptRuntime + 'static) -> Self {
        self.set_script_runtime(runtime);
        self
    }

    pub fn set_script_runtime(&mut self, runtime: impl ScriptRuntime + 'static) {
        self.script_runtime = Some(Box::new(runtime));
    }

    pub fn script_runtime(&self) -> Option<&dyn ScriptRuntime> {
        self.script_runtime.as_deref()
    }

    /// Replaces the time source used by timer nodes.
    pub fn set_clock(&mut self, clock: impl Clock + 'static) {
        self.clock = Box::new(clock);
    }

    pub fn feature_level(&self) -> FeatureLevel {
        self.level
    }

    // -----------------------------------------------------------------------
    // Errors
    // -----------------------------------------------------------------------

    /// Everything recorded by the last fallible call.
    pub fn errors(&self) -> &[ErrorData] {
        &self.errors
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Appends an entry to the error list. Used by the storage layer, which
    /// reports load and save failures through the engine.
    pub fn record_error(&mut self, data: ErrorData) {
        self.errors.push(data);
    }

    fn record<T>(&mut self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        if let Err(err) = &result {
            let object = match err {
                CoreError::Runtime { node, .. } => Some(*node),
                _ => None,
            };
            tracing::error!(kind = ?err.kind(), "{err}");
            self.errors.push(ErrorData::error(err.kind(), err.to_string(), object));
        }
        result
    }

    fn require(&self, cap: Capability) -> Result<(), CoreError> {
        if self.level.supports(cap) {
            Ok(())
        } else {
            Err(CoreError::FeatureLevel {
                what: cap.label(),
                required: FeatureLevel::required_for(cap),
                actual: self.level,
            })
        }
    }

    // -----------------------------------------------------------------------
    // Handle checks
    // -----------------------------------------------------------------------

    fn owns(&self, handle: ObjectHandle) -> Result<ObjectId, CoreError> {
        if handle.engine() != self.id {
            return Err(CoreError::ForeignObject {
                kind: handle.kind_name(),
                name: handle.id().to_string(),
            });
        }
        if !self.objects.contains(handle.id()) {
            return Err(CoreError::NotFound { id: handle.id() });
        }
        Ok(handle.id())
    }

    fn owns_property(&self, prop: PropertyRef) -> Result<LeafKey, CoreError> {
        if prop.engine != self.id {
            return Err(CoreError::ForeignObject {
                kind: "Property",
                name: format!("{}:{}", prop.node, prop.index.0),
            });
        }
        let key = LeafKey::new(prop.node, prop.index);
        if self.objects.leaf(key).is_none() {
            return Err(CoreError::NotFound { id: prop.node });
        }
        Ok(key)
    }

    fn node_handle(&self, id: ObjectId) -> NodeHandle {
        NodeHandle { engine: self.id, id }
    }

    fn property_ref(&self, node: ObjectId, index: PropertyIndex) -> PropertyRef {
        PropertyRef {
            engine: self.id,
            node,
            index,
        }
    }

    fn add_node(&mut self, name: &str, built: BuiltNode) -> NodeHandle {
        let (tree, behavior) = built;
        let node = LogicNode::new(ObjectMeta::new(name), tree, behavior);
        let id = node.id();
        tracing::debug!(node = %id, name, kind = %node.kind(), "created node");
        self.objects.insert_node(node);
        self.node_handle(id)
    }

    // -----------------------------------------------------------------------
    // Factories
    // -----------------------------------------------------------------------

    pub fn create_script_module(&mut self, source: &str, name: &str) -> Result<ModuleHandle, CoreError> {
        self.errors.clear();
        let result = if source.trim().is_empty() {
            Err(CoreError::Construction {
                reason: format!("Cannot create script module '{name}' from empty source"),
            })
        } else {
            let meta = ObjectMeta::new(name);
            let id = meta.id;
            self.objects.insert_module(ScriptModule {
                meta,
                source: source.to_owned(),
            });
            Ok(ModuleHandle { engine: self.id, id })
        };
        self.record(result)
    }

    pub fn create_script(&mut self, source: &str, config: &ScriptConfig, name: &str) -> Result<NodeHandle, CoreError> {
        self.errors.clear();
        let result = self.try_create_script(source, config, name);
        self.record(result)
    }

    fn try_create_script(&mut self, source: &str, config: &ScriptConfig, name: &str) -> Result<NodeHandle, CoreError> {
        let modules = config
            .modules
            .iter()
            .map(|(alias, handle)| Ok((alias.clone(), self.owns((*handle).into())?)))
            .collect::<Result<Vec<_>, CoreError>>()?;
        let built = self
            .objects
            .build_script(self.script_runtime.as_deref(), source, &modules, name)
            .map_err(|reason| CoreError::Construction { reason })?;
        Ok(self.add_node(name, built))
    }

    /// Interface node whose outputs mirror `inputs`.
    pub fn create_interface(&mut self, inputs: &PropertySpec, name: &str) -> Result<NodeHandle, CoreError> {
        self.errors.clear();
        let result = ApiObjects::build_interface(inputs)
            .map_err(|reason| CoreError::Construction { reason })
            .map(|built| self.add_node(name, built));
        self.record(result)
    }

    /// Binding of `kind` forwarding to `target`. Render group bindings need
    /// their element names, see
    /// [`create_render_group_binding`](Self::create_render_group_binding).
    pub fn create_binding(
        &mut self,
        kind: BindingKind,
        target: impl BindingTarget + 'static,
        name: &str,
    ) -> Result<NodeHandle, CoreError> {
        self.errors.clear();
        let result = self.try_create_binding(kind, Box::new(target), false, Vec::new(), name);
        self.record(result)
    }

    /// Camera binding exposing explicit frustum planes instead of
    /// field-of-view and aspect ratio.
    pub fn create_camera_binding_with_frustum_planes(
        &mut self,
        target: impl BindingTarget + 'static,
        name: &str,
    ) -> Result<NodeHandle, CoreError> {
        self.errors.clear();
        let result = self
            .require(Capability::CameraFrustumPlanes)
            .and_then(|_| self.try_create_binding(BindingKind::Camera, Box::new(target), true, Vec::new(), name));
        self.record(result)
    }

    pub fn create_render_group_binding(
        &mut self,
        target: impl BindingTarget + 'static,
        elements: &[&str],
        name: &str,
    ) -> Result<NodeHandle, CoreError> {
        self.errors.clear();
        let elements = elements.iter().map(|e| (*e).to_owned()).collect();
        let result = self.try_create_binding(BindingKind::RenderGroup, Box::new(target), false, elements, name);
        self.record(result)
    }

    fn try_create_binding(
        &mut self,
        kind: BindingKind,
        target: Box<dyn BindingTarget>,
        frustum_planes: bool,
        elements: Vec<String>,
        name: &str,
    ) -> Result<NodeHandle, CoreError> {
        if let Some(cap) = NodeKind::Binding(kind).required_capability() {
            self.require(cap)?;
        }
        let built = ApiObjects::build_binding(kind, target, self.level, frustum_planes, elements)
            .map_err(|reason| CoreError::Construction { reason })?;
        Ok(self.add_node(name, built))
    }

    pub fn create_data_array<T: DataArrayElement>(&mut self, data: Vec<T>, name: &str) -> Result<DataArrayHandle, CoreError> {
        self.errors.clear();
        let data = T::into_data(data);
        let result = data
            .validate(name, self.level)
            .map_err(|reason| CoreError::Construction { reason })
            .map(|_| {
                let meta = ObjectMeta::new(name);
                let id = meta.id;
                self.objects.insert_data_array(DataArray { meta, data });
                DataArrayHandle { engine: self.id, id }
            });
        self.record(result)
    }

    pub fn create_animation_node(&mut self, config: &AnimationNodeConfig, name: &str) -> Result<NodeHandle, CoreError> {
        self.errors.clear();
        let result = self.try_create_animation(config, name);
        self.record(result)
    }

    fn try_create_animation(&mut self, config: &AnimationNodeConfig, name: &str) -> Result<NodeHandle, CoreError> {
        for channel in config.channels() {
            let handles = [Some(channel.timestamps), Some(channel.keyframes), channel.tangents_in, channel.tangents_out];
            for handle in handles.into_iter().flatten() {
                self.owns(handle.into())?;
            }
        }
        let channels: Vec<ChannelDescriptor> = config.channels().iter().map(ChannelDescriptor::from).collect();
        let built = self
            .objects
            .build_animation(name, channels)
            .map_err(|reason| CoreError::Construction { reason })?;
        Ok(self.add_node(name, built))
    }

    pub fn create_timer_node(&mut self, name: &str) -> Result<NodeHandle, CoreError> {
        self.errors.clear();
        let result = ApiObjects::build_timer()
            .map_err(|reason| CoreError::Construction { reason })
            .map(|built| self.add_node(name, built));
        self.record(result)
    }

    /// Skin binding feeding `world(joint_i) * inverse_bind_matrices[i]` into
    /// `uniform` of the appearance bound by `appearance`.
    pub fn create_skin_binding(
        &mut self,
        joints: &[NodeHandle],
        inverse_bind_matrices: &[Mat4],
        appearance: NodeHandle,
        uniform: &str,
        name: &str,
    ) -> Result<NodeHandle, CoreError> {
        self.errors.clear();
        let result = self.try_create_skin(joints, inverse_bind_matrices, appearance, uniform, name);
        self.record(result)
    }

    fn try_create_skin(
        &mut self,
        joints: &[NodeHandle],
        inverse_bind_matrices: &[Mat4],
        appearance: NodeHandle,
        uniform: &str,
        name: &str,
    ) -> Result<NodeHandle, CoreError> {
        self.require(Capability::SkinBinding)?;
        let joints = joints
            .iter()
            .map(|j| self.owns((*j).into()))
            .collect::<Result<Vec<_>, _>>()?;
        let appearance = self.owns(appearance.into())?;
        let built = self
            .objects
            .build_skin(name, joints, inverse_bind_matrices.to_vec(), appearance, uniform.to_owned())
            .map_err(|reason| CoreError::Construction { reason })?;
        Ok(self.add_node(name, built))
    }

    pub fn create_anchor_point(
        &mut self,
        node_binding: NodeHandle,
        camera_binding: NodeHandle,
        name: &str,
    ) -> Result<NodeHandle, CoreError> {
        self.errors.clear();
        let result = self.try_create_anchor(node_binding, camera_binding, name);
        self.record(result)
    }

    fn try_create_anchor(
        &mut self,
        node_binding: NodeHandle,
        camera_binding: NodeHandle,
        name: &str,
    ) -> Result<NodeHandle, CoreError> {
        self.require(Capability::AnchorPoint)?;
        let node_binding = self.owns(node_binding.into())?;
        let camera_binding = self.owns(camera_binding.into())?;
        let built = self
            .objects
            .build_anchor(name, node_binding, camera_binding)
            .map_err(|reason| CoreError::Construction { reason })?;
        Ok(self.add_node(name, built))
    }

    /// Destroys an object. Destroying a node removes every link touching it.
    /// Objects still referenced by other objects are refused.
    pub fn destroy(&mut self, handle: impl Into<ObjectHandle>) -> Result<(), CoreError> {
        self.errors.clear();
        let result = self.try_destroy(handle.into());
        self.record(result)
    }

    fn try_destroy(&mut self, handle: ObjectHandle) -> Result<(), CoreError> {
        let id = self.owns(handle)?;
        let in_use = match handle {
            ObjectHandle::Node(_) => self.objects.node_in_use(id),
            ObjectHandle::DataArray(_) => self.objects.data_array_in_use(id),
            ObjectHandle::Module(_) => self.objects.module_in_use(id),
        };
        if let Some(reason) = in_use {
            return Err(CoreError::InUse { reason });
        }
        let removed = match handle {
            ObjectHandle::Node(_) => self.objects.remove_node(id).is_some(),
            ObjectHandle::DataArray(_) => self.objects.remove_data_array(id).is_some(),
            ObjectHandle::Module(_) => self.objects.remove_module(id).is_some(),
        };
        if removed {
            Ok(())
        } else {
            Err(CoreError::NotFound { id })
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn objects(&self) -> &ApiObjects {
        &self.objects
    }

    /// Swaps in a fully built object store and returns the previous one.
    pub fn replace_objects(&mut self, objects: ApiObjects) -> ApiObjects {
        std::mem::replace(&mut self.objects, objects)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.objects.nodes().map(|n| self.node_handle(n.id()))
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&LogicNode> {
        (handle.engine == self.id).then(|| self.objects.node(handle.id))?
    }

    pub fn data_array(&self, handle: DataArrayHandle) -> Option<&DataArray> {
        (handle.engine == self.id).then(|| self.objects.data_array(handle.id))?
    }

    pub fn module(&self, handle: ModuleHandle) -> Option<&ScriptModule> {
        (handle.engine == self.id).then(|| self.objects.module(handle.id))?
    }

    pub fn find_node(&self, name: &str) -> Option<NodeHandle> {
        self.objects
            .nodes()
            .find(|n| n.name() == name)
            .map(|n| self.node_handle(n.id()))
    }

    pub fn find_data_array(&self, name: &str) -> Option<DataArrayHandle> {
        self.objects
            .data_arrays()
            .find(|a| a.meta.name == name)
            .map(|a| DataArrayHandle {
                engine: self.id,
                id: a.meta.id,
            })
    }

    pub fn find_module(&self, name: &str) -> Option<ModuleHandle> {
        self.objects
            .modules()
            .find(|m| m.meta.name == name)
            .map(|m| ModuleHandle {
                engine: self.id,
                id: m.meta.id,
            })
    }

    pub fn find_by_id(&self, id: ObjectId) -> Option<ObjectHandle> {
        if self.objects.node(id).is_some() {
            Some(ObjectHandle::Node(self.node_handle(id)))
        } else if self.objects.data_array(id).is_some() {
            Some(ObjectHandle::DataArray(DataArrayHandle { engine: self.id, id }))
        } else if self.objects.module(id).is_some() {
            Some(ObjectHandle::Module(ModuleHandle { engine: self.id, id }))
        } else {
            None
        }
    }

    fn meta(&self, handle: ObjectHandle) -> Option<&ObjectMeta> {
        if handle.engine() != self.id {
            return None;
        }
        let id = handle.id();
        match handle {
            ObjectHandle::Node(_) => self.objects.node(id).map(|n| &n.meta),
            ObjectHandle::DataArray(_) => self.objects.data_array(id).map(|a| &a.meta),
            ObjectHandle::Module(_) => self.objects.module(id).map(|m| &m.meta),
        }
    }

    fn meta_mut(&mut self, handle: ObjectHandle) -> Result<&mut ObjectMeta, CoreError> {
        let id = self.owns(handle)?;
        let meta = match handle {
            ObjectHandle::Node(_) => self.objects.node_mut(id).map(|n| &mut n.meta),
            ObjectHandle::DataArray(_) => self.objects.data_array_mut(id).map(|a| &mut a.meta),
            ObjectHandle::Module(_) => self.objects.module_mut(id).map(|m| &mut m.meta),
        };
        meta.ok_or(CoreError::NotFound { id })
    }

    pub fn name(&self, handle: impl Into<ObjectHandle>) -> Option<&str> {
        self.meta(handle.into()).map(|m| m.name.as_str())
    }

    pub fn set_name(&mut self, handle: impl Into<ObjectHandle>, name: &str) -> Result<(), CoreError> {
        self.errors.clear();
        let result = self.meta_mut(handle.into()).map(|m| m.name = name.to_owned());
        self.record(result)
    }

    pub fn user_id(&self, handle: impl Into<ObjectHandle>) -> Option<(u64, u64)> {
        self.meta(handle.into())?.user_id
    }

    pub fn set_user_id(&mut self, handle: impl Into<ObjectHandle>, high: u64, low: u64) -> Result<(), CoreError> {
        self.errors.clear();
        let result = self.meta_mut(handle.into()).map(|m| m.user_id = Some((high, low)));
        self.record(result)
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    pub fn inputs(&self, node: NodeHandle) -> Option<PropertyRef> {
        let n = self.node(node)?;
        Some(self.property_ref(n.id(), n.tree.inputs()))
    }

    pub fn outputs(&self, node: NodeHandle) -> Option<PropertyRef> {
        let n = self.node(node)?;
        Some(self.property_ref(n.id(), n.tree.outputs()?))
    }

    /// Input property at a dotted path such as `viewport.width`.
    pub fn input(&self, node: NodeHandle, path: &str) -> Option<PropertyRef> {
        let n = self.node(node)?;
        let idx = n.tree.resolve_path(n.tree.inputs(), path)?;
        Some(self.property_ref(n.id(), idx))
    }

    pub fn output(&self, node: NodeHandle, path: &str) -> Option<PropertyRef> {
        let n = self.node(node)?;
        let idx = n.tree.resolve_path(n.tree.outputs()?, path)?;
        Some(self.property_ref(n.id(), idx))
    }

    fn property_record(&self, prop: PropertyRef) -> Option<&PropertyRecord> {
        if prop.engine != self.id {
            return None;
        }
        self.objects.leaf(LeafKey::new(prop.node, prop.index))
    }

    pub fn child(&self, prop: PropertyRef, name: &str) -> Option<PropertyRef> {
        self.property_record(prop)?;
        let idx = self.objects.node(prop.node)?.tree.child_by_name(prop.index, name)?;
        Some(self.property_ref(prop.node, idx))
    }

    pub fn child_at(&self, prop: PropertyRef, index: usize) -> Option<PropertyRef> {
        let idx = *self.property_record(prop)?.children.get(index)?;
        Some(self.property_ref(prop.node, idx))
    }

    pub fn child_count(&self, prop: PropertyRef) -> usize {
        self.property_record(prop).map_or(0, |r| r.children.len())
    }

    pub fn property_name(&self, prop: PropertyRef) -> Option<&str> {
        self.property_record(prop).map(|r| r.name.as_str())
    }

    pub fn property_type(&self, prop: PropertyRef) -> Option<PropertyType> {
        self.property_record(prop).map(|r| r.ty)
    }

    pub fn semantics(&self, prop: PropertyRef) -> Option<PropertySemantics> {
        self.property_record(prop).map(|r| r.semantics)
    }

    pub fn owning_node(&self, prop: PropertyRef) -> Option<NodeHandle> {
        self.property_record(prop)?;
        Some(self.node_handle(prop.node))
    }

    /// Whether the property is the target of a link. `false` for properties
    /// of other engines.
    pub fn has_incoming_link(&self, prop: PropertyRef) -> bool {
        prop.engine == self.id
            && self
                .objects
                .links()
                .incoming(LeafKey::new(prop.node, prop.index))
                .is_some()
    }

    /// Whether the property is the source of at least one link. `false` for
    /// properties of other engines.
    pub fn has_outgoing_link(&self, prop: PropertyRef) -> bool {
        prop.engine == self.id && self.objects.links().has_outgoing(LeafKey::new(prop.node, prop.index))
    }

    /// Typed read of a leaf value. Returns `None` for containers and on a type
    /// mismatch.
    pub fn get<T: PropertyScalar>(&self, prop: PropertyRef) -> Option<T> {
        let Some(record) = self.property_record(prop) else {
            tracing::error!(node = %prop.node, "property not found");
            return None;
        };
        let value = record.value.as_ref().and_then(T::from_value);
        if value.is_none() {
            tracing::error!(
                "Invalid type when accessing property '{}', correct type is '{}'",
                record.name,
                record.ty
            );
        }
        value
    }

    /// Typed write of an input leaf. Marks the owning node dirty even when
    /// the value is unchanged.
    pub fn set<T: PropertyScalar>(&mut self, prop: PropertyRef, value: T) -> bool {
        match self.try_set(prop, value.into_value()) {
            Ok(()) => true,
            Err(message) => {
                tracing::error!("{message}");
                false
            }
        }
    }

    fn try_set(&mut self, prop: PropertyRef, value: PropertyValue) -> Result<(), String> {
        if prop.engine != self.id {
            return Err("Property is not an instance of this LogicEngine".to_owned());
        }
        let linked = self.has_incoming_link(prop);
        let node = self
            .objects
            .node_mut(prop.node)
            .ok_or_else(|| format!("Property of unknown node ({}) can't be set", prop.node))?;
        let path = node.tree.path_of(prop.index);
        let record = node
            .tree
            .get(prop.index)
            .ok_or_else(|| format!("Property '{path}' not found"))?;
        if record.semantics == PropertySemantics::Output {
            return Err(format!("Cannot set property '{path}' which is an output."));
        }
        if !record.is_leaf() {
            return Err(format!(
                "Property '{path}' is not a primitive type, can't set its value directly!"
            ));
        }
        if record.ty != value.property_type() {
            return Err(format!(
                "Invalid type when setting property '{path}', correct type is '{}'",
                record.ty
            ));
        }
        if linked {
            return Err(format!(
                "Property '{path}' is linked. Unlink it first before setting its value!"
            ));
        }
        let binding_input = record.semantics == PropertySemantics::BindingInput;
        node.tree.set_leaf(prop.index, value);
        if binding_input {
            if let Some(rec) = node.tree.get_mut(prop.index) {
                rec.has_new_value = true;
            }
        }
        node.dirty = true;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    /// Strong link from an output leaf to an input leaf.
    pub fn link(&mut self, source: PropertyRef, target: PropertyRef) -> Result<(), CoreError> {
        self.errors.clear();
        let result = self.try_link(source, target, false);
        self.record(result)
    }

    /// Weak link: exempt from the cycle check, propagated with one update of
    /// latency.
    pub fn link_weak(&mut self, source: PropertyRef, target: PropertyRef) -> Result<(), CoreError> {
        self.errors.clear();
        let result = self.try_link(source, target, true);
        self.record(result)
    }

    fn try_link(&mut self, source: PropertyRef, target: PropertyRef, weak: bool) -> Result<(), CoreError> {
        let source = self.owns_property(source)?;
        let target = self.owns_property(target)?;
        self.objects.check_link(source, target, weak, true)?;
        self.objects.insert_link(Link { source, target, weak });
        Ok(())
    }

    pub fn unlink(&mut self, source: PropertyRef, target: PropertyRef) -> Result<(), CoreError> {
        self.errors.clear();
        let result = self
            .owns_property(source)
            .and_then(|s| Ok((s, self.owns_property(target)?)))
            .and_then(|(s, t)| Ok(self.objects.remove_link(s, t)?))
            .map(|_| ());
        self.record(result)
    }

    /// Whether any leaf of `node` has an incoming or outgoing link.
    pub fn is_linked(&self, node: NodeHandle) -> bool {
        node.engine == self.id && self.objects.is_linked(node.id)
    }

    /// All links in creation order.
    pub fn links(&self) -> Vec<PropertyLink> {
        self.property_links().collect()
    }

    pub fn property_links(&self) -> impl Iterator<Item = PropertyLink> + '_ {
        self.objects.links().iter().map(|l| PropertyLink {
            source: self.property_ref(l.source.node, l.source.index),
            target: self.property_ref(l.target.node, l.target.index),
            weak: l.weak,
        })
    }

    // -----------------------------------------------------------------------
    // Update and validation
    // -----------------------------------------------------------------------

    /// Runs one evaluation pass over the graph.
    pub fn update(&mut self) -> Result<(), CoreError> {
        self.errors.clear();
        let mut report = UpdateReport::default();
        let result = update::run(&mut self.objects, self.clock.as_ref(), self.dirty_tracking, &mut report);
        if result.is_ok() {
            if let Some(summary) = self
                .statistics
                .collect(&report, self.objects.node_count(), Instant::now())
            {
                summary.log(&self.objects);
            }
        }
        if self.report_enabled {
            self.last_report = report;
        }
        self.record(result)
    }

    /// Executes every node on every update from now on.
    pub fn disable_dirty_tracking(&mut self) {
        self.dirty_tracking = false;
    }

    pub fn enable_update_report(&mut self, enabled: bool) {
        self.report_enabled = enabled;
        if !enabled {
            self.last_report = UpdateReport::default();
        }
    }

    /// Logs update statistics every `rate` updates; 0 turns them off.
    pub fn set_statistics_logging_rate(&mut self, rate: usize) {
        self.statistics.set_logging_rate(rate);
    }

    pub fn update_statistics(&self) -> &UpdateStatistics {
        &self.statistics
    }

    /// Report of the last update; empty unless reporting is enabled.
    pub fn last_update_report(&self) -> &UpdateReport {
        &self.last_report
    }

    /// Content warnings. Empty for a fully linked, up-to-date graph.
    pub fn validate(&self) -> Vec<ErrorData> {
        validation::validate(&self.objects)
    }

    /// Checks the graph can be ordered, as required before persisting it.
    pub fn check_schedulable(&mut self, operation: &'static str) -> Result<(), CoreError> {
        let result = self
            .objects
            .dependencies_mut()
            .order()
            .map(|_| ())
            .map_err(|_| CoreError::Scheduling { operation });
        if let Err(err) = &result {
            self.errors
                .push(ErrorData::error(ErrorKind::Scheduling, err.to_string(), None));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeScriptRuntime;

    fn runtime() -> NativeScriptRuntime {
        let mut rt = NativeScriptRuntime::new();
        rt.register(
            "double",
            PropertySpec::structure("", vec![PropertySpec::leaf("x", PropertyType::Int32)]),
            PropertySpec::structure("", vec![PropertySpec::leaf("y", PropertyType::Int32)]),
            |io| {
                let x = io.get_input::<i32>("x").unwrap_or_default();
                io.set_output("y", x * 2)
            },
        );
        rt
    }

    #[test]
    fn set_refuses_outputs_and_wrong_types() {
        let mut engine = LogicEngine::new(FeatureLevel::Level01).with_script_runtime(runtime());
        let s = engine.create_script("double", &ScriptConfig::default(), "s").unwrap();
        let x = engine.input(s, "x").unwrap();
        let y = engine.output(s, "y").unwrap();

        assert!(!engine.set(y, 1i32));
        assert!(!engine.set(x, 1.0f32));
        assert!(engine.set(x, 4i32));
        assert_eq!(engine.get::<i32>(x), Some(4));
        assert_eq!(engine.get::<f32>(x), None);
    }

    #[test]
    fn handles_from_another_engine_are_refused() {
        let mut a = LogicEngine::new(FeatureLevel::Level01);
        let mut b = LogicEngine::new(FeatureLevel::Level01);
        let t = a.create_timer_node("t").unwrap();

        let err = b.destroy(t).unwrap_err();
        assert!(matches!(err, CoreError::ForeignObject { kind: "LogicNode", .. }));
        assert_eq!(b.errors().len(), 1);
        assert!(b.errors()[0].message.ends_with("is not an instance of this LogicEngine"));
        assert!(b.node(t).is_none());
    }

    #[test]
    fn gated_factories_report_feature_level() {
        let mut engine = LogicEngine::new(FeatureLevel::Level01);
        let err = engine.create_timer_node("t").and_then(|t| engine.create_anchor_point(t, t, "a"));
        assert_eq!(
            err.unwrap_err(),
            CoreError::FeatureLevel {
                what: "AnchorPoint",
                required: FeatureLevel::Level02,
                actual: FeatureLevel::Level01,
            }
        );
    }

    #[test]
    fn names_and_user_ids() {
        let mut engine = LogicEngine::new(FeatureLevel::Level01);
        let t = engine.create_timer_node("before").unwrap();
        engine.set_name(t, "after").unwrap();
        engine.set_user_id(t, 1, 2).unwrap();
        assert_eq!(engine.name(t), Some("after"));
        assert_eq!(engine.user_id(t), Some((1, 2)));
        assert_eq!(engine.find_node("after"), Some(t));
        assert_eq!(engine.find_by_id(t.id()), Some(ObjectHandle::Node(t)));
    }

    #[test]
    fn data_array_in_use_cannot_be_destroyed() {
        let mut engine = LogicEngine::new(FeatureLevel::Level01);
        let ts = engine.create_data_array(vec![0.0f32, 1.0], "ts").unwrap();
        let kf = engine.create_data_array(vec![0.0f32, 10.0], "kf").unwrap();
        let mut config = AnimationNodeConfig::new();
        config.add_channel(crate::nodes::AnimationChannel::new(
            "x",
            ts,
            kf,
            crate::nodes::Interpolation::Linear,
        ));
        let anim = engine.create_animation_node(&config, "anim").unwrap();

        let err = engine.destroy(kf).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to destroy data array 'kf', it is used in animation node 'anim' channel 'x'"
        );
        engine.destroy(anim).unwrap();
        engine.destroy(kf).unwrap();
        assert!(engine.find_data_array("kf").is_none());
    }
}
