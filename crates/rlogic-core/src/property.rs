//! Per-node property arena.
//!
//! Every logic node owns one [`PropertyTree`]: a flat `Vec` of
//! [`PropertyRecord`]s laid out in pre-order, inputs root first, then the
//! optional outputs root. Parent and child links are arena indices, so the
//! containment tree is acyclic by construction and a property can never move
//! to another node.
//!
//! Trees are built from [`PropertySpec`] declarations and can be snapshotted to
//! and restored from the serde-friendly nested [`PropertySnapshot`] form.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::PropertyIndex;
use crate::value::{PropertyScalar, PropertyType, PropertyValue};

/// Role of a property inside its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertySemantics {
    Input,
    Output,
    /// Input of a binding node; forwarded to the bound external object.
    BindingInput,
}

impl PropertySemantics {
    pub fn is_input(self) -> bool {
        !matches!(self, PropertySemantics::Output)
    }

    pub fn label(self) -> &'static str {
        if self.is_input() {
            "input"
        } else {
            "output"
        }
    }
}

/// Declarative shape of a property subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub name: String,
    pub ty: PropertyType,
    pub children: Vec<PropertySpec>,
}

impl PropertySpec {
    pub fn leaf(name: impl Into<String>, ty: PropertyType) -> Self {
        PropertySpec {
            name: name.into(),
            ty,
            children: Vec::new(),
        }
    }

    pub fn structure(name: impl Into<String>, children: Vec<PropertySpec>) -> Self {
        PropertySpec {
            name: name.into(),
            ty: PropertyType::Struct,
            children,
        }
    }

    /// Array of `len` elements shaped like `element`. Element names are
    /// dropped; array children are addressed by index.
    pub fn array(name: impl Into<String>, element: PropertySpec, len: usize) -> Self {
        let element = PropertySpec {
            name: String::new(),
            ..element
        };
        PropertySpec {
            name: name.into(),
            ty: PropertyType::Array,
            children: vec![element; len],
        }
    }

    /// Checks the declaration is well formed.
    pub fn validate(&self) -> Result<(), String> {
        match self.ty {
            PropertyType::Struct => {
                let mut seen = std::collections::HashSet::new();
                for child in &self.children {
                    if child.name.is_empty() {
                        return Err(format!(
                            "Struct property '{}' has a child without a name",
                            self.name
                        ));
                    }
                    if !seen.insert(child.name.as_str()) {
                        return Err(format!(
                            "Struct property '{}' declares field '{}' more than once",
                            self.name, child.name
                        ));
                    }
                    child.validate()?;
                }
                Ok(())
            }
            PropertyType::Array => {
                if self.children.is_empty() {
                    return Err(format!("Array property '{}' must have at least one element", self.name));
                }
                let first = &self.children[0];
                for child in &self.children {
                    if !child.same_shape(first) {
                        return Err(format!(
                            "Array property '{}' has elements of different types",
                            self.name
                        ));
                    }
                    child.validate()?;
                }
                Ok(())
            }
            _ if !self.children.is_empty() => Err(format!(
                "Primitive property '{}' can't have children",
                self.name
            )),
            _ => Ok(()),
        }
    }

    fn same_shape(&self, other: &PropertySpec) -> bool {
        self.ty == other.ty
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.name == b.name && a.same_shape(b))
    }
}

/// One property in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRecord {
    pub name: String,
    pub ty: PropertyType,
    pub semantics: PropertySemantics,
    pub parent: Option<PropertyIndex>,
    pub children: SmallVec<[PropertyIndex; 4]>,
    /// Present exactly for primitive types.
    pub value: Option<PropertyValue>,
    /// Binding inputs only: set when the value changed since the last apply.
    pub has_new_value: bool,
}

impl PropertyRecord {
    pub fn is_leaf(&self) -> bool {
        self.ty.is_primitive()
    }
}

/// Nested persisted form of a property subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySnapshot {
    pub name: String,
    pub ty: PropertyType,
    pub semantics: PropertySemantics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<PropertyValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PropertySnapshot>,
}

/// Property arena of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyTree {
    records: Vec<PropertyRecord>,
    outputs: Option<PropertyIndex>,
}

pub const INPUTS_ROOT: &str = "IN";
pub const OUTPUTS_ROOT: &str = "OUT";

impl PropertyTree {
    /// Builds a tree from input and output declarations. The root specs'
    /// names are replaced by the canonical root names.
    pub fn new(
        inputs: &PropertySpec,
        outputs: Option<&PropertySpec>,
        input_semantics: PropertySemantics,
    ) -> Result<Self, String> {
        let roots = std::iter::once(inputs).chain(outputs);
        for root in roots {
            if root.ty != PropertyType::Struct {
                return Err(format!("Root property must be a struct, found {}", root.ty));
            }
        }
        inputs.validate()?;
        let mut tree = PropertyTree {
            records: Vec::new(),
            outputs: None,
        };
        tree.push_spec(inputs, INPUTS_ROOT, None, input_semantics);
        if let Some(outputs) = outputs {
            outputs.validate()?;
            let idx = tree.push_spec(outputs, OUTPUTS_ROOT, None, PropertySemantics::Output);
            tree.outputs = Some(idx);
        }
        Ok(tree)
    }

    fn push_spec(
        &mut self,
        spec: &PropertySpec,
        name: &str,
        parent: Option<PropertyIndex>,
        semantics: PropertySemantics,
    ) -> PropertyIndex {
        let idx = PropertyIndex(self.records.len() as u32);
        self.records.push(PropertyRecord {
            name: name.to_owned(),
            ty: spec.ty,
            semantics,
            parent,
            children: SmallVec::new(),
            value: spec.ty.default_value(),
            has_new_value: false,
        });
        for child in &spec.children {
            let child_idx = self.push_spec(child, &child.name, Some(idx), semantics);
            self.records[idx.as_usize()].children.push(child_idx);
        }
        idx
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    pub fn inputs(&self) -> PropertyIndex {
        PropertyIndex(0)
    }

    pub fn outputs(&self) -> Option<PropertyIndex> {
        self.outputs
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, idx: PropertyIndex) -> Option<&PropertyRecord> {
        self.records.get(idx.as_usize())
    }

    pub(crate) fn get_mut(&mut self, idx: PropertyIndex) -> Option<&mut PropertyRecord> {
        self.records.get_mut(idx.as_usize())
    }

    pub fn child_by_name(&self, parent: PropertyIndex, name: &str) -> Option<PropertyIndex> {
        let rec = self.get(parent)?;
        if rec.ty != PropertyType::Struct {
            return None;
        }
        rec.children
            .iter()
            .copied()
            .find(|c| self.records[c.as_usize()].name == name)
    }

    pub fn child_at(&self, parent: PropertyIndex, index: usize) -> Option<PropertyIndex> {
        self.get(parent)?.children.get(index).copied()
    }

    pub fn child_count(&self, parent: PropertyIndex) -> usize {
        self.get(parent).map_or(0, |r| r.children.len())
    }

    /// Resolves a dotted path below `root`. Numeric segments index into
    /// arrays, other segments name struct fields. An empty path is `root`.
    pub fn resolve_path(&self, root: PropertyIndex, path: &str) -> Option<PropertyIndex> {
        if path.is_empty() {
            return Some(root);
        }
        let mut current = root;
        for segment in path.split('.') {
            let rec = self.get(current)?;
            current = match rec.ty {
                PropertyType::Array => self.child_at(current, segment.parse().ok()?)?,
                PropertyType::Struct => self.child_by_name(current, segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Dotted path of `idx` relative to its root, the inverse of
    /// [`resolve_path`](Self::resolve_path).
    pub fn path_of(&self, idx: PropertyIndex) -> String {
        let mut segments = Vec::new();
        let mut current = idx;
        while let Some(parent) = self.get(current).and_then(|r| r.parent) {
            let parent_rec = &self.records[parent.as_usize()];
            if parent_rec.ty == PropertyType::Array {
                let pos = parent_rec
                    .children
                    .iter()
                    .position(|c| *c == current)
                    .unwrap_or_default();
                segments.push(pos.to_string());
            } else {
                segments.push(self.records[current.as_usize()].name.clone());
            }
            current = parent;
        }
        segments.reverse();
        segments.join(".")
    }

    /// Display name of a property: its path prefixed by the root name.
    pub fn display_name(&self, idx: PropertyIndex) -> String {
        let path = self.path_of(idx);
        let mut root = idx;
        while let Some(parent) = self.get(root).and_then(|r| r.parent) {
            root = parent;
        }
        let root_name = self.get(root).map_or("", |r| r.name.as_str());
        if path.is_empty() {
            root_name.to_owned()
        } else {
            format!("{root_name}.{path}")
        }
    }

    /// Leaves of the subtree under `root`, in pre-order.
    pub fn leaves(&self, root: PropertyIndex) -> Vec<PropertyIndex> {
        let mut out = Vec::new();
        self.collect_leaves(root, &mut out);
        out
    }

    fn collect_leaves(&self, idx: PropertyIndex, out: &mut Vec<PropertyIndex>) {
        let Some(rec) = self.get(idx) else { return };
        if rec.is_leaf() {
            out.push(idx);
        }
        for child in &rec.children {
            self.collect_leaves(*child, out);
        }
    }

    /// All leaves of the node, inputs first. This is the persisted leaf order.
    pub fn all_leaves(&self) -> Vec<PropertyIndex> {
        let mut out = self.leaves(self.inputs());
        if let Some(outputs) = self.outputs {
            out.extend(self.leaves(outputs));
        }
        out
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    pub fn value(&self, idx: PropertyIndex) -> Option<&PropertyValue> {
        self.get(idx)?.value.as_ref()
    }

    /// Writes a leaf value. Returns `None` when `idx` is not a leaf or the
    /// value has the wrong type, otherwise whether the value changed.
    pub fn set_leaf(&mut self, idx: PropertyIndex, value: PropertyValue) -> Option<bool> {
        let rec = self.get_mut(idx)?;
        if !rec.is_leaf() || rec.ty != value.property_type() {
            return None;
        }
        let changed = !rec.value.as_ref().is_some_and(|v| v.same_as(&value));
        rec.value = Some(value);
        Some(changed)
    }

    /// Leaves under the inputs root still waiting to be applied.
    pub fn pending_leaves(&self) -> Vec<PropertyIndex> {
        self.leaves(self.inputs())
            .into_iter()
            .filter(|idx| self.records[idx.as_usize()].has_new_value)
            .collect()
    }

    /// Structural equality ignoring values and pending flags.
    pub fn same_shape(&self, other: &PropertyTree) -> bool {
        self.outputs == other.outputs
            && self.records.len() == other.records.len()
            && self.records.iter().zip(&other.records).all(|(a, b)| {
                a.name == b.name
                    && a.ty == b.ty
                    && a.semantics == b.semantics
                    && a.parent == b.parent
                    && a.children == b.children
            })
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> (PropertySnapshot, Option<PropertySnapshot>) {
        (
            self.snapshot_of(self.inputs()),
            self.outputs.map(|o| self.snapshot_of(o)),
        )
    }

    fn snapshot_of(&self, idx: PropertyIndex) -> PropertySnapshot {
        let rec = &self.records[idx.as_usize()];
        PropertySnapshot {
            name: rec.name.clone(),
            ty: rec.ty,
            semantics: rec.semantics,
            value: rec.value.clone(),
            children: rec.children.iter().map(|c| self.snapshot_of(*c)).collect(),
        }
    }

    /// Rebuilds a tree from persisted snapshots, checking that every leaf
    /// carries a value of its declared type and containers carry none.
    pub fn from_snapshots(
        inputs: &PropertySnapshot,
        outputs: Option<&PropertySnapshot>,
    ) -> Result<Self, String> {
        let mut tree = PropertyTree {
            records: Vec::new(),
            outputs: None,
        };
        tree.push_snapshot(inputs, None)?;
        if let Some(outputs) = outputs {
            let idx = tree.push_snapshot(outputs, None)?;
            tree.outputs = Some(idx);
        }
        Ok(tree)
    }

    fn push_snapshot(
        &mut self,
        snap: &PropertySnapshot,
        parent: Option<PropertyIndex>,
    ) -> Result<PropertyIndex, String> {
        match (&snap.value, snap.ty.is_primitive()) {
            (Some(v), true) if v.property_type() == snap.ty => {}
            (None, false) => {}
            _ => {
                return Err(format!(
                    "Fatal error during loading of property '{}': value does not match type {}",
                    snap.name, snap.ty
                ))
            }
        }
        if snap.ty.is_primitive() && !snap.children.is_empty() {
            return Err(format!(
                "Fatal error during loading of property '{}': primitive property has children",
                snap.name
            ));
        }
        let idx = PropertyIndex(self.records.len() as u32);
        self.records.push(PropertyRecord {
            name: snap.name.clone(),
            ty: snap.ty,
            semantics: snap.semantics,
            parent,
            children: SmallVec::new(),
            value: snap.value.clone(),
            has_new_value: false,
        });
        for child in &snap.children {
            let child_idx = self.push_snapshot(child, Some(idx))?;
            self.records[idx.as_usize()].children.push(child_idx);
        }
        Ok(idx)
    }
}

/// Scoped view handed to node behaviors during execution: read inputs,
/// write outputs.
pub struct NodeIo<'a> {
    tree: &'a mut PropertyTree,
}

impl<'a> NodeIo<'a> {
    pub fn new(tree: &'a mut PropertyTree) -> Self {
        NodeIo { tree }
    }

    pub fn input(&self, path: &str) -> Option<&PropertyValue> {
        let idx = self.tree.resolve_path(self.tree.inputs(), path)?;
        self.tree.value(idx)
    }

    pub fn get_input<T: PropertyScalar>(&self, path: &str) -> Option<T> {
        self.input(path).and_then(T::from_value)
    }

    pub fn output(&self, path: &str) -> Option<&PropertyValue> {
        let idx = self.tree.resolve_path(self.tree.outputs()?, path)?;
        self.tree.value(idx)
    }

    pub fn set_output(&mut self, path: &str, value: impl Into<PropertyValue>) -> Result<(), String> {
        let value = value.into();
        let idx = self
            .tree
            .outputs()
            .and_then(|root| self.tree.resolve_path(root, path))
            .ok_or_else(|| format!("Tried to set unknown output '{path}'"))?;
        let ty = value.property_type();
        self.tree
            .set_leaf(idx, value)
            .map(|_| ())
            .ok_or_else(|| format!("Assigning {ty} to output '{path}' of a different type"))
    }

    pub fn tree(&self) -> &PropertyTree {
        self.tree
    }
}
