//! Decompose/recompose conversions between [`ApiObjects`] and the persisted
//! payload.
//!
//! [`decompose`] flattens a live object store into [`ApiObjectsData`].
//! [`recompose`] rebuilds a fresh store from it, going through the same node
//! builders the engine factories use, so a loaded node is checked exactly like
//! a created one.
//!
//! Links are persisted by leaf position rather than arena index: a property is
//! addressed by its place in the pre-order listing of its node's trees. Trees
//! rebuilt from snapshots are laid out in that same order, so a position maps
//! straight back to an index.

use std::collections::HashMap;

use rlogic_core::link::LeafKey;
use rlogic_core::object::ObjectMeta;
use rlogic_core::objects::{ApiObjects, RestoreContext};
use rlogic_core::property::PropertyTree;
use rlogic_core::{LogicNode, NodeDescriptor, ObjectId, PropertyIndex};

use crate::error::StorageError;
use crate::schema::{ApiObjectsData, DataArrayRecord, LeafData, LinkData, ModuleData, NodeData, ObjectData};

/// Flattens `objects` into its persisted form.
pub fn decompose(objects: &ApiObjects) -> Result<ApiObjectsData, StorageError> {
    let modules = objects
        .modules()
        .map(|m| ModuleData {
            object: object_data(&m.meta),
            source: m.source.clone(),
        })
        .collect();

    let data_arrays = objects
        .data_arrays()
        .map(|a| DataArrayRecord {
            object: object_data(&a.meta),
            data: a.data.clone(),
        })
        .collect();

    let mut positions: HashMap<ObjectId, HashMap<PropertyIndex, u32>> = HashMap::new();
    let mut nodes = Vec::with_capacity(objects.node_count());
    for node in objects.nodes() {
        positions.insert(node.id(), preorder_positions(&node.tree));
        nodes.push(node_data(node));
    }

    let leaf = |key: LeafKey| -> Result<LeafData, StorageError> {
        positions
            .get(&key.node)
            .and_then(|p| p.get(&key.index))
            .map(|&property| LeafData {
                node: key.node.0,
                property,
            })
            .ok_or_else(|| StorageError::ContentState {
                reason: format!("Link refers to unknown property {} of object {}", key.index, key.node),
            })
    };
    let links = objects
        .links()
        .iter()
        .map(|l| {
            Ok(LinkData {
                source: leaf(l.source)?,
                target: leaf(l.target)?,
                weak: l.weak,
            })
        })
        .collect::<Result<Vec<_>, StorageError>>()?;

    Ok(ApiObjectsData {
        modules,
        data_arrays,
        nodes,
        links,
    })
}

/// Rebuilds an object store. Every problem found is collected; the store is
/// only returned when there were none.
pub fn recompose(data: ApiObjectsData, ctx: &mut RestoreContext<'_>) -> Result<ApiObjects, StorageError> {
    let mut objects = ApiObjects::new();
    let mut messages = Vec::new();

    for module in data.modules {
        if let Err(msg) = objects.restore_module(restored_meta(module.object), module.source) {
            messages.push(msg);
        }
    }

    for array in data.data_arrays {
        if let Err(msg) = objects.restore_data_array(restored_meta(array.object), array.data, ctx.level) {
            messages.push(msg);
        }
    }

    // Skins and anchor points read other bindings, which must exist first.
    let (late, early): (Vec<NodeData>, Vec<NodeData>) = data.nodes.into_iter().partition(|n| {
        matches!(
            n.descriptor,
            NodeDescriptor::SkinBinding { .. } | NodeDescriptor::AnchorPoint { .. }
        )
    });
    for node in early.into_iter().chain(late) {
        let meta = restored_meta(node.object);
        if let Err(msg) = objects.restore_node(meta, node.descriptor, &node.inputs, node.outputs.as_ref(), ctx) {
            messages.push(msg);
        }
    }

    if !messages.is_empty() {
        return Err(StorageError::Reconstruction { messages });
    }

    for link in data.links {
        if let Err(msg) = objects.restore_link(leaf_key(link.source), leaf_key(link.target), link.weak) {
            messages.push(msg);
        }
    }

    if messages.is_empty() {
        tracing::debug!(
            objects = objects.object_count(),
            links = objects.links().len(),
            "recomposed object store"
        );
        Ok(objects)
    } else {
        Err(StorageError::Reconstruction { messages })
    }
}

fn object_data(meta: &ObjectMeta) -> ObjectData {
    ObjectData {
        id: meta.id.0,
        name: meta.name.clone(),
        user_id: meta.user_id,
    }
}

fn restored_meta(object: ObjectData) -> ObjectMeta {
    ObjectMeta::restored(ObjectId(object.id), object.name, object.user_id)
}

fn node_data(node: &LogicNode) -> NodeData {
    let (inputs, outputs) = node.tree.snapshot();
    NodeData {
        object: object_data(&node.meta),
        descriptor: node.descriptor(),
        inputs,
        outputs,
    }
}

fn leaf_key(leaf: LeafData) -> LeafKey {
    LeafKey::new(ObjectId(leaf.node), PropertyIndex(leaf.property))
}

/// Position of every record in the pre-order listing of the inputs tree
/// followed by the outputs tree.
fn preorder_positions(tree: &PropertyTree) -> HashMap<PropertyIndex, u32> {
    let mut positions = HashMap::with_capacity(tree.len());
    let mut stack: Vec<PropertyIndex> = Vec::new();
    for root in std::iter::once(tree.inputs()).chain(tree.outputs()) {
        stack.push(root);
        while let Some(idx) = stack.pop() {
            positions.insert(idx, positions.len() as u32);
            if let Some(rec) = tree.get(idx) {
                stack.extend(rec.children.iter().rev().copied());
            }
        }
    }
    positions
}
