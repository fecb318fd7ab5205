//! Content checks reported as warnings by `LogicEngine::validate`.

use std::collections::HashMap;

use crate::error::{ErrorData, ErrorKind};
use crate::id::ObjectId;
use crate::link::LeafKey;
use crate::nodes::{LogicNode, NodeBehavior, NodeKind};
use crate::objects::ApiObjects;

pub(crate) fn validate(objects: &ApiObjects) -> Vec<ErrorData> {
    let mut warnings = Vec::new();
    check_bindings_dirty(objects, &mut warnings);
    check_interfaces(objects, &mut warnings);
    check_dangling_nodes(objects, &mut warnings);
    for w in &warnings {
        tracing::warn!(object = ?w.object, "{}", w.message);
    }
    warnings
}

fn warn(out: &mut Vec<ErrorData>, message: String, object: Option<ObjectId>) {
    out.push(ErrorData::warning(ErrorKind::Validation, message, object));
}

fn check_bindings_dirty(objects: &ApiObjects, out: &mut Vec<ErrorData>) {
    let dirty = objects
        .nodes()
        .filter(|n| n.as_binding().is_some())
        .any(|n| !n.tree.pending_leaves().is_empty());
    if dirty {
        warn(
            out,
            "Saving logic engine content with manually updated binding values without calling update() will result in those values being lost!".to_owned(),
            None,
        );
    }
}

fn check_interfaces(objects: &ApiObjects, out: &mut Vec<ErrorData>) {
    let interfaces: Vec<&LogicNode> = objects
        .nodes()
        .filter(|n| n.kind() == NodeKind::Interface)
        .collect();

    let mut name_counts: HashMap<&str, usize> = HashMap::new();
    for node in &interfaces {
        *name_counts.entry(node.name()).or_default() += 1;
    }

    for node in interfaces {
        if let Some(outputs) = node.tree.outputs() {
            for leaf in node.tree.leaves(outputs) {
                if !objects.links().has_outgoing(LeafKey::new(node.id(), leaf)) {
                    warn(
                        out,
                        format!(
                            "Interface [{}] has unlinked output [{}]",
                            node.name(),
                            node.tree.path_of(leaf)
                        ),
                        Some(node.id()),
                    );
                }
            }
        }
        if name_counts.get(node.name()).copied().unwrap_or_default() > 1 {
            warn(
                out,
                format!("Interface [{}] does not have a unique name", node.name()),
                Some(node.id()),
            );
        }
    }
}

/// Bindings consumed by anchor points or skins are fed outside the link graph.
fn is_implicitly_used(objects: &ApiObjects, id: ObjectId) -> bool {
    objects.nodes().any(|n| match &n.behavior {
        NodeBehavior::AnchorPoint(a) => a.node_binding == id || a.camera_binding == id,
        NodeBehavior::SkinBinding(s) => s.uses_binding(id),
        _ => false,
    })
}

fn check_dangling_nodes(objects: &ApiObjects, out: &mut Vec<ErrorData>) {
    for node in objects.nodes() {
        let id = node.id();
        let kind = node.kind();

        let checks_outgoing = matches!(kind, NodeKind::Script | NodeKind::Animation | NodeKind::Timer);
        if checks_outgoing {
            if let Some(outputs) = node.tree.outputs() {
                let leaves = node.tree.leaves(outputs);
                if !leaves.is_empty()
                    && !leaves
                        .iter()
                        .any(|l| objects.links().has_outgoing(LeafKey::new(id, *l)))
                {
                    warn(
                        out,
                        format!(
                            "Node [{}] has no outgoing links! Node should be deleted or properly linked!",
                            node.name()
                        ),
                        Some(id),
                    );
                }
            }
        }

        let checks_ingoing = match kind {
            NodeKind::Script | NodeKind::Animation => true,
            NodeKind::Binding(_) => !is_implicitly_used(objects, id),
            _ => false,
        };
        if checks_ingoing {
            let leaves = node.tree.leaves(node.tree.inputs());
            if !leaves.is_empty()
                && !leaves
                    .iter()
                    .any(|l| objects.links().incoming(LeafKey::new(id, *l)).is_some())
            {
                warn(
                    out,
                    format!(
                        "Node [{}] has no ingoing links! Node should be deleted or properly linked!",
                        node.name()
                    ),
                    Some(id),
                );
            }
        }
    }
}
