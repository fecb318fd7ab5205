//! Interface nodes: named pass-through of a user-declared property set.

use crate::property::{PropertySemantics, PropertySpec, PropertyTree};

pub(crate) fn build_tree(inputs: &PropertySpec) -> Result<PropertyTree, String> {
    if inputs.children.is_empty() {
        return Err("Interface must declare at least one input".to_owned());
    }
    PropertyTree::new(inputs, Some(inputs), PropertySemantics::Input)
}

/// Copies every input leaf to the output leaf at the same position.
pub(crate) fn execute(tree: &mut PropertyTree) {
    let Some(outputs) = tree.outputs() else { return };
    let inputs = tree.leaves(tree.inputs());
    let outputs = tree.leaves(outputs);
    for (i, o) in inputs.into_iter().zip(outputs) {
        if let Some(value) = tree.value(i).cloned() {
            tree.set_leaf(o, value);
        }
    }
}
