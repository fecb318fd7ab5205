//! One evaluation pass over the node graph.
//!
//! Nodes run in the cached topological order. Before a node runs, its
//! incoming links are applied: strong links read the live source value,
//! which has already been produced earlier in the same pass, while weak links
//! read the value their source had when the pass started. A node whose inputs
//! did not change is skipped and keeps its outputs.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::collab::Clock;
use crate::error::CoreError;
use crate::id::ObjectId;
use crate::link::{LeafKey, Link};
use crate::objects::ApiObjects;
use crate::value::PropertyValue;

/// What happened during the last `update()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// Nodes that ran, in execution order.
    pub executed: Vec<ObjectId>,
    /// Nodes that were clean and therefore skipped.
    pub skipped: Vec<ObjectId>,
    /// Time each executed node took, in execution order.
    pub node_times: Vec<(ObjectId, Duration)>,
    /// Link targets whose value changed.
    pub activated_links: usize,
    pub sort_time: Duration,
    pub total_time: Duration,
}

/// Runs one pass. The first runtime error stops the pass; side effects of
/// nodes executed before it stand.
pub(crate) fn run(
    objects: &mut ApiObjects,
    clock: &dyn Clock,
    dirty_tracking: bool,
    report: &mut UpdateReport,
) -> Result<(), CoreError> {
    let started = Instant::now();
    let order = objects
        .dependencies_mut()
        .order()
        .map_err(|_| CoreError::Scheduling {
            operation: "update()",
        })?
        .to_vec();
    report.sort_time = started.elapsed();

    for id in &order {
        if let Some(node) = objects.node_mut(*id) {
            if node.always_dirty() {
                node.dirty = true;
            }
        }
    }

    let prior: HashMap<LeafKey, PropertyValue> = objects
        .links()
        .weak_sources()
        .into_iter()
        .filter_map(|key| Some((key, objects.leaf(key)?.value.clone()?)))
        .collect();
    let mut incoming = objects.links().incoming_by_node();

    let result = execute_in_order(objects, &order, &mut incoming, &prior, clock, dirty_tracking, report);
    report.total_time = started.elapsed();
    result
}

#[allow(clippy::too_many_arguments)]
fn execute_in_order(
    objects: &mut ApiObjects,
    order: &[ObjectId],
    incoming: &mut HashMap<ObjectId, Vec<Link>>,
    prior: &HashMap<LeafKey, PropertyValue>,
    clock: &dyn Clock,
    dirty_tracking: bool,
    report: &mut UpdateReport,
) -> Result<(), CoreError> {
    for &id in order {
        if let Some(links) = incoming.remove(&id) {
            report.activated_links += objects.propagate_into(id, &links, prior);
        }

        let dirty = objects.node(id).is_some_and(|n| n.is_dirty());
        if !dirty && dirty_tracking {
            report.skipped.push(id);
            continue;
        }

        let started = Instant::now();
        objects
            .execute(id, clock)
            .map_err(|message| CoreError::Runtime { node: id, message })?;
        report.executed.push(id);
        report.node_times.push((id, started.elapsed()));

        if let Some(node) = objects.node_mut(id) {
            node.dirty = false;
        }
    }
    Ok(())
}
