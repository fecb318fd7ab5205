//! Stable ID newtypes and typed handles for engine entities.
//!
//! [`ObjectId`] is the persisted identity of every logic object. It is
//! process-unique and monotonically increasing: ids are handed out from a
//! global counter and never reused, and loading a file advances the counter
//! past every loaded id.
//!
//! Handles ([`NodeHandle`], [`DataArrayHandle`], [`ModuleHandle`],
//! [`PropertyRef`]) pair an object id with the [`EngineId`] of the engine that
//! created them, so an engine can reject handles that belong to another
//! instance. They are distinct types so that a data array cannot be passed
//! where a node is expected.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// Persisted identity of a logic object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Allocates the next process-unique id.
    pub(crate) fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Advances the id counter so that ids allocated afterwards are strictly
    /// greater than `id`.
    pub fn reserve_through(id: ObjectId) {
        NEXT_OBJECT_ID.fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
    }
}

/// Identity of one [`LogicEngine`](crate::engine::LogicEngine) instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineId(u64);

impl EngineId {
    pub(crate) fn next() -> Self {
        EngineId(NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Index of a property record inside its node's property arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyIndex(pub u32);

impl PropertyIndex {
    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a logic node owned by a specific engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub(crate) engine: EngineId,
    pub(crate) id: ObjectId,
}

/// Handle to a data array owned by a specific engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataArrayHandle {
    pub(crate) engine: EngineId,
    pub(crate) id: ObjectId,
}

/// Handle to a script module owned by a specific engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle {
    pub(crate) engine: EngineId,
    pub(crate) id: ObjectId,
}

/// Handle to one property of a node.
///
/// The pair (node id, arena index) never aliases: node ids are never reused
/// and a node's property tree is fixed for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyRef {
    pub(crate) engine: EngineId,
    pub(crate) node: ObjectId,
    pub(crate) index: PropertyIndex,
}

/// Any logic object owned by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectHandle {
    Node(NodeHandle),
    DataArray(DataArrayHandle),
    Module(ModuleHandle),
}

impl NodeHandle {
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl DataArrayHandle {
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl ModuleHandle {
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl PropertyRef {
    /// Id of the node owning this property.
    pub fn node_id(&self) -> ObjectId {
        self.node
    }

    pub fn index(&self) -> PropertyIndex {
        self.index
    }
}

impl ObjectHandle {
    pub fn id(&self) -> ObjectId {
        match self {
            ObjectHandle::Node(h) => h.id,
            ObjectHandle::DataArray(h) => h.id,
            ObjectHandle::Module(h) => h.id,
        }
    }

    pub(crate) fn engine(&self) -> EngineId {
        match self {
            ObjectHandle::Node(h) => h.engine,
            ObjectHandle::DataArray(h) => h.engine,
            ObjectHandle::Module(h) => h.engine,
        }
    }

    /// Human-readable object category, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ObjectHandle::Node(_) => "LogicNode",
            ObjectHandle::DataArray(_) => "DataArray",
            ObjectHandle::Module(_) => "ScriptModule",
        }
    }
}

impl From<NodeHandle> for ObjectHandle {
    fn from(h: NodeHandle) -> Self {
        ObjectHandle::Node(h)
    }
}

impl From<DataArrayHandle> for ObjectHandle {
    fn from(h: DataArrayHandle) -> Self {
        ObjectHandle::DataArray(h)
    }
}

impl From<ModuleHandle> for ObjectHandle {
    fn from(h: ModuleHandle) -> Self {
        ObjectHandle::Module(h)
    }
}

// Display implementations -- just print the inner value.

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PropertyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_are_monotonic() {
        let a = ObjectId::next();
        let b = ObjectId::next();
        assert!(b > a);
    }

    #[test]
    fn reserve_through_skips_loaded_ids() {
        let current = ObjectId::next();
        let loaded = ObjectId(current.0 + 1000);
        ObjectId::reserve_through(loaded);
        assert!(ObjectId::next() > loaded);
    }

    #[test]
    fn reserve_through_never_moves_backwards() {
        let current = ObjectId::next();
        ObjectId::reserve_through(ObjectId(0));
        assert!(ObjectId::next() > current);
    }

    #[test]
    fn engine_ids_are_distinct() {
        assert_ne!(EngineId::next(), EngineId::next());
    }

    #[test]
    fn object_handle_exposes_inner_id() {
        let engine = EngineId::next();
        let node = NodeHandle {
            engine,
            id: ObjectId(7),
        };
        let handle: ObjectHandle = node.into();
        assert_eq!(handle.id(), ObjectId(7));
        assert_eq!(handle.kind_name(), "LogicNode");
        assert_eq!(handle.engine(), engine);
    }

    #[test]
    fn display_prints_inner_value() {
        assert_eq!(format!("{}", ObjectId(42)), "42");
        assert_eq!(format!("{}", PropertyIndex(3)), "3");
    }

    #[test]
    fn serde_roundtrip() {
        let id = ObjectId(99);
        let json = serde_json::to_string(&id).unwrap();
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
