//! Core of the rlogic evaluation engine.
//!
//! A [`LogicEngine`] owns a graph of logic nodes (scripts, interfaces,
//! bindings, animations, timers, skins and anchor points) whose leaf
//! properties are connected by strong and weak links. `update()` evaluates the
//! graph once in dependency order and hands finalized binding values to the
//! host through the [`collab`] traits.

pub mod collab;
pub mod data_array;
pub mod engine;
pub mod error;
pub mod feature;
pub mod id;
pub mod link;
pub mod math;
pub mod native;
pub mod nodes;
pub mod object;
pub mod objects;
pub mod property;
pub mod scheduler;
pub mod stats;
pub mod update;
mod validation;
pub mod value;

// Re-export commonly used types
pub use collab::{BindingTarget, Clock, ModuleSource, ObjectResolver, ScriptInstance, ScriptRuntime, SystemClock};
pub use data_array::{DataArray, DataArrayData, DataArrayElement, DataArrayType};
pub use engine::{LogicEngine, PropertyLink};
pub use error::{CoreError, ErrorData, ErrorKind, LinkError, Severity};
pub use feature::{Capability, FeatureLevel};
pub use id::{DataArrayHandle, ModuleHandle, NodeHandle, ObjectHandle, ObjectId, PropertyIndex, PropertyRef};
pub use math::Mat4;
pub use native::NativeScriptRuntime;
pub use nodes::{
    AnimationChannel, AnimationNodeConfig, BindingKind, Interpolation, LogicNode, NodeDescriptor, NodeKind,
    ScriptConfig,
};
pub use property::{NodeIo, PropertySemantics, PropertySnapshot, PropertySpec};
pub use stats::{StatisticsSummary, UpdateStatistics};
pub use update::UpdateReport;
pub use value::{PropertyScalar, PropertyType, PropertyValue};
