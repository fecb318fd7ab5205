//! Collaborator traits for everything the engine does not own.
//!
//! The engine evaluates the graph; computing a script's outputs, pushing
//! values into the rendered scene and finding scene objects again after a
//! load are delegated to implementations of these traits.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::math::Mat4;
use crate::nodes::BindingKind;
use crate::property::{NodeIo, PropertySpec};
use crate::value::PropertyValue;

/// A module made available to a script under an alias.
#[derive(Debug, Clone, Copy)]
pub struct ModuleSource<'a> {
    pub alias: &'a str,
    pub name: &'a str,
    pub source: &'a str,
}

/// Compiles script sources into runnable instances.
pub trait ScriptRuntime {
    fn compile(
        &self,
        source: &str,
        modules: &[ModuleSource<'_>],
        name: &str,
    ) -> Result<Box<dyn ScriptInstance>, String>;
}

/// A compiled script: declares its interface and computes outputs from inputs.
pub trait ScriptInstance {
    fn inputs(&self) -> PropertySpec;

    fn outputs(&self) -> PropertySpec;

    fn run(&mut self, io: &mut NodeIo<'_>) -> Result<(), String>;
}

/// Live external object a binding node forwards values to.
///
/// Only `apply` and the identity accessors are required; the remaining hooks
/// are used by specific binding kinds (node bindings report a world matrix,
/// camera bindings a view-projection, appearance bindings receive uniforms and
/// joint matrices).
pub trait BindingTarget {
    fn name(&self) -> &str;

    /// Persisted numeric identity of the external object.
    fn object_id(&self) -> u64;

    /// Identity of the external scene the object belongs to.
    fn scene_id(&self) -> u64;

    /// Forwards one leaf value. `path` is relative to the binding's inputs
    /// root, e.g. `viewport.width`.
    fn apply(&mut self, path: &str, value: &PropertyValue) -> Result<(), String>;

    /// Current value of the external field behind `path`, used to seed the
    /// binding's inputs on creation.
    fn initial_value(&self, _path: &str) -> Option<PropertyValue> {
        None
    }

    /// Appearance targets: the uniform inputs exposed as binding inputs.
    fn uniform_inputs(&self) -> Option<PropertySpec> {
        None
    }

    fn world_matrix(&self) -> Option<Mat4> {
        None
    }

    /// Camera targets: view-projection matrix and viewport
    /// `[offsetX, offsetY, width, height]`.
    fn view_projection(&self) -> Option<(Mat4, [i32; 4])> {
        None
    }

    fn set_joint_matrices(&mut self, uniform: &str, _matrices: &[Mat4]) -> Result<(), String> {
        Err(format!("Object '{}' has no uniform '{uniform}'", self.name()))
    }
}

/// Maps persisted external references back to live objects during load.
pub trait ObjectResolver {
    fn resolve(&mut self, kind: BindingKind, name: &str, object_id: u64) -> Option<Box<dyn BindingTarget>>;
}

/// Source of time for timer nodes, in microseconds.
pub trait Clock {
    fn now_us(&self) -> i64;
}

/// Wall clock based on `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_us(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or_default()
    }
}
