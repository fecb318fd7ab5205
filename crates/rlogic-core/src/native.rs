//! A [`ScriptRuntime`] backed by registered Rust closures.
//!
//! The script source is the name of a registered function. Useful for hosts
//! without an embedded interpreter and for tests.

use std::collections::HashMap;
use std::rc::Rc;

use crate::collab::{ModuleSource, ScriptInstance, ScriptRuntime};
use crate::property::{NodeIo, PropertySpec};

type NativeFn = Rc<dyn Fn(&mut NodeIo<'_>) -> Result<(), String>>;

#[derive(Clone)]
struct NativeScript {
    inputs: PropertySpec,
    outputs: PropertySpec,
    run: NativeFn,
}

#[derive(Clone, Default)]
pub struct NativeScriptRuntime {
    scripts: HashMap<String, NativeScript>,
}

impl NativeScriptRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `run` under `name` with the given interface.
    pub fn register<F>(&mut self, name: &str, inputs: PropertySpec, outputs: PropertySpec, run: F) -> &mut Self
    where
        F: Fn(&mut NodeIo<'_>) -> Result<(), String> + 'static,
    {
        self.scripts.insert(
            name.to_owned(),
            NativeScript {
                inputs,
                outputs,
                run: Rc::new(run),
            },
        );
        self
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }
}

impl ScriptRuntime for NativeScriptRuntime {
    fn compile(
        &self,
        source: &str,
        _modules: &[ModuleSource<'_>],
        name: &str,
    ) -> Result<Box<dyn ScriptInstance>, String> {
        let key = source.trim();
        let script = self
            .scripts
            .get(key)
            .ok_or_else(|| format!("[{name}] Error while loading script: unknown native function '{key}'"))?;
        Ok(Box::new(NativeInstance {
            script: script.clone(),
        }))
    }
}

struct NativeInstance {
    script: NativeScript,
}

impl ScriptInstance for NativeInstance {
    fn inputs(&self) -> PropertySpec {
        self.script.inputs.clone()
    }

    fn outputs(&self) -> PropertySpec {
        self.script.outputs.clone()
    }

    fn run(&mut self, io: &mut NodeIo<'_>) -> Result<(), String> {
        (self.script.run)(io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertySemantics, PropertyTree};
    use crate::value::{PropertyType, PropertyValue};

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
    fn compiles_registered_function() {
        let rt = runtime();
        assert!(rt.is_registered("double"));
        let mut instance = rt.compile(" double\n", &[], "s").unwrap();
        let mut tree = PropertyTree::new(
            &instance.inputs(),
            Some(&instance.outputs()),
            PropertySemantics::Input,
        )
        .unwrap();
        let x = tree.resolve_path(tree.inputs(), "x").unwrap();
        tree.set_leaf(x, 21i32.into());
        instance.run(&mut NodeIo::new(&mut tree)).unwrap();
        let y = tree.resolve_path(tree.outputs().unwrap(), "y").unwrap();
        assert_eq!(tree.value(y), Some(&PropertyValue::Int32(42)));
    }

    #[test]
    fn unknown_function_is_a_compile_error() {
        let err = runtime().compile("triple", &[], "s").err().unwrap();
        assert_eq!(err, "[s] Error while loading script: unknown native function 'triple'");
    }
}
