use crate::collab::ScriptInstance;
use crate::id::{ModuleHandle, ObjectId};
use crate::property::{NodeIo, PropertyTree};

/// Configuration for creating a script node.
#[derive(Debug, Clone, Default)]
pub struct ScriptConfig {
    /// (alias, module) pairs made available to the script.
    pub modules: Vec<(String, ModuleHandle)>,
}

impl ScriptConfig {
    pub fn add_dependency(mut self, alias: impl Into<String>, module: ModuleHandle) -> Self {
        self.modules.push((alias.into(), module));
        self
    }
}

/// A node whose behavior is supplied by the script runtime.
pub struct ScriptNode {
    pub(crate) source: String,
    pub(crate) modules: Vec<(String, ObjectId)>,
    pub(crate) instance: Box<dyn ScriptInstance>,
}

impl ScriptNode {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn uses_module(&self, module: ObjectId) -> bool {
        self.modules.iter().any(|(_, id)| *id == module)
    }

    pub(crate) fn execute(&mut self, tree: &mut PropertyTree) -> Result<(), String> {
        self.instance.run(&mut NodeIo::new(tree))
    }
}
