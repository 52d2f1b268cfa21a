// src/tool/registry.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{Result, TycheError};
use crate::tool::{ToolAdapter, ToolKind};

type ToolFactory = Arc<dyn Fn() -> Box<dyn ToolAdapter> + Send + Sync>;

/// Maps tool names to adapter constructors.
///
/// The default registry holds the built-in [`ToolKind`]s, with
/// `docker-compose` as an alias of `compose`. Further adapters can be added
/// with [`register`](Self::register).
#[derive(Clone)]
pub struct ToolRegistry {
    factories: BTreeMap<String, ToolFactory>,
}

impl ToolRegistry {
    /// A registry with nothing in it.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ToolAdapter> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Build a fresh adapter instance for `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn ToolAdapter>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| TycheError::UnknownTool(name.to_string()))
    }

    /// Step keys the adapter registered under `name` understands.
    pub fn knows(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.create(name)?.knows())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for kind in ToolKind::ALL {
            registry.register(kind.as_str(), move || kind.create());
        }
        registry.register("docker-compose", || ToolKind::Compose.create());
        registry
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
