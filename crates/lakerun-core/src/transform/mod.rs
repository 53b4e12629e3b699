//! Transform capability interface and the name→factory registry.
//!
//! The registry is the engine's polymorphism point: the executor resolves the
//! configured type tag against it and never branches on transform names. New
//! behaviors are added by registration.

pub mod common;

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use serde_json::Value as JsonValue;

use crate::error::{PipelineError, Result};
use crate::frame::DataFrame;

static EMPTY_PARAMS: LazyLock<JsonValue> =
    LazyLock::new(|| JsonValue::Object(serde_json::Map::new()));

/// A named, parameterized, stateless unit of work over a frame.
pub trait Transform: Send + Sync {
    fn apply(&self, frame: &DataFrame) -> Result<DataFrame>;
}

type TransformFactory = Arc<dyn Fn(&JsonValue) -> Result<Box<dyn Transform>> + Send + Sync>;

/// Mutable name→constructor mapping, seeded with the built-ins.
#[derive(Clone)]
pub struct TransformRegistry {
    factories: HashMap<String, TransformFactory>,
}

impl TransformRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in transforms.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        common::register_builtins(&mut registry);
        registry
    }

    /// Register a transform constructor; replaces any prior entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&JsonValue) -> Result<Box<dyn Transform>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate a transform by type tag.
    ///
    /// # Errors
    ///
    /// Fails on an unknown type or invalid parameters.
    pub fn build(&self, name: &str, params: &JsonValue) -> Result<Box<dyn Transform>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            PipelineError::Transformation(format!("unknown transformation type: {name}"))
        })?;
        let params = if params.is_null() { &EMPTY_PARAMS } else { params };
        factory(params)
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
