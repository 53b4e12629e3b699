//! Hosting-environment capability.
//!
//! The hosting platform (notebook runtime, cluster, secret manager) is an
//! injected capability decided once at construction: either hooks are present
//! and accessors delegate to them, or they are absent and every accessor
//! returns `None`. Construction never fails and nothing re-probes per call.

use std::sync::Arc;

/// Accessors a hosting environment may provide.
pub trait Environment: Send + Sync {
    fn current_user(&self) -> Option<String>;
    fn cluster_id(&self) -> Option<String>;
    fn workspace_url(&self) -> Option<String>;
    fn widget(&self, name: &str) -> Option<String>;
    fn secret(&self, scope: &str, key: &str) -> Option<String>;
}

/// Runtime context carried through a pipeline run.
#[derive(Clone)]
pub struct RuntimeContext {
    environment: String,
    hooks: Option<Arc<dyn Environment>>,
}

impl RuntimeContext {
    /// Context with no hosting environment. The environment name defaults to
    /// `$ENVIRONMENT`, falling back to `dev`.
    pub fn new() -> Self {
        Self {
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()),
            hooks: None,
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn Environment>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// True when a hosting environment was injected.
    pub fn is_hosted(&self) -> bool {
        self.hooks.is_some()
    }

    pub fn current_user(&self) -> Option<String> {
        self.hooks.as_ref().and_then(|h| h.current_user())
    }

    pub fn cluster_id(&self) -> Option<String> {
        self.hooks.as_ref().and_then(|h| h.cluster_id())
    }

    pub fn workspace_url(&self) -> Option<String> {
        self.hooks.as_ref().and_then(|h| h.workspace_url())
    }

    pub fn widget(&self, name: &str) -> Option<String> {
        self.hooks.as_ref().and_then(|h| h.widget(name))
    }

    pub fn secret(&self, scope: &str, key: &str) -> Option<String> {
        self.hooks.as_ref().and_then(|h| h.secret(scope, key))
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new()
    }
}
