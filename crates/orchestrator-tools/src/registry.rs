//! Tool declarations: `{ name, handler, optional fallback tool name }`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::failure::ToolFailure;

/// A tool's executable behavior. Implementors own whatever I/O client they
/// need (HTTP, local store, etc.) and must honor the timeout the executor
/// applies around the call from the outside.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, args: Value) -> Result<Value, ToolFailure>;
}

/// A registered tool: its handler plus the name of the tool to fall back to
/// on failure, if any.
pub struct ToolSpec {
    pub name: String,
    pub handler: Arc<dyn ToolHandler>,
    pub fallback: Option<String>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, handler: Arc<dyn ToolHandler>) -> Self {
        Self { name: name.into(), handler, fallback: None }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }
}

/// Lookup table of declared tools, keyed by their canonical dotted name
/// (e.g. `"calendar.create_draft"`).
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ToolSpec) {
        self.tools.insert(spec.name.clone(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}
