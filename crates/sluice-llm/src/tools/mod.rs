//! Tools agents can call while answering
//!
//! Every tool implements [`AgentTool`]. Agents refer to tools by name; the
//! [`ToolRegistry`] turns those names into the concrete tool set handed to
//! the model.

pub mod calc;
pub mod clock;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Error;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// A tool that can be used by an agent
#[async_trait]
pub trait AgentTool: Send + Sync {
    /// The name of the tool
    fn name(&self) -> &str;

    /// A description of what the tool does
    fn description(&self) -> &str;

    /// The JSON schema for the tool's parameters
    fn schema(&self) -> Value;

    /// Execute the tool with the given parameters
    async fn execute(&self, params: Value) -> Result<Value, Error>;

    /// Convert to a genai Tool
    fn to_genai_tool(&self) -> genai::chat::Tool {
        genai::chat::Tool::new(self.name())
            .with_description(self.description())
            .with_schema(self.schema())
    }
}

/// Name and description of a registered tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

/// Tools available to agents, keyed by name
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn AgentTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in calculator and clock.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(calc::Calculator));
        registry.register(Arc::new(clock::CurrentTime));
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn AgentTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AgentTool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Names not registered here.
    pub fn unknown<'a>(&self, names: &'a [String]) -> Vec<&'a str> {
        names
            .iter()
            .map(String::as_str)
            .filter(|name| !self.contains(name))
            .collect()
    }

    /// Tools for an agent's tool list. Unknown names are skipped.
    pub fn resolve(&self, names: &[String]) -> Vec<Arc<dyn AgentTool>> {
        names
            .iter()
            .filter_map(|name| {
                let tool = self.get(name);
                if tool.is_none() {
                    warn!(tool = %name, "agent references unknown tool, skipping");
                }
                tool
            })
            .collect()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
            })
            .collect()
    }
}
