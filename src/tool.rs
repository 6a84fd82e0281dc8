use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{AgentError, Result};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// JSON schema of the arguments `call` accepts. Informational only.
    fn parameters(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn call(&self, input: Value) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Tools keyed by their own declared name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_shared(Arc::new(tool));
    }

    /// Register a tool instance that may also be held by other registries.
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "replacing previously registered tool");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn describe(&self) -> Vec<ToolDescription> {
        let mut described: Vec<ToolDescription> = self
            .tools
            .values()
            .map(|tool| ToolDescription {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect();
        described.sort_by(|a, b| a.name.cmp(&b.name));
        described
    }

    pub async fn call(&self, name: &str, input: Value) -> Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;
        tool.call(input).await.map_err(|err| match err {
            AgentError::ToolInvocation { .. } => err,
            other => AgentError::ToolInvocation {
                name: name.to_string(),
                source: Box::new(other),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed {
        name: &'static str,
        reply: &'static str,
    }

    #[async_trait]
    impl Tool for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Replies with a fixed string"
        }

        async fn call(&self, _input: Value) -> Result<String> {
            Ok(self.reply.to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl Tool for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        async fn call(&self, _input: Value) -> Result<String> {
            Err(AgentError::LanguageModel("boom".into()))
        }
    }

    #[tokio::test]
    async fn later_registration_wins() {
        let mut registry = ToolRegistry::new();
        registry.register(Fixed { name: "echo", reply: "first" });
        registry.register(Fixed { name: "echo", reply: "second" });

        assert_eq!(registry.names(), vec!["echo".to_string()]);
        assert_eq!(registry.call("echo", json!({})).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn unknown_tool_is_reported() {
        let registry = ToolRegistry::new();
        let err = registry.call("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolNotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn failures_are_wrapped_with_tool_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Broken);

        let err = registry.call("broken", json!({})).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "tool `broken` invocation failed: language model error: boom"
        );
    }

    #[test]
    fn describes_tools_in_name_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Fixed { name: "zeta", reply: "" });
        registry.register(Fixed { name: "alpha", reply: "" });

        let names: Vec<String> = registry.describe().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
