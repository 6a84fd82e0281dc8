use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AgentError;

/// Who produced a turn in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            other => Err(AgentError::Config(format!("unknown role `{other}`"))),
        }
    }
}

/// A single conversational turn. Fields are read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    metadata: Map<String, Value>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: Map::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Output of a tool, tagged with the tool's name under `metadata.tool`.
    pub fn tool(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content).with_metadata("tool", Value::String(name.into()))
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Name of the tool that produced this message, if any.
    pub fn tool_name(&self) -> Option<&str> {
        self.metadata.get("tool").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_message_carries_tool_name() {
        let message = Message::tool("calculator", "100");

        assert_eq!(message.role(), Role::Tool);
        assert_eq!(message.content(), "100");
        assert_eq!(message.tool_name(), Some("calculator"));
    }

    #[test]
    fn serializes_without_empty_metadata() {
        let plain = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(plain, json!({"role": "user", "content": "hi"}));

        let tagged = serde_json::to_value(Message::tool("calculator", "4")).unwrap();
        assert_eq!(tagged["metadata"]["tool"], "calculator");
    }

    #[test]
    fn parses_only_known_roles() {
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert!("narrator".parse::<Role>().is_err());
    }
}
