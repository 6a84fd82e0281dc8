use async_trait::async_trait;
use serde_json::Value;

/// Observer notified at each phase of an agent run. All methods default to no-ops.
#[async_trait]
pub trait AgentHook: Send + Sync {
    async fn on_user_query(&self, _query: &str) {}

    async fn on_thought(&self, _thought: &str) {}

    async fn on_tool_call(&self, _name: &str, _input: &Value) {}

    async fn on_tool_output(&self, _name: &str, _output: &str) {}

    async fn on_response(&self, _response: &str) {}
}

/// Prints a human-readable trace of every phase to stdout. Tool input is
/// printed as compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNarrator;

#[async_trait]
impl AgentHook for ConsoleNarrator {
    async fn on_user_query(&self, query: &str) {
        println!("\n--- User: {query} ---");
    }

    async fn on_thought(&self, thought: &str) {
        println!("[Agent Thought]: {thought}");
    }

    async fn on_tool_call(&self, name: &str, input: &Value) {
        println!("[Agent Action]: Calling tool '{name}' with {input}");
    }

    async fn on_tool_output(&self, _name: &str, output: &str) {
        println!("[Tool Output]: {output}");
    }

    async fn on_response(&self, response: &str) {
        println!("[Agent Response]: {response}");
    }
}
