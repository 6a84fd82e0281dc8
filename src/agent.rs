use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::AgentSettings;
use crate::error::Result;
use crate::hooks::AgentHook;
use crate::llm::LanguageModel;
use crate::memory::ConversationMemory;
use crate::message::Message;
use crate::tool::ToolRegistry;

/// Structured payload a model may reply with instead of plain text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Value>,
}

impl Decision {
    /// Returns `None` unless `raw` is a JSON object. Fields of an unexpected
    /// type are treated as absent rather than rejecting the whole object:
    /// `thought` and `tool` must be strings, `tool_input` must not be null.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(raw).ok()? {
            Value::Object(mut fields) => Some(Self {
                thought: take_string(&mut fields, "thought"),
                tool: take_string(&mut fields, "tool"),
                tool_input: fields.remove("tool_input").filter(|input| !input.is_null()),
            }),
            _ => None,
        }
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key)? {
        Value::String(text) => Some(text),
        _ => None,
    }
}

/// Runs one think → act → observe cycle per user query.
pub struct Agent<M: LanguageModel> {
    system_prompt: String,
    model: Arc<M>,
    tools: ToolRegistry,
    memory: ConversationMemory,
    hooks: Vec<Arc<dyn AgentHook>>,
    record_unrouted_decisions: bool,
}

impl<M: LanguageModel> Agent<M> {
    pub fn new(model: Arc<M>) -> Self {
        let defaults = AgentSettings::default();
        Self {
            system_prompt: defaults.system_prompt,
            model,
            tools: ToolRegistry::new(),
            memory: ConversationMemory::default(),
            hooks: Vec::new(),
            record_unrouted_decisions: defaults.record_unrouted_decisions,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn AgentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Apply prompt and memory policy from settings. Narration is left to the
    /// caller, who decides which hook prints it.
    pub fn with_settings(mut self, settings: &AgentSettings) -> Self {
        self.system_prompt = settings.system_prompt.clone();
        self.record_unrouted_decisions = settings.record_unrouted_decisions;
        self
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn transcript(&self) -> &[Message] {
        self.memory.history()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Handle one user query and return the response shown to the user.
    ///
    /// Never fails: model and tool errors come back as `Error: ...` text.
    pub async fn run(&mut self, user_query: impl Into<String>) -> String {
        let query = user_query.into();
        info!(%query, turns = self.memory.len(), "agent run started");
        for hook in &self.hooks {
            hook.on_user_query(&query).await;
        }
        self.memory.add(Message::user(query));

        let raw = match self.generate().await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "model failed while deciding");
                return self.surface(format!("Error: {err}")).await;
            }
        };

        let Some(decision) = Decision::parse(&raw) else {
            debug!("model replied with plain text");
            self.memory.add(Message::assistant(raw.clone()));
            return self.surface(raw).await;
        };

        if let Some(thought) = decision.thought.as_deref() {
            for hook in &self.hooks {
                hook.on_thought(thought).await;
            }
        }

        let Some(tool_name) = decision.tool.filter(|name| self.tools.contains(name)) else {
            debug!(
                recorded = self.record_unrouted_decisions,
                "decision names no registered tool"
            );
            if self.record_unrouted_decisions {
                self.memory.add(Message::assistant(raw.clone()));
            }
            return self.surface(raw).await;
        };

        let input = decision
            .tool_input
            .unwrap_or_else(|| Value::Object(Map::new()));
        for hook in &self.hooks {
            hook.on_tool_call(&tool_name, &input).await;
        }
        debug!(tool = %tool_name, %input, "calling tool");
        let output = match self.tools.call(&tool_name, input).await {
            Ok(output) => output,
            Err(err) => {
                warn!(tool = %tool_name, error = %err, "tool call failed");
                format!("Error: {err}")
            }
        };
        for hook in &self.hooks {
            hook.on_tool_output(&tool_name, &output).await;
        }

        self.memory.add(Message::tool(tool_name, output));
        let reply = match self.generate().await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "model failed while summarizing tool output");
                return self.surface(format!("Error: {err}")).await;
            }
        };
        self.memory.add(Message::assistant(reply.clone()));
        self.surface(reply).await
    }

    async fn surface(&self, response: String) -> String {
        for hook in &self.hooks {
            hook.on_response(&response).await;
        }
        info!(turns = self.memory.len(), "agent run finished");
        response
    }

    async fn generate(&self) -> Result<String> {
        let mut request = Vec::with_capacity(self.memory.len() + 1);
        request.push(Message::system(self.build_system_message()));
        request.extend(self.memory.iter().cloned());
        self.model.generate(&request).await
    }

    fn build_system_message(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str(&self.system_prompt);
        prompt.push_str(
            "\n\nTo use a tool, reply with a JSON object \
             {\"thought\": ..., \"tool\": ..., \"tool_input\": {...}}. Otherwise, reply directly.",
        );
        if self.tools.is_empty() {
            prompt.push_str(" No tools are available.\n");
        } else {
            prompt.push_str("\nAvailable tools:\n");
            for tool in self.tools.describe() {
                prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
                prompt.push_str(&format!("  parameters: {}\n", tool.parameters));
            }
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::error::AgentError;
    use crate::llm::ScriptedModel;
    use crate::message::Role;
    use crate::tools::CalculatorTool;

    /// Replays canned replies in order, then reports itself offline.
    struct QueuedModel {
        replies: Mutex<VecDeque<String>>,
    }

    impl QueuedModel {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for QueuedModel {
        async fn generate(&self, _history: &[Message]) -> Result<String> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::LanguageModel("offline".into()))
        }
    }

    fn calculator_tools() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(CalculatorTool);
        tools
    }

    #[test]
    fn parses_only_json_objects() {
        assert_eq!(Decision::parse("hello"), None);
        assert_eq!(Decision::parse("42"), None);
        assert_eq!(Decision::parse("[1, 2]"), None);

        let decision = Decision::parse(r#"{"tool": 7, "tool_input": null, "extra": 1}"#).unwrap();
        assert_eq!(decision, Decision::default());
    }

    #[test]
    fn non_string_thought_is_absent() {
        assert_eq!(
            Decision::parse(r#"{"thought": 5}"#),
            Some(Decision::default())
        );

        let decision =
            Decision::parse(r#"{"thought": {"plan": "add"}, "tool": "calculator"}"#).unwrap();
        assert_eq!(decision.thought, None);
        assert_eq!(decision.tool.as_deref(), Some("calculator"));
    }

    #[tokio::test]
    async fn plain_reply_is_recorded_without_tools() {
        let mut agent = Agent::new(Arc::new(ScriptedModel)).with_tools(calculator_tools());

        let reply = agent.run("Hello, who are you?").await;

        assert_eq!(reply, "I am a simple agent. I can help you with calculations.");
        let roles: Vec<Role> = agent.transcript().iter().map(Message::role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn executes_tool_then_replies() {
        let mut agent = Agent::new(Arc::new(ScriptedModel)).with_tools(calculator_tools());

        let reply = agent.run("Please calculate 25 * 4 for me.").await;

        assert_eq!(reply, "The result of the calculation is 100");
        let transcript = agent.transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1].content(), "100");
        assert_eq!(transcript[1].tool_name(), Some("calculator"));
    }

    #[tokio::test]
    async fn unrouted_decision_is_surfaced_but_not_recorded() {
        let raw = r#"{"thought": "search the web", "tool": "search"}"#;
        let mut agent = Agent::new(QueuedModel::new(&[raw])).with_tools(calculator_tools());

        assert_eq!(agent.run("find rust").await, raw);
        assert_eq!(agent.memory().len(), 1);
    }

    #[tokio::test]
    async fn unrouted_decision_can_be_recorded() {
        let raw = r#"{"thought": "nothing to do"}"#;
        let settings = AgentSettings {
            record_unrouted_decisions: true,
            ..AgentSettings::default()
        };
        let mut agent = Agent::new(QueuedModel::new(&[raw])).with_settings(&settings);

        assert_eq!(agent.run("hi").await, raw);
        assert_eq!(agent.memory().len(), 2);
        assert_eq!(agent.memory().last().map(Message::content), Some(raw));
    }

    #[tokio::test]
    async fn missing_tool_input_defaults_to_empty_arguments() {
        let model = QueuedModel::new(&[r#"{"tool": "calculator"}"#, "done"]);
        let mut agent = Agent::new(model).with_tools(calculator_tools());

        assert_eq!(agent.run("calculate").await, "done");
        assert_eq!(
            agent.transcript()[1].content(),
            "Error executing calculation: missing `expression` argument"
        );
    }

    #[tokio::test]
    async fn model_failure_becomes_text() {
        let mut agent = Agent::new(QueuedModel::new(&[])).with_tools(calculator_tools());

        assert_eq!(agent.run("hi").await, "Error: language model error: offline");
        assert_eq!(agent.memory().len(), 1);
    }

    #[tokio::test]
    async fn model_failure_after_tool_keeps_tool_turn() {
        let model = QueuedModel::new(&[r#"{"tool":"calculator","tool_input":{"expression":"1+1"}}"#]);
        let mut agent = Agent::new(model).with_tools(calculator_tools());

        assert_eq!(agent.run("add").await, "Error: language model error: offline");
        let roles: Vec<Role> = agent.transcript().iter().map(Message::role).collect();
        assert_eq!(roles, vec![Role::User, Role::Tool]);
        assert_eq!(agent.transcript()[1].content(), "2");
    }

    #[tokio::test]
    async fn system_message_lists_tools_but_is_not_stored() {
        #[derive(Default)]
        struct RecordingModel {
            prompts: Mutex<Vec<Message>>,
        }

        #[async_trait]
        impl LanguageModel for RecordingModel {
            async fn generate(&self, history: &[Message]) -> Result<String> {
                self.prompts.lock().unwrap().push(history[0].clone());
                Ok("ok".into())
            }
        }

        let model = Arc::new(RecordingModel::default());
        let mut agent = Agent::new(model.clone())
            .with_system_prompt("Be precise.")
            .with_tools(calculator_tools());

        agent.run("ping").await;

        let prompts = model.prompts.lock().unwrap();
        let system = prompts.first().expect("prompt captured");
        assert_eq!(system.role(), Role::System);
        assert!(system.content().starts_with("Be precise."));
        assert!(system.content().contains("- calculator: Useful for performing"));
        assert!(system.content().contains("\"required\":[\"expression\"]"));
        assert!(agent.transcript().iter().all(|m| m.role() != Role::System));
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AgentHook for Recorder {
        async fn on_user_query(&self, query: &str) {
            self.events.lock().unwrap().push(format!("user:{query}"));
        }

        async fn on_thought(&self, _thought: &str) {
            self.events.lock().unwrap().push("thought".into());
        }

        async fn on_tool_call(&self, name: &str, input: &Value) {
            self.events.lock().unwrap().push(format!("call:{name}:{input}"));
        }

        async fn on_tool_output(&self, _name: &str, output: &str) {
            self.events.lock().unwrap().push(format!("output:{output}"));
        }

        async fn on_response(&self, response: &str) {
            self.events.lock().unwrap().push(format!("response:{response}"));
        }
    }

    #[tokio::test]
    async fn hooks_observe_each_phase_in_order() {
        let recorder = Arc::new(Recorder::default());
        let mut agent = Agent::new(Arc::new(ScriptedModel))
            .with_tools(calculator_tools())
            .with_hook(recorder.clone());

        agent.run("calculate please").await;

        let events = recorder.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "user:calculate please".to_string(),
                "thought".to_string(),
                format!("call:calculator:{}", json!({"expression": "25 * 4"})),
                "output:100".to_string(),
                "response:The result of the calculation is 100".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn missing_thought_skips_thought_hook() {
        let model = QueuedModel::new(&[
            r#"{"tool": "calculator", "tool_input": {"expression": "2 ** 3"}}"#,
            "eight",
        ]);
        let recorder = Arc::new(Recorder::default());
        let mut agent = Agent::new(model)
            .with_tools(calculator_tools())
            .with_hook(recorder.clone());

        agent.run("cube two").await;

        let events = recorder.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "user:cube two".to_string(),
                format!("call:calculator:{}", json!({"expression": "2 ** 3"})),
                "output:8".to_string(),
                "response:eight".to_string(),
            ]
        );
    }
}
