//! Language model abstraction and the scripted backend used by the demo.

use async_trait::async_trait;
use serde_json::json;

use crate::agent::Decision;
use crate::error::Result;
use crate::message::{Message, Role};
use crate::tools::CALCULATOR_TOOL_NAME;

/// Minimal abstraction around a text-completion provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, history: &[Message]) -> Result<String>;
}

pub const CAPABILITY_REPLY: &str = "I am a simple agent. I can help you with calculations.";
pub const FALLBACK_REPLY: &str = "I don't know what to do.";
pub const RESULT_PREFIX: &str = "The result of the calculation is ";

/// A fixed-rule model that only looks at the last message.
///
/// Asking it to "calculate" anything always yields a calculator call for
/// `25 * 4`; it does not extract arguments from the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedModel;

impl ScriptedModel {
    pub fn new() -> Self {
        Self
    }

    fn calculator_decision() -> Result<String> {
        let decision = Decision {
            thought: Some(
                "The user wants to calculate something. I should use the calculator tool."
                    .into(),
            ),
            tool: Some(CALCULATOR_TOOL_NAME.into()),
            tool_input: Some(json!({ "expression": "25 * 4" })),
        };
        Ok(serde_json::to_string(&decision)?)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, history: &[Message]) -> Result<String> {
        let Some(last) = history.last() else {
            return Ok(FALLBACK_REPLY.to_string());
        };

        match last.role() {
            Role::User if last.content().to_lowercase().contains("calculate") => {
                Self::calculator_decision()
            }
            Role::User => Ok(CAPABILITY_REPLY.to_string()),
            Role::Tool => Ok(format!("{RESULT_PREFIX}{}", last.content())),
            Role::System | Role::Assistant => Ok(FALLBACK_REPLY.to_string()),
        }
    }
}
