//! Calculator tool.
//!
//! Evaluates a single arithmetic expression. Every failure is reported in the
//! returned text so the agent can hand it straight back to the model.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::Result;
use crate::tool::Tool;
use crate::tools::expression::{evaluate, CalculationError};

pub const CALCULATOR_TOOL_NAME: &str = "calculator";

const ALLOWED_CHARACTERS: &str = "0123456789+-*/(). ";
const INVALID_CHARACTERS: &str = "Error: Invalid characters in expression.";

#[derive(Debug, Clone, Copy, Default)]
pub struct CalculatorTool;

impl CalculatorTool {
    /// Check `expression` against the allow-list, then evaluate it.
    pub fn evaluate(&self, expression: &str) -> String {
        if let Some(rejected) = expression
            .chars()
            .find(|c| !ALLOWED_CHARACTERS.contains(*c))
        {
            debug!(%expression, %rejected, "expression rejected by allow-list");
            return INVALID_CHARACTERS.to_string();
        }

        match evaluate(expression) {
            Ok(value) => value.to_string(),
            Err(err) => {
                debug!(%expression, error = %err, "expression evaluation failed");
                failure(err)
            }
        }
    }
}

fn failure(err: CalculationError) -> String {
    format!("Error executing calculation: {err}")
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        CALCULATOR_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Useful for performing basic arithmetic calculations. Input should be a mathematical expression string."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The mathematical expression to evaluate (e.g., '2 + 2')"
                }
            },
            "required": ["expression"]
        })
    }

    async fn call(&self, input: Value) -> Result<String> {
        let output = match input.get("expression") {
            Some(Value::String(expression)) => self.evaluate(expression),
            Some(_) => failure(CalculationError::ExpressionNotString),
            None => failure(CalculationError::MissingExpression),
        };
        Ok(output)
    }
}
