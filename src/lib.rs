//! A minimal think → act → observe agent loop.
//!
//! The crate provides:
//! - A language model abstraction (`LanguageModel`) with a fixed-rule `ScriptedModel`.
//! - A tool interface (`Tool` and `ToolRegistry`) with an arithmetic `CalculatorTool`.
//! - An `Agent` that asks the model for a JSON decision, runs the named tool and
//!   asks the model again to phrase the result.

mod agent;
mod config;
mod error;
mod hooks;
mod llm;
mod memory;
mod message;
mod telemetry;
mod tool;
pub mod tools;

pub use agent::{Agent, Decision};
pub use config::{AgentSettings, AppConfig, LogFormat, LoggingConfig};
pub use error::{AgentError, Result};
pub use hooks::{AgentHook, ConsoleNarrator};
pub use llm::{LanguageModel, ScriptedModel, CAPABILITY_REPLY, FALLBACK_REPLY, RESULT_PREFIX};
pub use memory::ConversationMemory;
pub use message::{Message, Role};
pub use telemetry::init_tracing;
pub use tool::{Tool, ToolDescription, ToolRegistry};
pub use tools::{CalculationError, CalculatorTool, CALCULATOR_TOOL_NAME};
