//! Tools module - toolkits agents can call.
//!
//! - Calculator: arithmetic over a small expression grammar

pub mod calculator;
pub mod expression;

pub use calculator::{CalculatorTool, CALCULATOR_TOOL_NAME};
pub use expression::{CalculationError, Number};
