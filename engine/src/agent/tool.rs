use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use crate::llm::ToolDefinition;

pub type ToolResult = Result<Value, ToolError>;
pub type ToolBox = Box<dyn Tool + Send + Sync>;

/// How a tool call went wrong, as seen by the agent driving it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// The call failed, but the model may try again, possibly with
    /// different arguments. The message is shown to the model.
    #[error("{0}")]
    Retryable(String),

    /// The run cannot continue.
    #[error("{0}")]
    Fatal(String),
}

/// Something the model can call. A call runs once; retrying is the
/// agent's decision, not the tool's.
pub trait Tool {
    fn definition(&self) -> ToolDefinition;

    fn call<'a>(&'a self, args: Value) -> Pin<Box<dyn Future<Output = ToolResult> + Send + 'a>>;

    fn name(&self) -> String {
        self.definition().name
    }
}

/// Arguments that don't fit the schema are the model's mistake, so they are
/// worth another attempt.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::Retryable(format!("Invalid arguments: {e}")))
}
