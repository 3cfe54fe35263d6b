use std::pin::Pin;

use log::warn;
use serde::Deserialize;
use serde_json::{Value, json};

use super::tool::{Tool, ToolDefinition, ToolError, ToolResult, parse_args};
use crate::pipeline::Pipeline;

pub const NAME: &str = "generate_image";

#[derive(Debug, Deserialize)]
pub struct GenerateImageArgs {
    /// What to generate.
    pub prompt: String,
    /// What to avoid.
    pub negative_prompt: String,
}

/// Exposes the generation pipeline to a model. Every pipeline failure comes
/// back as [`ToolError::Retryable`] carrying the diagnostic text.
#[derive(Debug, Clone)]
pub struct GenerateImageTool {
    pipeline: Pipeline,
    prefix: String,
}

impl GenerateImageTool {
    pub fn new(pipeline: Pipeline, prefix: impl Into<String>) -> Self {
        Self {
            pipeline,
            prefix: prefix.into(),
        }
    }
}

impl Tool for GenerateImageTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.into(),
            description: "Generate an image using Stable Diffusion.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "The positive prompt describing what to generate."
                    },
                    "negative_prompt": {
                        "type": "string",
                        "description": "The negative prompt describing what to avoid."
                    }
                },
                "required": ["prompt", "negative_prompt"],
                "additionalProperties": false
            }),
        }
    }

    fn call<'a>(&'a self, args: Value) -> Pin<Box<dyn Future<Output = ToolResult> + Send + 'a>> {
        Box::pin(async move {
            let args: GenerateImageArgs = parse_args(args)?;
            let path = self
                .pipeline
                .generate(&args.prompt, &args.negative_prompt, &self.prefix)
                .await
                .map_err(|e| {
                    warn!("{NAME} failed: {e}");
                    ToolError::Retryable(e.to_string())
                })?;
            Ok(json!({ "file_path": path.display().to_string() }))
        })
    }
}
