use crate::llm::ChatModel;

pub mod agent;
pub mod codec;
pub mod image_model;
pub mod llm;
pub mod naming;
pub mod pipeline;

pub type ChatModelBox = Box<dyn ChatModel + Send + Sync>;

pub use agent::{Agent, AgentConfig, AgentError, GenerateImageTool};
pub use image_model::{ClientError, InferenceClient, InferenceConfig, SamplingParams};
pub use pipeline::{GenerationError, Pipeline, ensure_output_dir};

#[cfg(test)]
mod test_util;
