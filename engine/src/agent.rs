//! A small tool-calling loop around a [`ChatModel`].
//!
//! The model is asked to answer the user prompt; whenever it calls a tool
//! the result (or a retry prompt) is fed back, until it replies with plain
//! text. Each tool has its own [`RetryTracker`]; once a tool fails more
//! often than the retry budget allows, the run is aborted.

use std::collections::HashMap;

use log::{debug, info, warn};
use serde_json::Value;
use thiserror::Error;

use crate::{
    ChatModelBox,
    llm::{Message, OutputMessage, Request, ToolCall},
};

pub mod image_tool;
pub mod retry;
pub mod tool;

pub use image_tool::GenerateImageTool;
pub use retry::{RetryTracker, ToolCallState};
pub use tool::{Tool, ToolBox, ToolError};

pub const DEFAULT_RETRIES: usize = 2;
pub const DEFAULT_REQUEST_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// How often a single tool may fail and still be called again.
    pub retries: usize,
    /// Upper bound on model requests per run.
    pub request_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            request_limit: DEFAULT_REQUEST_LIMIT,
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Tool '{tool}' exceeded max retries count of {max_retries}: {last_error}")]
    RetriesExhausted {
        tool: String,
        max_retries: usize,
        last_error: String,
    },

    #[error("Tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Model request failed: {0:#}")]
    Model(color_eyre::Report),

    #[error("The next request would exceed the request limit of {0}")]
    RequestLimit(usize),

    #[error("The model replied with neither text nor tool calls")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub requests: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl Usage {
    fn record(&mut self, msg: &OutputMessage) {
        self.requests += 1;
        self.input_tokens += msg.input_tokens;
        self.output_tokens += msg.output_tokens;
    }
}

#[derive(Debug)]
pub struct AgentRun {
    /// The model's final text reply.
    pub output: String,
    /// Successful tool results in call order, keyed by tool name.
    pub tool_outputs: Vec<(String, Value)>,
    pub usage: Usage,
    pub messages: Vec<Message>,
}

pub struct Agent {
    model: ChatModelBox,
    instructions: String,
    tools: Vec<ToolBox>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(model: ChatModelBox, instructions: impl Into<String>, config: AgentConfig) -> Self {
        Self {
            model,
            instructions: instructions.into(),
            tools: vec![],
            config,
        }
    }

    pub fn with_tool(mut self, tool: impl Tool + Send + Sync + 'static) -> Self {
        self.tools.push(Box::new(tool));
        self
    }

    fn tool(&self, name: &str) -> Option<&ToolBox> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub async fn run(&self, user_prompt: &str) -> Result<AgentRun, AgentError> {
        let mut req = Request {
            system: Some(self.instructions.clone()),
            messages: vec![Message::user(user_prompt)],
            tools: self.tools.iter().map(|t| t.definition()).collect(),
        };
        let mut trackers: HashMap<String, RetryTracker> = HashMap::new();
        let mut usage = Usage::default();
        let mut tool_outputs = vec![];

        loop {
            if usage.requests >= self.config.request_limit {
                return Err(AgentError::RequestLimit(self.config.request_limit));
            }

            let out = self.model.complete(&req).await.map_err(AgentError::Model)?;
            usage.record(&out);
            debug!(
                "Model request #{}: {} tool calls, usage so far {usage:?}",
                usage.requests,
                out.tool_calls.len()
            );

            if out.tool_calls.is_empty() {
                let text = out.text.ok_or(AgentError::EmptyResponse)?;
                req.messages.push(Message::Assistant {
                    text: Some(text.clone()),
                    tool_calls: vec![],
                });
                info!("Agent finished after {} requests", usage.requests);
                return Ok(AgentRun {
                    output: text,
                    tool_outputs,
                    usage,
                    messages: req.messages,
                });
            }

            req.messages.push(Message::Assistant {
                text: out.text,
                tool_calls: out.tool_calls.clone(),
            });

            for call in out.tool_calls {
                let tracker = trackers
                    .entry(call.name.clone())
                    .or_insert_with(|| RetryTracker::new(self.config.retries));
                tracker.invoke();

                match self.call_tool(&call).await {
                    Ok(value) => {
                        tracker.succeed();
                        req.messages
                            .push(Message::tool_result(&call.id, value.to_string()));
                        tool_outputs.push((call.name, value));
                    }
                    Err(ToolError::Retryable(msg)) => {
                        if tracker.fail() == ToolCallState::ExhaustedFailure {
                            return Err(AgentError::RetriesExhausted {
                                tool: call.name,
                                max_retries: tracker.max_retries(),
                                last_error: msg,
                            });
                        }
                        warn!(
                            "Tool '{}' failed (retry {}/{}): {msg}",
                            call.name,
                            tracker.retries(),
                            tracker.max_retries()
                        );
                        req.messages.push(Message::tool_result(
                            &call.id,
                            format!("{msg}\n\nFix the errors and try again."),
                        ));
                    }
                    Err(ToolError::Fatal(message)) => {
                        return Err(AgentError::ToolFailed {
                            tool: call.name,
                            message,
                        });
                    }
                }
            }
        }
    }

    async fn call_tool(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let Some(tool) = self.tool(&call.name) else {
            let available: Vec<_> = self.tools.iter().map(|t| t.name()).collect();
            return Err(ToolError::Retryable(format!(
                "Unknown tool name: '{}'. Available tools: {}",
                call.name,
                available.join(", ")
            )));
        };

        let args = if call.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&call.arguments).map_err(|e| {
                ToolError::Retryable(format!("Arguments are not valid JSON: {e}"))
            })?
        };

        debug!("Calling tool '{}' with {args}", call.name);
        tool.call(args).await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        pin::Pin,
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use axum::{Router, http::StatusCode, routing::post};
    use color_eyre::Result;
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::{
        image_model::{InferenceClient, InferenceConfig, SamplingParams},
        llm::{ChatModel, ToolDefinition},
        pipeline::Pipeline,
        test_util::{TXT2IMG_PATH, serve},
    };

    use super::tool::ToolResult;

    /// Replies from a fixed script, repeating the last reply once the
    /// script runs out. Records the messages of every request.
    #[derive(Clone)]
    struct ScriptedModel {
        replies: Arc<Mutex<VecDeque<OutputMessage>>>,
        seen: Arc<Mutex<Vec<Vec<Message>>>>,
    }

    impl ScriptedModel {
        fn new(replies: impl IntoIterator<Item = OutputMessage>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into_iter().collect())),
                seen: Arc::default(),
            }
        }

        fn requests(&self) -> Vec<Vec<Message>> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl ChatModel for ScriptedModel {
        fn complete<'a>(
            &'a self,
            req: &'a Request,
        ) -> Pin<Box<dyn Future<Output = Result<OutputMessage>> + Send + 'a>> {
            self.seen.lock().unwrap().push(req.messages.clone());
            let mut replies = self.replies.lock().unwrap();
            let reply = if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            };
            Box::pin(async move { reply.ok_or_else(|| color_eyre::eyre::eyre!("script is empty")) })
        }

        fn clone(&self) -> Box<dyn ChatModel + Send + Sync + 'static> {
            Box::new(Clone::clone(self))
        }
    }

    fn call(id: &str, name: &str, arguments: &str) -> OutputMessage {
        OutputMessage {
            input_tokens: 10,
            output_tokens: 5,
            text: None,
            tool_calls: vec![ToolCall {
                id: id.into(),
                name: name.into(),
                arguments: arguments.into(),
            }],
        }
    }

    fn text(t: &str) -> OutputMessage {
        OutputMessage {
            input_tokens: 3,
            output_tokens: 2,
            text: Some(t.into()),
            tool_calls: vec![],
        }
    }

    const ARGS: &str = r#"{"prompt":"a red ball","negative_prompt":"blurry"}"#;

    /// Fails `failures` times, then returns the arguments it was given.
    struct FlakyTool {
        failures: usize,
        calls: Arc<AtomicUsize>,
        error: ToolError,
    }

    impl FlakyTool {
        fn new(failures: usize, error: ToolError) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let tool = Self {
                failures,
                calls: calls.clone(),
                error,
            };
            (tool, calls)
        }

        fn always_failing() -> (Self, Arc<AtomicUsize>) {
            Self::new(
                usize::MAX,
                ToolError::Retryable("HTTP error 500: server overloaded".into()),
            )
        }
    }

    impl Tool for FlakyTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "generate_image".into(),
                description: "test".into(),
                parameters: json!({"type": "object"}),
            }
        }

        fn call<'a>(&'a self, args: Value) -> Pin<Box<dyn Future<Output = ToolResult> + Send + 'a>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok(args)
            };
            Box::pin(async move { result })
        }
    }

    fn agent(model: &ScriptedModel, retries: usize) -> Agent {
        Agent::new(
            ChatModel::clone(model),
            "You make pictures",
            AgentConfig {
                retries,
                request_limit: DEFAULT_REQUEST_LIMIT,
            },
        )
    }

    #[tokio::test]
    async fn tool_result_is_fed_back_until_text_reply() {
        let model = ScriptedModel::new([call("c1", "generate_image", ARGS), text("Here you go")]);
        let (tool, calls) = FlakyTool::new(0, ToolError::Fatal("unused".into()));

        let run = agent(&model, 2).with_tool(tool).run("Draw").await.unwrap();

        assert_eq!(run.output, "Here you go");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(run.tool_outputs.len(), 1);
        assert_eq!(run.tool_outputs[0].0, "generate_image");
        assert_eq!(run.tool_outputs[0].1["prompt"], "a red ball");
        assert_eq!(
            run.usage,
            Usage {
                requests: 2,
                input_tokens: 13,
                output_tokens: 7
            }
        );

        let requests = model.requests();
        let second_request = &requests[1];
        assert_eq!(second_request.len(), 3);
        let Message::ToolResult {
            tool_call_id,
            content,
        } = &second_request[2]
        else {
            panic!("expected a tool result");
        };
        assert_eq!(tool_call_id, "c1");
        assert_eq!(
            serde_json::from_str::<Value>(content).unwrap(),
            json!({"prompt": "a red ball", "negative_prompt": "blurry"})
        );
        assert_eq!(run.messages.len(), 4);
    }

    #[tokio::test]
    async fn always_failing_tool_is_called_retries_plus_one_times() {
        let model = ScriptedModel::new([call("c", "generate_image", ARGS)]);
        let (tool, calls) = FlakyTool::always_failing();

        let err = agent(&model, 2).with_tool(tool).run("Draw").await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(model.requests().len(), 3);
        match err {
            AgentError::RetriesExhausted {
                tool,
                max_retries,
                last_error,
            } => {
                assert_eq!(tool, "generate_image");
                assert_eq!(max_retries, 2);
                assert_eq!(last_error, "HTTP error 500: server overloaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_prompt_carries_the_diagnostic() {
        let model = ScriptedModel::new([
            call("c1", "generate_image", ARGS),
            call("c2", "generate_image", ARGS),
            text("Done"),
        ]);
        let (tool, calls) = FlakyTool::new(
            1,
            ToolError::Retryable("Connection timed out! Check if the Stable Diffusion server is running.".into()),
        );

        let run = agent(&model, 2).with_tool(tool).run("Draw").await.unwrap();

        assert_eq!(run.output, "Done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let requests = model.requests();
        let second_request = &requests[1];
        assert_eq!(
            second_request.last().unwrap(),
            &Message::tool_result(
                "c1",
                "Connection timed out! Check if the Stable Diffusion server is running.\n\nFix the errors and try again."
            )
        );
    }

    #[tokio::test]
    async fn invalid_json_arguments_count_as_a_retry() {
        let model = ScriptedModel::new([call("c", "generate_image", "{not json")]);
        let (tool, calls) = FlakyTool::new(0, ToolError::Fatal("unused".into()));

        let err = agent(&model, 1).with_tool(tool).run("Draw").await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(model.requests().len(), 2);
        assert!(
            matches!(&err, AgentError::RetriesExhausted { last_error, .. } if last_error.contains("not valid JSON")),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn unknown_tool_gets_a_retry_prompt() {
        let model = ScriptedModel::new([call("c1", "paint", "{}"), text("Sorry")]);
        let (tool, _) = FlakyTool::new(0, ToolError::Fatal("unused".into()));

        let run = agent(&model, 2).with_tool(tool).run("Draw").await.unwrap();

        assert_eq!(run.output, "Sorry");
        let requests = model.requests();
        let Message::ToolResult { content, .. } = &requests[1][2] else {
            panic!("expected a tool result");
        };
        assert!(content.starts_with("Unknown tool name: 'paint'. Available tools: generate_image"));
    }

    #[tokio::test]
    async fn fatal_tool_error_ends_the_run() {
        let model = ScriptedModel::new([call("c", "generate_image", ARGS)]);
        let (tool, calls) = FlakyTool::new(usize::MAX, ToolError::Fatal("disk on fire".into()));

        let err = agent(&model, 2).with_tool(tool).run("Draw").await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, AgentError::ToolFailed { message, .. } if message == "disk on fire"));
    }

    #[tokio::test]
    async fn request_limit_stops_endless_tool_use() {
        let model = ScriptedModel::new([call("c", "generate_image", ARGS)]);
        let (tool, calls) = FlakyTool::new(0, ToolError::Fatal("unused".into()));
        let agent = Agent::new(
            ChatModel::clone(&model),
            "You make pictures",
            AgentConfig {
                retries: 2,
                request_limit: 4,
            },
        )
        .with_tool(tool);

        let err = agent.run("Draw").await.unwrap_err();

        assert!(matches!(err, AgentError::RequestLimit(4)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn empty_reply_is_an_error() {
        let model = ScriptedModel::new([OutputMessage::default()]);

        let err = agent(&model, 2).run("Draw").await.unwrap_err();

        assert!(matches!(err, AgentError::EmptyResponse));
    }

    #[tokio::test]
    async fn image_tool_against_failing_service_exhausts_retries() -> Result<()> {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in_handler = hits.clone();
        let router = Router::new().route(
            TXT2IMG_PATH,
            post(move || async move {
                hits_in_handler.fetch_add(1, Ordering::SeqCst);
                (StatusCode::INTERNAL_SERVER_ERROR, "server overloaded")
            }),
        );
        let dir = tempdir()?;
        let client = InferenceClient::new(InferenceConfig {
            endpoint: serve(router).await,
            timeout: Duration::from_secs(5),
            ..Default::default()
        })?;
        let pipeline = Pipeline::new(client, SamplingParams::default(), dir.path().into());
        let model = ScriptedModel::new([call("c", image_tool::NAME, ARGS)]);

        let err = agent(&model, 2)
            .with_tool(GenerateImageTool::new(pipeline, "disaster-girl"))
            .run("Draw")
            .await
            .unwrap_err();

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(
            err.to_string(),
            "Tool 'generate_image' exceeded max retries count of 2: HTTP error 500: server overloaded"
        );
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }
}
