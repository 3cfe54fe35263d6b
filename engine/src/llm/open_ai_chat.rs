use color_eyre::{
    Result,
    eyre::{WrapErr as _, eyre},
};
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatModel, Message, OutputMessage, Request, ToolCall, ToolDefinition};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAIChat {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIChat {
    pub fn new(api_key: String, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn send(&self, req: &Request) -> Result<OutputMessage> {
        let body = OpenAIChatRequest::build(&self.model, req);

        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .wrap_err("sending chat completion request")?;

        let status = res.status();
        let text = res.text().await.wrap_err("reading chat completion")?;
        if !status.is_success() {
            return Err(eyre!("OpenAI error {status}: {text}"));
        }
        debug!("OpenAI response:\n{text}");

        let parsed: OpenAIChatResponse =
            serde_json::from_str(&text).wrap_err("parsing chat completion")?;
        parsed.into_output()
    }
}

impl ChatModel for OpenAIChat {
    fn complete<'a>(
        &'a self,
        req: &'a Request,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<OutputMessage>> + Send + 'a>> {
        Box::pin(self.send(req))
    }

    fn clone(&self) -> Box<dyn ChatModel + Send + Sync + 'static> {
        Box::new(Clone::clone(self))
    }
}

//
// ===== OpenAI wire types =====
//

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAITool<'a>>,
}

impl<'a> OpenAIChatRequest<'a> {
    fn build(model: &'a str, req: &'a Request) -> Self {
        let mut messages = Vec::new();

        if let Some(system) = &req.system {
            messages.push(OpenAIMessage::text("system", system.clone()));
        }

        for msg in &req.messages {
            messages.push(match msg {
                Message::User(text) => OpenAIMessage::text("user", text.clone()),
                Message::Assistant { text, tool_calls } => OpenAIMessage {
                    role: "assistant",
                    content: text.clone(),
                    tool_calls: tool_calls.iter().map(OpenAIToolCall::from).collect(),
                    tool_call_id: None,
                },
                Message::ToolResult {
                    tool_call_id,
                    content,
                } => OpenAIMessage {
                    role: "tool",
                    content: Some(content.clone()),
                    tool_calls: vec![],
                    tool_call_id: Some(tool_call_id.clone()),
                },
            });
        }

        let tools = req
            .tools
            .iter()
            .map(|function| OpenAITool {
                kind: "function",
                function,
            })
            .collect();

        Self {
            model,
            messages,
            tools,
        }
    }
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OpenAIToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenAIMessage {
    fn text(role: &'static str, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: vec![],
            tool_call_id: None,
        }
    }
}

#[derive(Serialize)]
struct OpenAITool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDefinition,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type", default)]
    kind: String,
    function: OpenAIFunctionCall,
}

impl From<&ToolCall> for OpenAIToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: "function".into(),
            function: OpenAIFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

impl OpenAIChatResponse {
    fn into_output(self) -> Result<OutputMessage> {
        let usage = self.usage.unwrap_or_default();
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| eyre!("OpenAI response without choices"))?;

        Ok(OutputMessage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            text: choice.message.content.filter(|t| !t.is_empty()),
            tool_calls: choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments: tc.function.arguments,
                })
                .collect(),
        })
    }
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Deserialize, Default)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}
