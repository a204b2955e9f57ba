use crate::llm;
use crate::tools::{ToolCall, ToolDefinition};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Claude models through the Anthropic messages api, with tool use.
pub struct Anthropic {
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
    client: Client,
}

impl Anthropic {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            client: Client::new(),
        }
    }

    /// Sets the api url (for proxies or tests).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<RequestMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<RequestTool<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: &'static str,
    content: Vec<RequestBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct RequestTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

impl<'a> From<&'a ToolDefinition> for RequestTool<'a> {
    fn from(tool: &'a ToolDefinition) -> Self {
        Self {
            name: &tool.name,
            description: &tool.desc,
            input_schema: &tool.params,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

/// Splits the history into the system prompt and the alternating user/assistant turns the
/// api expects. Consecutive tool results are folded into a single user turn.
fn convert_messages(messages: &[llm::Message]) -> Result<(Option<String>, Vec<RequestMessage>)> {
    let mut system: Vec<&str> = Vec::new();
    let mut out: Vec<RequestMessage> = Vec::new();

    for msg in messages {
        match msg {
            llm::Message::System(content) => system.push(content),
            llm::Message::User(content) => out.push(RequestMessage {
                role: "user",
                content: vec![RequestBlock::Text {
                    text: content.clone(),
                }],
            }),
            llm::Message::Assistant(content, tool_calls) => {
                let mut blocks = Vec::new();
                if !content.is_empty() {
                    blocks.push(RequestBlock::Text {
                        text: content.clone(),
                    });
                }
                for call in tool_calls {
                    let input = if call.args.trim().is_empty() {
                        Value::Object(Default::default())
                    } else {
                        serde_json::from_str(&call.args)?
                    };
                    blocks.push(RequestBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input,
                    });
                }
                out.push(RequestMessage {
                    role: "assistant",
                    content: blocks,
                });
            }
            llm::Message::Tool { id, result, .. } => {
                let block = RequestBlock::ToolResult {
                    tool_use_id: id.clone(),
                    content: result.clone(),
                };
                match out.last_mut() {
                    Some(last)
                        if last.role == "user"
                            && matches!(last.content.last(), Some(RequestBlock::ToolResult { .. })) =>
                    {
                        last.content.push(block)
                    }
                    _ => out.push(RequestMessage {
                        role: "user",
                        content: vec![block],
                    }),
                }
            }
        }
    }

    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    Ok((system, out))
}

#[async_trait]
impl llm::LLM for Anthropic {
    async fn completion<'a>(
        &self,
        request: llm::CompletionRequest<'a>,
    ) -> Result<llm::CompletionResponse> {
        let (system, messages) = convert_messages(request.messages)?;

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages,
            tools: request.tools.iter().map(RequestTool::from).collect(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", DEFAULT_API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status.as_u16() == 429 {
            return Err(Error::RateLimited);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::ProviderApiError {
                status: status.as_u16(),
                message,
            });
        }

        let response: MessagesResponse = response.json().await?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block {
                ResponseBlock::Text { text } => content.push_str(&text),
                ResponseBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id,
                    name,
                    args: input.to_string(),
                }),
                ResponseBlock::Other => {}
            }
        }

        if content.is_empty() && tool_calls.is_empty() {
            return Err(Error::LLMResponseError(
                "response has no text or tool use".to_string(),
            ));
        }

        Ok(llm::CompletionResponse {
            content,
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Anthropic, RequestBlock, convert_messages};
    use crate::llm::{CompletionRequest, LLM, Message};
    use crate::tools::ToolCall;
    use crate::{Error, Result};
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_convert_messages_groups_tool_results() -> Result<()> {
        let history = vec![
            Message::System("be helpful".to_string()),
            Message::User("what is rust".to_string()),
            Message::Assistant(
                String::new(),
                vec![
                    ToolCall {
                        id: "a".to_string(),
                        name: "search".to_string(),
                        args: "{\"query\":\"rust\"}".to_string(),
                    },
                    ToolCall {
                        id: "b".to_string(),
                        name: "wikipedia".to_string(),
                        args: "{\"query\":\"rust\"}".to_string(),
                    },
                ],
            ),
            Message::Tool {
                id: "a".to_string(),
                name: "search".to_string(),
                result: "r1".to_string(),
            },
            Message::Tool {
                id: "b".to_string(),
                name: "wikipedia".to_string(),
                result: "r2".to_string(),
            },
        ];

        let (system, messages) = convert_messages(&history)?;

        assert_eq!(system.as_deref(), Some("be helpful"));
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[1].content.len(), 2);
        assert_eq!(messages[2].role, "user");
        assert!(
            messages[2]
                .content
                .iter()
                .all(|b| matches!(b, RequestBlock::ToolResult { .. }))
        );
        assert_eq!(messages[2].content.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_completion_parses_text_and_tool_use() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/messages")
                    .header("x-api-key", "key")
                    .json_body_partial(r#"{"model":"claude-test","system":"sys"}"#);
                then.status(200).json_body(json!({
                    "content": [
                        {"type": "text", "text": "looking it up"},
                        {"type": "tool_use", "id": "t1", "name": "search", "input": {"query": "rust"}}
                    ],
                    "stop_reason": "tool_use"
                }));
            })
            .await;

        let llm = Anthropic::new("key", "claude-test").with_api_url(server.url("/v1/messages"));
        let res = llm
            .completion(CompletionRequest {
                messages: &[
                    Message::System("sys".to_string()),
                    Message::User("rust?".to_string()),
                ],
                tools: &[],
            })
            .await?;

        mock.assert_async().await;
        assert_eq!(res.content, "looking it up");
        assert_eq!(res.tool_calls.len(), 1);
        assert_eq!(res.tool_calls[0].name, "search");
        assert_eq!(res.tool_calls[0].args, "{\"query\":\"rust\"}");

        Ok(())
    }

    #[tokio::test]
    async fn test_completion_maps_rate_limit() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(429).body("slow down");
            })
            .await;

        let llm = Anthropic::new("key", "claude-test").with_api_url(server.url("/v1/messages"));
        let res = llm
            .completion(CompletionRequest {
                messages: &[Message::User("hi".to_string())],
                tools: &[],
            })
            .await;

        assert!(matches!(res, Err(Error::RateLimited)));
    }

    #[tokio::test]
    async fn test_completion_maps_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(401).body("invalid x-api-key");
            })
            .await;

        let llm = Anthropic::new("bad", "claude-test").with_api_url(server.url("/v1/messages"));
        let res = llm
            .completion(CompletionRequest {
                messages: &[Message::User("hi".to_string())],
                tools: &[],
            })
            .await;

        assert!(matches!(
            res,
            Err(Error::ProviderApiError { status: 401, message }) if message == "invalid x-api-key"
        ));
    }
}
