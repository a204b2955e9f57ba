use crate::llm;
use crate::{Error, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestSystemMessageContent,
        ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
        ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, FunctionCall, FunctionObjectArgs, Role,
    },
};
use async_trait::async_trait;

pub struct OpenAI {
    model: String,
    client: Client<OpenAIConfig>,
}

impl OpenAI {
    pub fn new(api_key: &str, model: String) -> Self {
        Self::with_config(OpenAIConfig::new().with_api_key(api_key), model)
    }

    /// Client for a custom config, e.g. a different api base.
    pub fn with_config(config: OpenAIConfig, model: String) -> Self {
        Self {
            model,
            client: Client::with_config(config),
        }
    }

    fn chat_request(
        &self,
        request: &llm::CompletionRequest<'_>,
    ) -> Result<CreateChatCompletionRequest> {
        let mut completion = CreateChatCompletionRequestArgs::default();
        completion.model(&self.model).messages(
            request
                .messages
                .iter()
                .map(ChatCompletionRequestMessage::try_from)
                .collect::<Result<Vec<_>>>()?,
        );

        // the api rejects an empty tools array
        if !request.tools.is_empty() {
            completion.tools(
                request
                    .tools
                    .iter()
                    .map(ChatCompletionTool::try_from)
                    .collect::<Result<Vec<_>>>()?,
            );
        }

        Ok(completion.build()?)
    }
}

fn completion_response(res: &CreateChatCompletionResponse) -> Result<llm::CompletionResponse> {
    let choice = res
        .choices
        .first()
        .ok_or(Error::LLMResponseError("choices is empty".to_string()))?;

    if choice.message.role != Role::Assistant {
        return Err(Error::LLMResponseError(
            "expected role to be assistant".to_string(),
        ));
    }

    let tool_calls: Vec<_> = choice
        .message
        .tool_calls
        .iter()
        .flat_map(|calls| {
            calls.iter().map(|call| crate::tools::ToolCall {
                id: call.id.clone(),
                name: call.function.name.clone(),
                args: call.function.arguments.clone(),
            })
        })
        .collect();

    let content = match &choice.message.content {
        Some(content) => content.clone(),
        None if !tool_calls.is_empty() => String::new(),
        None => return Err(Error::LLMResponseError("content is empty".to_string())),
    };

    Ok(llm::CompletionResponse {
        content,
        tool_calls,
    })
}

impl TryFrom<&llm::Message> for ChatCompletionRequestMessage {
    type Error = Error;

    fn try_from(msg: &llm::Message) -> Result<Self> {
        match msg {
            llm::Message::User(msg) => Ok(ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(msg.clone()),
                    name: None,
                },
            )),
            llm::Message::System(msg) => Ok(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.clone()),
                    name: None,
                },
            )),
            llm::Message::Tool { id, result, .. } => Ok(ChatCompletionRequestMessage::Tool(
                ChatCompletionRequestToolMessage {
                    content: ChatCompletionRequestToolMessageContent::Text(result.clone()),
                    tool_call_id: id.clone(),
                },
            )),
            llm::Message::Assistant(msg, tool_calls) => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                args.content(ChatCompletionRequestAssistantMessageContent::Text(
                    msg.clone(),
                ));
                if !tool_calls.is_empty() {
                    args.tool_calls(
                        tool_calls
                            .iter()
                            .map(|call| ChatCompletionMessageToolCall {
                                id: call.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: call.name.clone(),
                                    arguments: call.args.clone(),
                                },
                            })
                            .collect::<Vec<_>>(),
                    );
                }
                Ok(ChatCompletionRequestMessage::Assistant(args.build()?))
            }
        }
    }
}

impl TryFrom<&crate::tools::ToolDefinition> for ChatCompletionTool {
    type Error = Error;

    fn try_from(tool: &crate::tools::ToolDefinition) -> Result<Self> {
        let res = ChatCompletionToolArgs::default()
            .function(
                FunctionObjectArgs::default()
                    .name(tool.name.clone())
                    .description(tool.desc.clone())
                    .parameters(tool.params.clone())
                    .build()?,
            )
            .build()?;

        Ok(res)
    }
}

#[async_trait]
impl llm::LLM for OpenAI {
    async fn completion<'a>(
        &self,
        request: llm::CompletionRequest<'a>,
    ) -> Result<llm::CompletionResponse> {
        let completion = self.chat_request(&request)?;
        let res = self.client.chat().create(completion).await?;
        completion_response(&res)
    }
}

#[cfg(test)]
mod tests {
    use super::OpenAI;
    use crate::llm::{CompletionRequest, LLM, Message};
    use crate::tools::{QueryArgs, ToolDefinition};
    use crate::{Error, Result};
    use async_openai::config::OpenAIConfig;
    use httpmock::prelude::*;
    use serde_json::{Value, json};

    fn client(server: &MockServer) -> OpenAI {
        OpenAI::with_config(
            OpenAIConfig::new()
                .with_api_key("sk-test")
                .with_api_base(server.url("/v1")),
            "gpt-4o".to_string(),
        )
    }

    fn chat_response(message: Value) -> Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": message,
                "finish_reason": "stop",
                "logprobs": null
            }]
        })
    }

    #[test]
    fn test_chat_request_omits_empty_tools() -> Result<()> {
        let llm = OpenAI::new("sk-test", "gpt-4o".to_string());
        let messages = vec![Message::User("hi".to_string())];

        let request = llm.chat_request(&CompletionRequest {
            messages: &messages,
            tools: &[],
        })?;
        assert!(request.tools.is_none());

        let tools = vec![ToolDefinition::new::<QueryArgs>("search", "web search")?];
        let request = llm.chat_request(&CompletionRequest {
            messages: &messages,
            tools: &tools,
        })?;
        assert_eq!(request.tools.map(|t| t.len()), Some(1));

        Ok(())
    }

    #[tokio::test]
    async fn test_completion_tool_calls_without_content() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(chat_response(json!({
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "search", "arguments": "{\"query\":\"rust\"}"}
                    }]
                })));
            })
            .await;

        let messages = vec![Message::User("what is rust".to_string())];
        let res = client(&server)
            .completion(CompletionRequest {
                messages: &messages,
                tools: &[],
            })
            .await?;

        mock.assert_async().await;
        assert_eq!(res.content, "");
        assert_eq!(res.tool_calls.len(), 1);
        assert_eq!(res.tool_calls[0].id, "call_1");
        assert_eq!(res.tool_calls[0].name, "search");
        assert_eq!(res.tool_calls[0].args, "{\"query\":\"rust\"}");

        Ok(())
    }

    #[tokio::test]
    async fn test_completion_text_answer() -> Result<()> {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(chat_response(json!({
                    "role": "assistant",
                    "content": "Rust is a systems language."
                })));
            })
            .await;

        let messages = vec![Message::User("what is rust".to_string())];
        let res = client(&server)
            .completion(CompletionRequest {
                messages: &messages,
                tools: &[],
            })
            .await?;

        assert_eq!(res.content, "Rust is a systems language.");
        assert!(res.tool_calls.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_completion_rejects_non_assistant_role() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(chat_response(json!({
                    "role": "user",
                    "content": "echo"
                })));
            })
            .await;

        let messages = vec![Message::User("what is rust".to_string())];
        let err = client(&server)
            .completion(CompletionRequest {
                messages: &messages,
                tools: &[],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::LLMResponseError(_)));
    }
}
