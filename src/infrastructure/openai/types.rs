//! Wire types for `POST /v1/chat/completions`

use serde::{Deserialize, Serialize};

use crate::domain::models::{ChatMessage, ToolDefinition};

/// Request body; borrows the history so retries don't clone it
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],

    #[serde(skip_serializing_if = "<[ToolDefinition]>::is_empty")]
    pub tools: &'a [ToolDefinition],

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<&'static str>,
}

impl<'a> ChatCompletionRequest<'a> {
    /// Build a request; `tool_choice` is `"auto"` whenever tools are offered
    pub fn new(model: &'a str, messages: &'a [ChatMessage], tools: &'a [ToolDefinition]) -> Self {
        Self {
            model,
            messages,
            tools,
            tool_choice: (!tools.is_empty()).then_some("auto"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub choices: Vec<Choice>,

    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,

    pub message: ChatMessage,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_tools_when_empty() {
        let messages = vec![ChatMessage::user("hi")];
        let request = ChatCompletionRequest::new("gpt-4o", &messages, &[]);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "gpt-4o");
        assert!(value.get("tools").is_none());
        assert!(value.get("tool_choice").is_none());
    }

    #[test]
    fn test_request_sets_auto_tool_choice() {
        let messages = vec![ChatMessage::user("list my files")];
        let tools = vec![ToolDefinition::function(
            "local__list_files",
            "List files",
            json!({"type": "object", "properties": {}}),
        )];
        let value = serde_json::to_value(ChatCompletionRequest::new("gpt-4o", &messages, &tools))
            .unwrap();

        assert_eq!(value["tool_choice"], "auto");
        assert_eq!(value["tools"][0]["type"], "function");
        assert_eq!(value["tools"][0]["function"]["name"], "local__list_files");
    }

    #[test]
    fn test_response_parsing() {
        let raw = json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "model": "gpt-4o-2024-08-06",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Done."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 2, "total_tokens": 14}
        });

        let response: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.choices[0].message.text_content(), Some("Done."));
        assert_eq!(response.usage.unwrap().total_tokens, 14);
    }
}
