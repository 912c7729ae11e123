//! The chat loop that lets the model drive the tool servers

use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::tool_registry::ToolRegistry;
use crate::domain::errors::DomainResult;
use crate::domain::models::{ChatMessage, ToolCall};
use crate::domain::ports::{ChatClient, McpClient, McpError};
use crate::infrastructure::logging::AuditLogger;

pub const SYSTEM_PROMPT: &str =
    "You are Filesystem-GPT. Always use the provided tools for file operations instead of guessing.";

/// Reply when the step limit is reached without a text answer
pub const FALLBACK_REPLY: &str = "Sorry, I couldn't complete that request.";

/// Conversational assistant.
///
/// Keeps the transcript across prompts. Each prompt may take up to
/// `max_steps` model calls; tool calls requested in between are executed
/// through the MCP client and their results appended to the transcript.
pub struct Assistant {
    chat: Arc<dyn ChatClient>,
    mcp: Arc<dyn McpClient>,
    registry: ToolRegistry,
    history: Vec<ChatMessage>,
    max_steps: usize,
    audit: Option<AuditLogger>,
}

impl Assistant {
    pub fn new(
        chat: Arc<dyn ChatClient>,
        mcp: Arc<dyn McpClient>,
        registry: ToolRegistry,
        max_steps: usize,
    ) -> Self {
        Self {
            chat,
            mcp,
            registry,
            history: vec![ChatMessage::system(SYSTEM_PROMPT)],
            max_steps: max_steps.max(1),
            audit: None,
        }
    }

    /// Record tool calls in the audit trail
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Forget the conversation, keeping only the system prompt
    pub fn reset(&mut self) {
        self.history.truncate(1);
        debug!("Conversation reset");
    }

    /// Answer one user prompt.
    ///
    /// Tool failures are handed back to the model; only chat API failures
    /// are returned as errors, in which case the transcript is restored to
    /// its state before the prompt.
    #[instrument(skip(self, prompt), fields(history = self.history.len()))]
    pub async fn ask(&mut self, prompt: &str) -> DomainResult<String> {
        let checkpoint = self.history.len();
        self.history.push(ChatMessage::user(prompt));

        match self.run_steps().await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                self.history.truncate(checkpoint);
                Err(e)
            }
        }
    }

    async fn run_steps(&mut self) -> DomainResult<String> {
        let definitions = self.registry.definitions();

        for step in 1..=self.max_steps {
            let reply = self.chat.complete(&self.history, &definitions).await?;

            if reply.tool_calls.is_empty() {
                let text = reply.text_content().unwrap_or(FALLBACK_REPLY).to_string();
                debug!(step, "Model answered");
                self.history.push(reply);
                return Ok(text);
            }

            let calls = reply.tool_calls.clone();
            debug!(step, calls = calls.len(), "Model requested tools");
            self.history.push(reply);

            for call in &calls {
                let result = self.run_tool_call(call).await;
                self.history.push(ChatMessage::tool_result(&call.id, result));
            }
        }

        warn!(max_steps = self.max_steps, "Step limit reached without an answer");
        self.history.push(ChatMessage::assistant(FALLBACK_REPLY));
        Ok(FALLBACK_REPLY.to_string())
    }

    /// Execute one tool call; the returned text is what the model sees
    async fn run_tool_call(&self, call: &ToolCall) -> String {
        let name = &call.function.name;
        let Some(tool) = self.registry.resolve(name) else {
            warn!(tool = %name, "Model called an unknown tool");
            return error_result(format!("tool '{name}' not found"));
        };

        let arguments = match parse_arguments(&call.function.arguments) {
            Ok(arguments) => arguments,
            Err(message) => {
                warn!(tool = %name, %message, "Malformed tool arguments");
                return error_result(message);
            }
        };

        info!(server = %tool.server, tool = %tool.info.name, "Calling tool");
        let outcome = self
            .mcp
            .call_tool(&tool.server, &tool.info.name, arguments.clone())
            .await;

        let (text, error) = match outcome {
            Ok(text) => (text, None),
            Err(e) => {
                let message = match e {
                    McpError::ExecutionFailed(message) => message,
                    other => other.to_string(),
                };
                warn!(server = %tool.server, tool = %tool.info.name, error = %message, "Tool call failed");
                (error_result(message.clone()), Some(message))
            }
        };

        if let Some(audit) = &self.audit {
            if let Err(e) = audit
                .log_tool_call(&tool.server, &tool.info.name, error.as_deref(), Some(arguments))
                .await
            {
                warn!(error = %e, "Failed to write audit event");
            }
        }

        text
    }
}

/// Decode the model's argument string; blank means no arguments
fn parse_arguments(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Value::Object(map)),
        Ok(Value::Null) => Ok(json!({})),
        Ok(_) => Err("tool arguments must be a JSON object".to_string()),
        Err(e) => Err(format!("invalid tool arguments: {e}")),
    }
}

fn error_result(message: impl Into<String>) -> String {
    json!({ "error": message.into() }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;
    use crate::domain::models::{FunctionCall, Role, ToolDefinition, ToolInfo};
    use crate::domain::ports::ChatError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted replies and records what it was sent
    struct ScriptedChat {
        replies: Mutex<VecDeque<Result<ChatMessage, ChatError>>>,
        seen: Mutex<Vec<(Vec<ChatMessage>, usize)>>,
    }

    impl ScriptedChat {
        fn new(replies: Vec<Result<ChatMessage, ChatError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedChat {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            tools: &[ToolDefinition],
        ) -> Result<ChatMessage, ChatError> {
            self.seen.lock().unwrap().push((messages.to_vec(), tools.len()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ChatMessage::assistant("done")))
        }
    }

    #[derive(Default)]
    struct RecordingMcp {
        calls: Mutex<Vec<(String, String, Value)>>,
    }

    #[async_trait]
    impl McpClient for RecordingMcp {
        async fn servers(&self) -> Vec<String> {
            vec!["local".to_string()]
        }

        async fn list_tools(&self, _: &str) -> Result<Vec<ToolInfo>, McpError> {
            Ok(vec![])
        }

        async fn call_tool(
            &self,
            server_name: &str,
            tool_name: &str,
            arguments: Value,
        ) -> Result<String, McpError> {
            self.calls.lock().unwrap().push((
                server_name.to_string(),
                tool_name.to_string(),
                arguments.clone(),
            ));
            match tool_name {
                "delete_file" => Err(McpError::ExecutionFailed("path outside home directory".to_string())),
                _ => Ok(r#"["a.txt","b.txt"]"#.to_string()),
            }
        }

        async fn health_check(&self, _: &str) -> Result<(), McpError> {
            Ok(())
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::from_listings(vec![(
            "local".to_string(),
            vec![
                ToolInfo::new("list_files", "List", json!({"type": "object"})),
                ToolInfo::new("delete_file", "Delete", json!({"type": "object"})),
            ],
        )])
    }

    fn tool_call(id: &str, name: &str, arguments: &str) -> ChatMessage {
        ChatMessage {
            role: Role::Assistant,
            content: None,
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                kind: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }],
            tool_call_id: None,
        }
    }

    #[tokio::test]
    async fn test_text_reply_ends_turn() {
        let chat = ScriptedChat::new(vec![Ok(ChatMessage::assistant("Hello!"))]);
        let mut assistant =
            Assistant::new(chat.clone(), Arc::new(RecordingMcp::default()), registry(), 10);

        assert_eq!(assistant.ask("hi").await.unwrap(), "Hello!");

        let seen = chat.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0[0].content.as_deref(), Some(SYSTEM_PROMPT));
        assert_eq!(seen[0].1, 2);
        assert_eq!(assistant.history().len(), 3);
    }

    #[tokio::test]
    async fn test_tool_call_result_is_fed_back() {
        let chat = ScriptedChat::new(vec![
            Ok(tool_call("call_1", "local__list_files", r#"{"directory": "~"}"#)),
            Ok(ChatMessage::assistant("You have a.txt and b.txt")),
        ]);
        let mcp = Arc::new(RecordingMcp::default());
        let mut assistant = Assistant::new(chat.clone(), mcp.clone(), registry(), 10);

        let reply = assistant.ask("what's in my home?").await.unwrap();
        assert_eq!(reply, "You have a.txt and b.txt");

        let calls = mcp.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            ("local".to_string(), "list_files".to_string(), json!({"directory": "~"}))
        );

        let tool_msg = &assistant.history()[3];
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool_msg.content.as_deref(), Some(r#"["a.txt","b.txt"]"#));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments_reported_to_model() {
        let chat = ScriptedChat::new(vec![
            Ok(tool_call("c1", "format_disk", "{}")),
            Ok(tool_call("c2", "list_files", "{not json")),
            Ok(tool_call("c3", "local__delete_file", r#"{"path": "../x"}"#)),
            Ok(ChatMessage::assistant("I could not do that.")),
        ]);
        let mcp = Arc::new(RecordingMcp::default());
        let mut assistant = Assistant::new(chat, mcp.clone(), registry(), 10);

        assistant.ask("wipe everything").await.unwrap();

        let results: Vec<Value> = assistant
            .history()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| serde_json::from_str(m.content.as_deref().unwrap()).unwrap())
            .collect();
        assert_eq!(results[0], json!({"error": "tool 'format_disk' not found"}));
        assert!(results[1]["error"].as_str().unwrap().starts_with("invalid tool arguments"));
        assert_eq!(results[2], json!({"error": "path outside home directory"}));
        assert_eq!(mcp.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_step_limit_returns_fallback() {
        let replies = (0..5)
            .map(|i| Ok(tool_call(&format!("c{i}"), "list_files", "")))
            .collect();
        let chat = ScriptedChat::new(replies);
        let mut assistant =
            Assistant::new(chat.clone(), Arc::new(RecordingMcp::default()), registry(), 3);

        assert_eq!(assistant.ask("loop").await.unwrap(), FALLBACK_REPLY);
        assert_eq!(chat.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_chat_failure_restores_history() {
        let chat = ScriptedChat::new(vec![
            Ok(ChatMessage::assistant("first")),
            Err(ChatError::Unavailable("503".to_string())),
        ]);
        let mut assistant =
            Assistant::new(chat, Arc::new(RecordingMcp::default()), registry(), 10);

        assistant.ask("one").await.unwrap();
        let err = assistant.ask("two").await.unwrap_err();

        assert!(matches!(err, DomainError::Chat(_)));
        assert_eq!(assistant.history().len(), 3);
    }

    #[tokio::test]
    async fn test_history_persists_until_reset() {
        let chat = ScriptedChat::new(vec![
            Ok(ChatMessage::assistant("a")),
            Ok(ChatMessage::assistant("b")),
        ]);
        let mut assistant =
            Assistant::new(chat.clone(), Arc::new(RecordingMcp::default()), registry(), 10);

        assistant.ask("first").await.unwrap();
        assistant.ask("second").await.unwrap();
        assert_eq!(chat.seen.lock().unwrap()[1].0.len(), 4);

        assistant.reset();
        assert_eq!(assistant.history().len(), 1);
        assert_eq!(assistant.history()[0].role, Role::System);
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments("").unwrap(), json!({}));
        assert_eq!(parse_arguments("null").unwrap(), json!({}));
        assert!(parse_arguments("[1]").is_err());
        assert_eq!(parse_arguments(r#"{"a":1}"#).unwrap(), json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_tool_calls_are_audited() {
        let dir = tempfile::TempDir::new().unwrap();
        let audit_path = dir.path().join("audit.log");
        let audit = AuditLogger::new(&audit_path).await.unwrap();

        let chat = ScriptedChat::new(vec![
            Ok(tool_call("c1", "local__delete_file", r#"{"path": "x"}"#)),
            Ok(ChatMessage::assistant("failed")),
        ]);
        let mut assistant =
            Assistant::new(chat, Arc::new(RecordingMcp::default()), registry(), 10).with_audit(audit);
        assistant.ask("delete x").await.unwrap();

        let log = std::fs::read_to_string(&audit_path).unwrap();
        let event: Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
        assert_eq!(event["event_type"], "tool_failed");
        assert_eq!(event["operation"], "delete_file");
        assert_eq!(event["resource_id"], "local");
    }
}
