//! OpenAI chat nodes.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::debug;

use playflow_core::traits::{ChatCompletionClient, ChatCompletionRequest, ChatDelta};
use playflow_core::{
    ChatGptMessage, ChatMessageRole, NodeConfig, NodeId, NodeParams, NodeTemplate, NodeType,
    RunNodeResult, SecretKind, VariableValueType,
};

use crate::definition::{ready, single, NodeDefinition, NodeRunContext, NodeRunStream, TemplateBuilder};
use crate::nodes::text::{render_template, DEFAULT_TEMPLATE};

/// Appends one templated message to an incoming message list.
pub struct ChatGptMessageNode;

impl NodeDefinition for ChatGptMessageNode {
    fn node_type(&self) -> NodeType {
        NodeType::ChatGPTMessageNode
    }

    fn label(&self) -> &str {
        "ChatGPT Message"
    }

    fn create_default(&self, node_id: &NodeId) -> NodeTemplate {
        TemplateBuilder::new(node_id)
            .node_input(0, "messages")
            .node_input(1, "topic")
            .node_output(0, "message", VariableValueType::Object)
            .node_output(1, "messages", VariableValueType::Array)
            .condition(0, "")
            .condition_target(0)
            .build(NodeConfig::new(
                node_id.clone(),
                NodeParams::ChatGPTMessageNode {
                    role: ChatMessageRole::User,
                    content: DEFAULT_TEMPLATE.to_string(),
                },
            ))
    }

    fn run(&self, context: NodeRunContext) -> NodeRunStream {
        let NodeParams::ChatGPTMessageNode { role, content } = &context.node_config.params else {
            return ready(RunNodeResult::error("Node config is not a ChatGPT message"));
        };

        let mut messages = match parse_messages(&context.first_input()) {
            Ok(messages) => messages,
            Err(message) => return ready(RunNodeResult::error(message)),
        };

        let content = match render_template(content, &context.named_inputs()) {
            Ok(text) => text,
            Err(message) => return ready(RunNodeResult::error(message)),
        };

        let message = ChatGptMessage {
            role: *role,
            content,
        };
        messages.push(message.clone());

        ready(RunNodeResult::values(vec![
            to_value(&message),
            to_value(&messages),
        ]))
    }
}

/// Sends the incoming message list to the chat completion API.
pub struct ChatGptChatCompletionNode {
    client: Arc<dyn ChatCompletionClient>,
}

impl ChatGptChatCompletionNode {
    pub fn new(client: Arc<dyn ChatCompletionClient>) -> Self {
        Self { client }
    }
}

impl NodeDefinition for ChatGptChatCompletionNode {
    fn node_type(&self) -> NodeType {
        NodeType::ChatGPTChatCompletionNode
    }

    fn label(&self) -> &str {
        "ChatGPT Chat Completion"
    }

    fn required_secret(&self) -> Option<SecretKind> {
        Some(SecretKind::OpenAiApiKey)
    }

    fn create_default(&self, node_id: &NodeId) -> NodeTemplate {
        TemplateBuilder::new(node_id)
            .node_input(0, "messages_in")
            .node_output(0, "content", VariableValueType::String)
            .node_output(1, "message", VariableValueType::Object)
            .node_output(2, "messages_out", VariableValueType::Array)
            .condition(0, "")
            .condition_target(0)
            .build(NodeConfig::new(
                node_id.clone(),
                NodeParams::ChatGPTChatCompletionNode {
                    model: "gpt-4".to_string(),
                    temperature: 1.0,
                    seed: None,
                    response_format_type: None,
                    stop: Vec::new(),
                },
            ))
    }

    fn run(&self, context: NodeRunContext) -> NodeRunStream {
        let NodeParams::ChatGPTChatCompletionNode {
            model,
            temperature,
            seed,
            response_format_type,
            stop,
        } = context.node_config.params.clone()
        else {
            return ready(RunNodeResult::error(
                "Node config is not a ChatGPT chat completion",
            ));
        };

        let Some(api_key) = context.secrets.get(SecretKind::OpenAiApiKey) else {
            return ready(RunNodeResult::error(
                SecretKind::OpenAiApiKey.missing_message(),
            ));
        };

        let history = match parse_messages(&context.first_input()) {
            Ok(messages) => messages,
            Err(message) => return ready(RunNodeResult::error(message)),
        };

        let request = ChatCompletionRequest {
            api_key: api_key.to_string(),
            model,
            messages: history.clone(),
            temperature,
            seed,
            response_format_type,
            stop,
        };

        debug!(
            node_id = %context.node_id(),
            model = %request.model,
            streaming = context.prefer_streaming,
            "Running chat completion"
        );

        let client = Arc::clone(&self.client);

        if context.prefer_streaming {
            return run_streaming(client, request, history);
        }

        single(async move {
            match client.complete(request).await {
                Ok(message) => completion_result(&history, &message),
                Err(e) => RunNodeResult::error(e.to_string()),
            }
        })
    }
}

struct StreamState {
    message: ChatGptMessage,
    failed: bool,
}

fn run_streaming(
    client: Arc<dyn ChatCompletionClient>,
    request: ChatCompletionRequest,
    history: Vec<ChatGptMessage>,
) -> NodeRunStream {
    stream::once(async move { client.complete_stream(request).await })
        .flat_map(move |opened| match opened {
            Ok(deltas) => {
                let history = history.clone();
                let state = StreamState {
                    message: ChatGptMessage {
                        role: ChatMessageRole::Assistant,
                        content: String::new(),
                    },
                    failed: false,
                };
                deltas
                    .scan(state, move |state, delta| {
                        if state.failed {
                            return futures::future::ready(None);
                        }
                        let result = match delta {
                            Ok(delta) => {
                                apply_delta(&mut state.message, delta);
                                completion_result(&history, &state.message)
                            }
                            Err(e) => {
                                state.failed = true;
                                RunNodeResult::error(e.to_string())
                            }
                        };
                        futures::future::ready(Some(result))
                    })
                    .boxed()
            }
            Err(e) => ready(RunNodeResult::error(e.to_string())),
        })
        .boxed()
}

fn apply_delta(message: &mut ChatGptMessage, delta: ChatDelta) {
    if let Some(role) = delta.role {
        message.role = role;
    }
    if let Some(content) = delta.content {
        message.content.push_str(&content);
    }
}

/// Outputs: content, message, and the history with the reply appended.
fn completion_result(history: &[ChatGptMessage], message: &ChatGptMessage) -> RunNodeResult {
    let mut messages = history.to_vec();
    messages.push(message.clone());
    RunNodeResult::values(vec![
        Value::String(message.content.clone()),
        to_value(message),
        to_value(&messages),
    ])
}

/// `null` is an empty conversation.
pub fn parse_messages(value: &Value) -> Result<Vec<ChatGptMessage>, String> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value.clone())
        .map_err(|e| format!("Messages must be a list of {{role, content}} objects: {}", e))
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_messages() {
        assert!(parse_messages(&Value::Null).unwrap().is_empty());
        let messages =
            parse_messages(&json!([{"role": "system", "content": "be brief"}])).unwrap();
        assert_eq!(messages[0].role, ChatMessageRole::System);
        assert!(parse_messages(&json!("nope")).is_err());
    }

    #[test]
    fn test_apply_delta_accumulates() {
        let mut message = ChatGptMessage {
            role: ChatMessageRole::Assistant,
            content: String::new(),
        };
        apply_delta(
            &mut message,
            ChatDelta {
                role: Some(ChatMessageRole::Assistant),
                content: Some("Hel".into()),
            },
        );
        apply_delta(
            &mut message,
            ChatDelta {
                role: None,
                content: Some("lo".into()),
            },
        );
        assert_eq!(message.content, "Hello");
    }

    #[test]
    fn test_completion_result_shape() {
        let history = vec![ChatGptMessage {
            role: ChatMessageRole::User,
            content: "hi".into(),
        }];
        let reply = ChatGptMessage {
            role: ChatMessageRole::Assistant,
            content: "hello".into(),
        };
        let result = completion_result(&history, &reply);
        let values = result.variable_values.unwrap();
        assert_eq!(values[0], json!("hello"));
        assert_eq!(values[1], json!({"role": "assistant", "content": "hello"}));
        assert_eq!(values[2].as_array().unwrap().len(), 2);
    }
}
