//! Role, finish-reason and message normalization shared by the transforms.

use serde_json::{Map, Value as JsonValue};

/// Canonical chat roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }

    /// Parse a provider role name, returning None for unknown roles.
    ///
    /// - OpenAI: system, user, assistant, tool, function, developer
    /// - Google: user, model
    /// - LangChain: human, ai, tool
    pub fn try_from_str(s: &str) -> Option<Self> {
        Some(match s.to_lowercase().as_str() {
            "system" | "developer" => Self::System,
            "user" | "human" => Self::User,
            "assistant" | "ai" | "bot" | "model" => Self::Assistant,
            "tool" | "function" | "ipython" => Self::Tool,
            _ => return None,
        })
    }
}

/// Canonical finish reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// stop, end_turn, eos, complete, stop_sequence
    Stop,
    /// length, max_tokens, token_limit
    Length,
    /// tool_calls, tool_use, function_call
    ToolUse,
    /// content_filter, safety, recitation
    ContentFilter,
    Error,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolUse => "tool_use",
            Self::ContentFilter => "content_filter",
            Self::Error => "error",
        }
    }

    pub fn from_str_normalized(s: &str) -> Option<Self> {
        Some(match s.to_lowercase().as_str() {
            "stop" | "end_turn" | "eos" | "end" | "complete" | "completed" | "stop_sequence" => {
                Self::Stop
            }
            "length" | "max_tokens" | "token_limit" | "truncated" => Self::Length,
            "tool_calls" | "tool-calls" | "tool_use" | "function_call" => Self::ToolUse,
            "content_filter" | "content_filtered" | "safety" | "recitation" | "blocked"
            | "guardrail_intervened" => Self::ContentFilter,
            "error" | "failure" | "failed" => Self::Error,
            _ => return None,
        })
    }
}

// =============================================================================
// Text Blocks
// =============================================================================

/// Collapse content blocks into plain text.
///
/// Accepts a string, a `{"text": ..}` block, or a list of strings and text
/// blocks (`[{"type": "text", "text": ..}]`). Non-text blocks are skipped;
/// `None` when no text is found.
pub fn join_text_blocks(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Object(block) => block_text(block).map(str::to_string),
        JsonValue::Array(items) => {
            let parts: Vec<&str> = items
                .iter()
                .filter_map(|item| match item {
                    JsonValue::String(s) => Some(s.as_str()),
                    JsonValue::Object(block) => block_text(block),
                    _ => None,
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join("\n"))
        }
        _ => None,
    }
}

fn block_text(block: &Map<String, JsonValue>) -> Option<&str> {
    match block.get("type").and_then(JsonValue::as_str) {
        None | Some("text") | Some("input_text") | Some("output_text") => {
            block.get("text").and_then(JsonValue::as_str)
        }
        Some(_) => None,
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Normalize a chat history.
///
/// Accepts a list of message objects, a single message object, or a JSON
/// string holding either. Roles are canonicalized and content made of text
/// blocks only is flattened to a string; other keys are kept as-is.
pub fn normalize_messages(value: &JsonValue) -> Option<JsonValue> {
    let parsed;
    let value = match value {
        JsonValue::String(s) => {
            parsed = serde_json::from_str::<JsonValue>(s).ok()?;
            &parsed
        }
        other => other,
    };

    match value {
        JsonValue::Array(items) => {
            let messages = items
                .iter()
                .map(|item| item.as_object().map(normalize_message))
                .collect::<Option<Vec<_>>>()?;
            Some(JsonValue::Array(messages))
        }
        JsonValue::Object(message) if message.contains_key("role") => {
            Some(JsonValue::Array(vec![normalize_message(message)]))
        }
        _ => None,
    }
}

fn normalize_message(message: &Map<String, JsonValue>) -> JsonValue {
    let mut out = Map::with_capacity(message.len());
    for (key, value) in message {
        let normalized = match key.as_str() {
            "role" => match value.as_str() {
                Some(role) => JsonValue::String(
                    ChatRole::try_from_str(role)
                        .map(|r| r.as_str().to_string())
                        .unwrap_or_else(|| role.to_lowercase()),
                ),
                None => value.clone(),
            },
            "content" | "parts" => match value {
                JsonValue::Array(blocks) if blocks.iter().all(is_text_block) => {
                    join_text_blocks(value).map_or_else(|| value.clone(), JsonValue::String)
                }
                _ => value.clone(),
            },
            _ => value.clone(),
        };
        let key = if key == "parts" { "content" } else { key.as_str() };
        out.entry(key.to_string()).or_insert(normalized);
    }
    JsonValue::Object(out)
}

fn is_text_block(block: &JsonValue) -> bool {
    match block {
        JsonValue::String(_) => true,
        JsonValue::Object(map) => block_text(map).is_some(),
        _ => false,
    }
}
