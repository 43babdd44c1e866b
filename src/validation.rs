use crate::config::ValidationLimits;
use crate::config::prompt::ERROR_MESSAGES;
use crate::models::{ ChatMessage, ChatRequest, Role };
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid(ChatRequest),
    Invalid(String),
}

impl ValidationResult {
    fn invalid(reason: impl Into<String>) -> Self {
        ValidationResult::Invalid(reason.into())
    }
}

/// Strips anything that looks like an HTML tag, then trims.
pub fn sanitize_content(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut tag_start: Option<usize> = None;
    for (idx, ch) in raw.char_indices() {
        match (ch, tag_start) {
            ('<', None) => {
                tag_start = Some(idx);
            }
            ('>', Some(_)) => {
                tag_start = None;
            }
            (_, None) => out.push(ch),
            _ => {}
        }
    }
    // an unterminated '<' is not a tag
    if let Some(start) = tag_start {
        out.push_str(&raw[start..]);
    }
    out.trim().to_string()
}

/// Accepts either `{message, context?}` or `{messages: [...]}`.
pub fn validate_request(body: &Value, limits: &ValidationLimits) -> ValidationResult {
    let obj = match body.as_object() {
        Some(obj) => obj,
        None => {
            return ValidationResult::invalid("Invalid request body");
        }
    };

    let session_id = obj
        .get("session_id")
        .or_else(|| obj.get("sessionId"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let turns = if let Some(messages) = obj.get("messages") {
        match messages.as_array() {
            Some(list) if !list.is_empty() => list.clone(),
            _ => {
                return ValidationResult::invalid("Messages array is required");
            }
        }
    } else if let Some(message) = obj.get("message") {
        let mut turns = match obj.get("context") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(ctx)) => ctx.clone(),
            Some(_) => {
                return ValidationResult::invalid("Context must be an array");
            }
        };
        let content = match message.as_str() {
            Some(s) => s,
            None => {
                return ValidationResult::invalid("Message content must be a string");
            }
        };
        turns.push(serde_json::json!({ "role": "user", "content": content }));
        turns
    } else {
        return ValidationResult::invalid("Messages array is required");
    };

    if turns.len() > limits.max_conversation_history {
        return ValidationResult::invalid("Too many messages in conversation");
    }

    let mut parsed = Vec::with_capacity(turns.len());
    for turn in &turns {
        let role = match turn.get("role").and_then(Value::as_str) {
            Some("user") => Role::User,
            Some("assistant") => Role::Assistant,
            Some(_) => {
                return ValidationResult::invalid("Invalid message role");
            }
            None => {
                return ValidationResult::invalid("Invalid message format");
            }
        };
        let content = match turn.get("content") {
            Some(Value::String(s)) => s,
            Some(_) => {
                return ValidationResult::invalid("Message content must be a string");
            }
            None => {
                return ValidationResult::invalid("Invalid message format");
            }
        };
        if role == Role::User && content.chars().count() > limits.max_message_length {
            return ValidationResult::invalid(ERROR_MESSAGES.message_too_long);
        }
        parsed.push(ChatMessage::new(role, sanitize_content(content)));
    }

    let last = match parsed.pop() {
        Some(last) if last.role == Role::User => last,
        _ => {
            return ValidationResult::invalid("Last message must be from the user");
        }
    };
    if last.content.is_empty() {
        return ValidationResult::invalid(ERROR_MESSAGES.invalid_message);
    }

    ValidationResult::Valid(ChatRequest {
        message: last.content,
        context: parsed.into_iter().filter(|m| !m.content.is_empty()).collect(),
        session_id,
    })
}
