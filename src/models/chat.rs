use serde::{ Serialize, Deserialize };
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// A validated chat request: the new user message plus prior turns, oldest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub context: Vec<ChatMessage>,
    pub session_id: Option<String>,
}

impl ChatRequest {
    /// Full conversation in upstream order, ending with the user message.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = self.context.clone();
        messages.push(ChatMessage::new(Role::User, self.message.clone()));
        messages
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamChunk {
    Content {
        content: String,
    },
    Done,
    Error {
        error: String,
    },
}

impl StreamChunk {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamChunk::Content { .. })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { success: false, error: error.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stream_chunks_use_type_tag() {
        let content = StreamChunk::Content { content: "hi".into() };
        assert_eq!(serde_json::to_value(&content).unwrap(), json!({"type": "content", "content": "hi"}));
        assert_eq!(serde_json::to_value(&StreamChunk::Done).unwrap(), json!({"type": "done"}));
        let parsed: StreamChunk = serde_json::from_str(r#"{"type":"error","error":"x"}"#).unwrap();
        assert_eq!(parsed, StreamChunk::Error { error: "x".into() });
        assert!(parsed.is_terminal());
    }

    #[test]
    fn to_messages_appends_user_turn_last() {
        let req = ChatRequest {
            message: "next".into(),
            context: vec![ChatMessage::new(Role::User, "hi"), ChatMessage::new(Role::Assistant, "hello")],
            session_id: None,
        };
        let msgs = req.to_messages();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[2], ChatMessage::new(Role::User, "next"));
    }
}
