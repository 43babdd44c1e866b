pub mod chat;

pub use chat::{ ChatMessage, ChatRequest, ErrorBody, Role, StreamChunk };
