use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Wire body of a completion call: `POST {base_url}/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

/// One event of the relayed completion stream. A receiver observes the
/// grammar `Data* (End | Error)`: `Error` is terminal on its own, `End`
/// closes a healthy stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// One line of the upstream response, exactly as received.
    Data(String),
    /// The single in-band failure report: upstream status, transport error or
    /// timeout. Nothing follows it.
    Error(String),
    /// Healthy end of stream.
    End,
}
