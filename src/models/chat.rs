use serde::{ Serialize, Deserialize };
use serde_json::Value;
use thiserror::Error;

pub const SYSTEM_ROLE: &str = "system";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: role.into(), content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(SYSTEM_ROLE, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    pub fn is_system(&self) -> bool {
        self.role == SYSTEM_ROLE
    }
}

/// Body of `POST /chat`.
///
/// Entries are kept as raw JSON so that a malformed message is reported
/// inside the event stream instead of failing the whole request.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<Value>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message {index} is not an object")]
    NotAnObject { index: usize },
    #[error("message {index} is missing '{field}'")]
    MissingField { index: usize, field: &'static str },
    #[error("message {index} field '{field}' is not a string")]
    NotAString { index: usize, field: &'static str },
}

fn string_field(
    obj: &serde_json::Map<String, Value>,
    index: usize,
    field: &'static str
) -> Result<String, MessageError> {
    match obj.get(field) {
        None => Err(MessageError::MissingField { index, field }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(MessageError::NotAString { index, field }),
    }
}

/// Converts raw request entries into messages, keeping their order.
pub fn parse_messages(raw: &[Value]) -> Result<Vec<Message>, MessageError> {
    raw.iter()
        .enumerate()
        .map(|(index, value)| {
            let obj = value.as_object().ok_or(MessageError::NotAnObject { index })?;
            Ok(Message {
                role: string_field(obj, index, "role")?,
                content: string_field(obj, index, "content")?,
            })
        })
        .collect()
}

/// One event of the `/chat` stream. Serializes as `{"type": ..., "value": ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum StreamEvent {
    Text(String),
    Error(String),
}
