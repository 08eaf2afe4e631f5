//! Wire types for the dialog proxy REST surface

use crate::model::{Dialog, ProfileEntry};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DialogList {
    #[serde(default)]
    pub dialogs: Vec<Dialog>,
}

/// Body of `POST /v1/dialogs/{id}/conversation`. Omitting both ids starts a
/// new conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConverseRequest {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl ConverseRequest {
    pub fn opening() -> Self {
        Self {
            input: String::new(),
            conversation_id: None,
            client_id: None,
        }
    }

    pub fn turn(input: impl Into<String>, conversation_id: &str, client_id: &str) -> Self {
        Self {
            input: input.into(),
            conversation_id: Some(conversation_id.to_string()),
            client_id: Some(client_id.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConverseResponse {
    #[serde(deserialize_with = "id_string")]
    pub conversation_id: String,
    #[serde(deserialize_with = "id_string")]
    pub client_id: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub response: BotResponse,
}

/// Conversation ids arrive as strings from some proxies and as integers
/// from others; both are kept as text.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

/// The `response` field is normally a list of lines; some proxies wrap the
/// lines in an object that also carries the confidence.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BotResponse {
    Lines(Vec<String>),
    Detailed {
        #[serde(default, alias = "text")]
        lines: Vec<String>,
        #[serde(default)]
        confidence: Option<f64>,
    },
}

impl Default for BotResponse {
    fn default() -> Self {
        BotResponse::Lines(Vec::new())
    }
}

impl ConverseResponse {
    pub fn lines(&self) -> &[String] {
        match &self.response {
            BotResponse::Lines(lines) => lines,
            BotResponse::Detailed { lines, .. } => lines,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match &self.response {
            BotResponse::Detailed {
                confidence: Some(c),
                ..
            } => Some(*c),
            _ => self.confidence,
        }
    }

    /// A zero confidence means the dialog answered with its default node
    pub fn default_answer_used(&self) -> bool {
        self.confidence() == Some(0.0)
    }
}

/// Query of `GET /v1/dialogs/{id}/profile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileRequest {
    pub conversation_id: String,
    pub client_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileResponse {
    #[serde(default)]
    pub name_values: Vec<ProfileEntry>,
}
