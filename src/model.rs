use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A dialog definition known to the proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    pub dialog_id: String,
    pub name: String,
}

/// Identifiers of the one active conversation. All three are issued by the
/// proxy together, so the struct is either fully present or absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub dialog_id: String,
    pub conversation_id: String,
    pub client_id: String,
}

/// An attribute the proxy inferred about the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Bot side of one exchange
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub lines: Vec<String>,
    /// Confidence was reported as zero, so the dialog fell back to its default answer
    pub default_answer_used: bool,
}

impl Turn {
    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Human,
    Bot,
}

/// One line of the displayed transcript
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// XML dialog definition to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl DialogFile {
    pub fn new(file_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let content = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dialog.xml".to_string());
        Ok(Self::new(file_name, content))
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
