//! Error types for the dialog console

use thiserror::Error;

/// Failure reported by one of the proxy backends
#[derive(Debug, Clone, Error)]
#[error("{kind:?} error (status {status:?}): {message}")]
pub struct ProxyError {
    pub kind: ProxyErrorKind,
    pub status: Option<u16>,
    /// Message extracted from the response body's `error` field, or empty
    pub message: String,
}

impl ProxyError {
    pub fn new(kind: ProxyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProxyErrorKind::Network, message)
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::new(ProxyErrorKind::Server, message).with_status(status)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ProxyErrorKind::Decode, message)
    }
}

/// Classification of proxy failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyErrorKind {
    /// Connection refused, timeout, DNS
    Network,
    /// Non-2xx response
    Server,
    /// 2xx response whose body could not be decoded
    Decode,
}

/// The operation a failure happened in, used to word the error banner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Create,
    Replace,
    Delete,
    Start,
    Turn,
}

impl Action {
    /// Banner text shown near the affected section
    pub fn banner(self, detail: &str) -> String {
        let head = match self {
            Action::List => "Error getting the dialogs",
            Action::Create => "Error creating the dialogs",
            Action::Replace => "Error updating the dialogs",
            Action::Delete => "Error deleting the dialogs",
            Action::Start => "Error starting the conversation",
            Action::Turn => "Error sending the message",
        };
        if detail.is_empty() {
            format!("{head}.")
        } else {
            format!("{head}: {detail}")
        }
    }
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("{}", action.banner(message))]
    NetworkOrServer { action: Action, message: String },

    /// Client-side precondition failure; callers treat it as a silent no-op
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("no active conversation, start one first")]
    NoActiveSession,

    #[error("dialog index {index} is out of range ({len} dialogs loaded)")]
    IndexOutOfRange { index: usize, len: usize },

    /// A newer conversation request was issued before this one completed
    #[error("response discarded, a newer request superseded it")]
    Superseded,
}

impl ConsoleError {
    pub fn from_proxy(action: Action, err: ProxyError) -> Self {
        ConsoleError::NetworkOrServer {
            action,
            message: err.message,
        }
    }
}
