//! Mock dialog proxy for tests

use super::{ConverseRequest, ConverseResponse, DialogProxy, ProfileRequest, ProfileResponse};
use crate::error::ProxyError;
use crate::model::{Dialog, DialogFile};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A call the mock received
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyCall {
    List,
    Create { name: String, file: DialogFile },
    Replace { dialog_id: String, file: DialogFile },
    Delete { dialog_id: String },
    Converse { dialog_id: String, request: ConverseRequest },
    Profile { dialog_id: String, request: ProfileRequest },
}

/// Mock proxy that answers from per-operation queues and records every call.
/// An empty queue answers with a network error.
#[derive(Default)]
pub struct MockDialogProxy {
    lists: Mutex<VecDeque<Result<Vec<Dialog>, ProxyError>>>,
    mutations: Mutex<VecDeque<(Duration, Result<(), ProxyError>)>>,
    conversations: Mutex<VecDeque<(Duration, Result<ConverseResponse, ProxyError>)>>,
    profiles: Mutex<VecDeque<Result<ProfileResponse, ProxyError>>>,
    pub calls: Mutex<Vec<ProxyCall>>,
}

pub fn dialog(id: &str, name: &str) -> Dialog {
    Dialog {
        dialog_id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn reply(conversation_id: &str, client_id: &str, lines: &[&str]) -> ConverseResponse {
    serde_json::from_value(serde_json::json!({
        "conversation_id": conversation_id,
        "client_id": client_id,
        "response": lines,
    }))
    .unwrap()
}

impl MockDialogProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_list(&self, dialogs: Vec<Dialog>) {
        self.lists.lock().unwrap().push_back(Ok(dialogs));
    }

    pub fn queue_list_error(&self, error: ProxyError) {
        self.lists.lock().unwrap().push_back(Err(error));
    }

    /// Queue the outcome of the next create, replace or delete
    pub fn queue_mutation(&self, result: Result<(), ProxyError>) {
        self.queue_delayed_mutation(Duration::ZERO, result);
    }

    pub fn queue_delayed_mutation(&self, delay: Duration, result: Result<(), ProxyError>) {
        self.mutations.lock().unwrap().push_back((delay, result));
    }

    pub fn queue_reply(&self, response: ConverseResponse) {
        self.queue_delayed_reply(Duration::ZERO, Ok(response));
    }

    pub fn queue_reply_error(&self, error: ProxyError) {
        self.queue_delayed_reply(Duration::ZERO, Err(error));
    }

    pub fn queue_delayed_reply(&self, delay: Duration, result: Result<ConverseResponse, ProxyError>) {
        self.conversations.lock().unwrap().push_back((delay, result));
    }

    pub fn queue_profile(&self, result: Result<ProfileResponse, ProxyError>) {
        self.profiles.lock().unwrap().push_back(result);
    }

    pub fn recorded_calls(&self) -> Vec<ProxyCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&ProxyCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(*c)).count()
    }

    fn record(&self, call: ProxyCall) {
        self.calls.lock().unwrap().push(call);
    }

    async fn next_mutation(&self) -> Result<(), ProxyError> {
        let next = self.mutations.lock().unwrap().pop_front();
        match next {
            Some((delay, result)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Err(ProxyError::network("no mock mutation queued")),
        }
    }
}

#[async_trait]
impl DialogProxy for MockDialogProxy {
    async fn list_dialogs(&self) -> Result<Vec<Dialog>, ProxyError> {
        self.record(ProxyCall::List);
        self.lists
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProxyError::network("no mock list queued")))
    }

    async fn create_dialog(&self, name: &str, file: &DialogFile) -> Result<(), ProxyError> {
        self.record(ProxyCall::Create {
            name: name.to_string(),
            file: file.clone(),
        });
        self.next_mutation().await
    }

    async fn replace_dialog(&self, dialog_id: &str, file: &DialogFile) -> Result<(), ProxyError> {
        self.record(ProxyCall::Replace {
            dialog_id: dialog_id.to_string(),
            file: file.clone(),
        });
        self.next_mutation().await
    }

    async fn delete_dialog(&self, dialog_id: &str) -> Result<(), ProxyError> {
        self.record(ProxyCall::Delete {
            dialog_id: dialog_id.to_string(),
        });
        self.next_mutation().await
    }

    async fn converse(
        &self,
        dialog_id: &str,
        request: &ConverseRequest,
    ) -> Result<ConverseResponse, ProxyError> {
        self.record(ProxyCall::Converse {
            dialog_id: dialog_id.to_string(),
            request: request.clone(),
        });
        let next = self.conversations.lock().unwrap().pop_front();
        match next {
            Some((delay, result)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Err(ProxyError::network("no mock reply queued")),
        }
    }

    async fn profile(
        &self,
        dialog_id: &str,
        request: &ProfileRequest,
    ) -> Result<ProfileResponse, ProxyError> {
        self.record(ProxyCall::Profile {
            dialog_id: dialog_id.to_string(),
            request: request.clone(),
        });
        self.profiles
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProxyError::network("no mock profile queued")))
    }
}
