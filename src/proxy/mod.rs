//! Dialog proxy abstraction
//!
//! The console talks to the dialog service only through [`DialogProxy`], so
//! the registry and session can be driven by a mock in tests.

mod http;
#[cfg(test)]
pub mod testing;
mod types;

pub use http::HttpDialogProxy;
pub use types::*;

use crate::error::ProxyError;
use crate::model::{Dialog, DialogFile};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// The REST operations the dialog proxy exposes
#[async_trait]
pub trait DialogProxy: Send + Sync {
    /// `GET /v1/dialogs`
    async fn list_dialogs(&self) -> Result<Vec<Dialog>, ProxyError>;

    /// `POST /v1/dialogs` with multipart `name` and `file`
    async fn create_dialog(&self, name: &str, file: &DialogFile) -> Result<(), ProxyError>;

    /// `PUT /v1/dialogs/{id}` with multipart `file`
    async fn replace_dialog(&self, dialog_id: &str, file: &DialogFile) -> Result<(), ProxyError>;

    /// `DELETE /v1/dialogs/{id}`
    async fn delete_dialog(&self, dialog_id: &str) -> Result<(), ProxyError>;

    /// `POST /v1/dialogs/{id}/conversation`
    async fn converse(
        &self,
        dialog_id: &str,
        request: &ConverseRequest,
    ) -> Result<ConverseResponse, ProxyError>;

    /// `GET /v1/dialogs/{id}/profile`
    async fn profile(
        &self,
        dialog_id: &str,
        request: &ProfileRequest,
    ) -> Result<ProfileResponse, ProxyError>;
}

/// Logging wrapper for a dialog proxy
pub struct LoggingProxy {
    inner: Arc<dyn DialogProxy>,
}

impl LoggingProxy {
    pub fn new(inner: Arc<dyn DialogProxy>) -> Self {
        Self { inner }
    }

    async fn observe<T>(
        operation: &'static str,
        call: impl Future<Output = Result<T, ProxyError>>,
    ) -> Result<T, ProxyError> {
        let start = Instant::now();
        let result = call.await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    operation,
                    duration_ms = %duration.as_millis(),
                    "dialog proxy call completed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    operation,
                    duration_ms = %duration.as_millis(),
                    kind = ?e.kind,
                    status = ?e.status,
                    error = %e.message,
                    "dialog proxy call failed"
                );
            }
        }

        result
    }
}

#[async_trait]
impl DialogProxy for LoggingProxy {
    async fn list_dialogs(&self) -> Result<Vec<Dialog>, ProxyError> {
        Self::observe("list_dialogs", self.inner.list_dialogs()).await
    }

    async fn create_dialog(&self, name: &str, file: &DialogFile) -> Result<(), ProxyError> {
        Self::observe("create_dialog", self.inner.create_dialog(name, file)).await
    }

    async fn replace_dialog(&self, dialog_id: &str, file: &DialogFile) -> Result<(), ProxyError> {
        Self::observe("replace_dialog", self.inner.replace_dialog(dialog_id, file)).await
    }

    async fn delete_dialog(&self, dialog_id: &str) -> Result<(), ProxyError> {
        Self::observe("delete_dialog", self.inner.delete_dialog(dialog_id)).await
    }

    async fn converse(
        &self,
        dialog_id: &str,
        request: &ConverseRequest,
    ) -> Result<ConverseResponse, ProxyError> {
        Self::observe("converse", self.inner.converse(dialog_id, request)).await
    }

    async fn profile(
        &self,
        dialog_id: &str,
        request: &ProfileRequest,
    ) -> Result<ProfileResponse, ProxyError> {
        Self::observe("profile", self.inner.profile(dialog_id, request)).await
    }
}
