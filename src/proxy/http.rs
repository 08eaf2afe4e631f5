//! reqwest implementation of the dialog proxy

use super::{ConverseRequest, ConverseResponse, DialogList, DialogProxy, ProfileRequest, ProfileResponse};
use crate::error::ProxyError;
use crate::model::{Dialog, DialogFile};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Pull the `error` field out of a failed response body. Anything that is
/// not a JSON object with a string `error` yields an empty message.
pub fn extract_error_message(body: &str) -> String {
    if body.trim().is_empty() {
        return String::new();
    }
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("error")?.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// HTTP client for the dialog proxy, rooted at a parameterizable base path
#[derive(Clone)]
pub struct HttpDialogProxy {
    client: Client,
    base_url: String,
}

impl HttpDialogProxy {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProxyError::network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn dialog_url(&self, dialog_id: &str, suffix: &str) -> String {
        self.url(&format!("/v1/dialogs/{dialog_id}{suffix}"))
    }

    fn upload_form(file: &DialogFile) -> Result<Form, ProxyError> {
        let part = Part::bytes(file.content.clone())
            .file_name(file.file_name.clone())
            .mime_str("application/xml")
            .map_err(|e| ProxyError::decode(format!("invalid upload mime type: {e}")))?;
        Ok(Form::new().part("file", part))
    }

    async fn send(request: reqwest::RequestBuilder) -> Result<Response, ProxyError> {
        let response = request.send().await.map_err(|e| {
            tracing::debug!(error = %e, "dialog proxy unreachable");
            ProxyError::network("")
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ProxyError::server(status.as_u16(), extract_error_message(&body)))
    }

    async fn decode<T: DeserializeOwned + Default>(response: Response) -> Result<T, ProxyError> {
        let body = response
            .text()
            .await
            .map_err(|e| ProxyError::decode(format!("failed to read response body: {e}")))?;
        if body.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&body)
            .map_err(|e| ProxyError::decode(format!("unexpected response body: {e}")))
    }
}

#[async_trait]
impl DialogProxy for HttpDialogProxy {
    async fn list_dialogs(&self) -> Result<Vec<Dialog>, ProxyError> {
        let response = Self::send(self.client.get(self.url("/v1/dialogs"))).await?;
        let list: DialogList = Self::decode(response).await?;
        Ok(list.dialogs)
    }

    async fn create_dialog(&self, name: &str, file: &DialogFile) -> Result<(), ProxyError> {
        let form = Self::upload_form(file)?.text("name", name.to_string());
        Self::send(self.client.post(self.url("/v1/dialogs")).multipart(form)).await?;
        Ok(())
    }

    async fn replace_dialog(&self, dialog_id: &str, file: &DialogFile) -> Result<(), ProxyError> {
        let form = Self::upload_form(file)?;
        Self::send(self.client.put(self.dialog_url(dialog_id, "")).multipart(form)).await?;
        Ok(())
    }

    async fn delete_dialog(&self, dialog_id: &str) -> Result<(), ProxyError> {
        Self::send(self.client.delete(self.dialog_url(dialog_id, ""))).await?;
        Ok(())
    }

    async fn converse(
        &self,
        dialog_id: &str,
        request: &ConverseRequest,
    ) -> Result<ConverseResponse, ProxyError> {
        let url = self.dialog_url(dialog_id, "/conversation");
        let response = Self::send(self.client.post(url).form(request)).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ProxyError::decode(format!("failed to read response body: {e}")))?;
        serde_json::from_str(&body)
            .map_err(|e| ProxyError::decode(format!("unexpected conversation body: {e}")))
    }

    async fn profile(
        &self,
        dialog_id: &str,
        request: &ProfileRequest,
    ) -> Result<ProfileResponse, ProxyError> {
        let url = self.dialog_url(dialog_id, "/profile");
        let response = Self::send(self.client.get(url).query(request)).await?;
        Self::decode(response).await
    }
}
