use crate::error::{Action, ConsoleError};
use crate::model::{Dialog, DialogFile, Turn};
use crate::proxy::DialogProxy;
use crate::session::ConversationSession;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// In-memory copy of every dialog the proxy knows about, replaced wholesale
/// on each successful refresh.
#[derive(Clone)]
pub struct DialogRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    proxy: Arc<dyn DialogProxy>,
    state: Mutex<RegistryState>,
    delete_refresh_delay: Duration,
}

#[derive(Default)]
struct RegistryState {
    dialogs: Vec<Dialog>,
    in_flight: usize,
    pending_deletes: HashSet<String>,
}

/// Result of a delete request
#[derive(Debug)]
pub enum DeleteOutcome {
    /// The delete went through; the handle resolves once the delayed refresh ran
    Scheduled(JoinHandle<Result<usize, ConsoleError>>),
    /// A delete for this dialog is still waiting on its refresh, nothing was sent
    AlreadyPending,
}

/// Result of a successful definition upload
#[derive(Debug)]
pub enum ReplaceOutcome {
    /// No conversation ran on the dialog
    Updated,
    /// The active conversation was restarted on the new definition
    Restarted(Turn),
    /// The upload went through but the conversation could not be restarted
    RestartFailed(ConsoleError),
}

/// Marks the registry busy for as long as it lives
struct BusyGuard {
    inner: Arc<RegistryInner>,
}

impl BusyGuard {
    fn new(inner: &Arc<RegistryInner>) -> Self {
        inner.lock().in_flight += 1;
        Self {
            inner: Arc::clone(inner),
        }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

impl RegistryInner {
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn refresh(self: &Arc<Self>) -> Result<usize, ConsoleError> {
        let _busy = BusyGuard::new(self);
        let dialogs = self
            .proxy
            .list_dialogs()
            .await
            .map_err(|e| ConsoleError::from_proxy(Action::List, e))?;

        let count = dialogs.len();
        self.lock().dialogs = dialogs;
        tracing::debug!(count, "dialog registry refreshed");
        Ok(count)
    }
}

impl DialogRegistry {
    pub fn new(proxy: Arc<dyn DialogProxy>, delete_refresh_delay: Duration) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                proxy,
                state: Mutex::new(RegistryState::default()),
                delete_refresh_delay,
            }),
        }
    }

    /// Fetch the full dialog list and replace the local copy. On failure the
    /// current list is kept.
    pub async fn refresh(&self) -> Result<usize, ConsoleError> {
        self.inner.refresh().await
    }

    /// Snapshot of the dialogs in the order the proxy returned them
    pub fn dialogs(&self) -> Vec<Dialog> {
        self.inner.lock().dialogs.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().dialogs.len()
    }

    /// Whether any list or mutation call is in flight
    pub fn is_busy(&self) -> bool {
        self.inner.lock().in_flight > 0
    }

    /// Dialog at a display index. Indices are only valid until the next refresh.
    pub fn get(&self, index: usize) -> Result<Dialog, ConsoleError> {
        let state = self.inner.lock();
        state
            .dialogs
            .get(index)
            .cloned()
            .ok_or(ConsoleError::IndexOutOfRange {
                index,
                len: state.dialogs.len(),
            })
    }

    /// Upload a new dialog definition, then refresh the list
    pub async fn create(&self, name: &str, file: &DialogFile) -> Result<usize, ConsoleError> {
        if name.is_empty() || file.is_empty() {
            return Err(ConsoleError::Validation(
                "a dialog needs both a name and a definition file".to_string(),
            ));
        }

        {
            let _busy = BusyGuard::new(&self.inner);
            self.inner
                .proxy
                .create_dialog(name, file)
                .await
                .map_err(|e| ConsoleError::from_proxy(Action::Create, e))?;
        }

        tracing::info!(name, "dialog created");
        self.refresh().await
    }

    /// Upload a new definition for an existing dialog. When the active
    /// conversation runs on that dialog it is restarted; the restart result is
    /// reported apart from the upload.
    pub async fn replace(
        &self,
        dialog_id: &str,
        file: &DialogFile,
        session: &ConversationSession,
    ) -> Result<ReplaceOutcome, ConsoleError> {
        if file.is_empty() {
            return Err(ConsoleError::Validation(
                "the replacement definition file is empty".to_string(),
            ));
        }

        {
            let _busy = BusyGuard::new(&self.inner);
            self.inner
                .proxy
                .replace_dialog(dialog_id, file)
                .await
                .map_err(|e| ConsoleError::from_proxy(Action::Replace, e))?;
        }

        tracing::info!(dialog_id, "dialog definition replaced");
        if session.dialog_id().as_deref() == Some(dialog_id) {
            tracing::info!(dialog_id, "restarting conversation on replaced dialog");
            return Ok(match session.start(dialog_id).await {
                Ok(turn) => ReplaceOutcome::Restarted(turn),
                Err(e) => ReplaceOutcome::RestartFailed(e),
            });
        }
        Ok(ReplaceOutcome::Updated)
    }

    /// Delete a dialog. The proxy's listing lags behind deletes, so the
    /// refresh runs only after the configured delay.
    pub async fn delete(&self, dialog_id: &str) -> Result<DeleteOutcome, ConsoleError> {
        if !self.inner.lock().pending_deletes.insert(dialog_id.to_string()) {
            tracing::debug!(dialog_id, "delete already pending");
            return Ok(DeleteOutcome::AlreadyPending);
        }

        let deleted = {
            let _busy = BusyGuard::new(&self.inner);
            self.inner.proxy.delete_dialog(dialog_id).await
        };
        if let Err(e) = deleted {
            self.inner.lock().pending_deletes.remove(dialog_id);
            return Err(ConsoleError::from_proxy(Action::Delete, e));
        }

        tracing::info!(dialog_id, "dialog deleted, refresh scheduled");
        let inner = Arc::clone(&self.inner);
        let dialog_id = dialog_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.delete_refresh_delay).await;
            let refreshed = inner.refresh().await;
            inner.lock().pending_deletes.remove(&dialog_id);
            refreshed
        });
        Ok(DeleteOutcome::Scheduled(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;
    use crate::proxy::testing::{MockDialogProxy, ProxyCall, dialog, reply};

    fn setup(delay: Duration) -> (Arc<MockDialogProxy>, DialogRegistry) {
        let proxy = Arc::new(MockDialogProxy::new());
        let registry = DialogRegistry::new(proxy.clone(), delay);
        (proxy, registry)
    }

    fn xml() -> DialogFile {
        DialogFile::new("pizza.xml", "<dialog/>")
    }

    #[tokio::test]
    async fn refresh_replaces_the_whole_list() {
        let (proxy, registry) = setup(Duration::ZERO);
        proxy.queue_list(vec![dialog("d1", "pizza"), dialog("d2", "weather")]);
        proxy.queue_list(vec![dialog("d3", "travel")]);

        assert_eq!(registry.refresh().await.unwrap(), 2);
        assert_eq!(registry.get(1).unwrap().name, "weather");

        assert_eq!(registry.refresh().await.unwrap(), 1);
        assert_eq!(registry.dialogs(), vec![dialog("d3", "travel")]);
        assert!(!registry.is_busy());
    }

    #[tokio::test]
    async fn empty_listing_means_no_dialogs() {
        let (proxy, registry) = setup(Duration::ZERO);
        proxy.queue_list(vec![dialog("d1", "pizza")]);
        proxy.queue_list(Vec::new());

        registry.refresh().await.unwrap();
        assert_eq!(registry.refresh().await.unwrap(), 0);
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_existing_list() {
        let (proxy, registry) = setup(Duration::ZERO);
        proxy.queue_list(vec![dialog("d1", "pizza")]);
        proxy.queue_list_error(ProxyError::server(500, "proxy is down"));

        registry.refresh().await.unwrap();
        let err = registry.refresh().await.unwrap_err();

        assert_eq!(err.to_string(), "Error getting the dialogs: proxy is down");
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_busy());
    }

    #[tokio::test]
    async fn stale_index_is_out_of_range() {
        let (proxy, registry) = setup(Duration::ZERO);
        proxy.queue_list(vec![dialog("d1", "a"), dialog("d2", "b"), dialog("d3", "c")]);
        proxy.queue_list(vec![dialog("d1", "a")]);

        registry.refresh().await.unwrap();
        let captured = 2;
        registry.refresh().await.unwrap();

        assert!(matches!(
            registry.get(captured),
            Err(ConsoleError::IndexOutOfRange { index: 2, len: 1 })
        ));
    }

    #[tokio::test]
    async fn create_without_name_or_file_makes_no_call() {
        let (proxy, registry) = setup(Duration::ZERO);

        let err = registry.create("", &xml()).await.unwrap_err();
        assert!(matches!(err, ConsoleError::Validation(_)));
        let err = registry.create("pizza", &DialogFile::new("empty.xml", "")).await.unwrap_err();
        assert!(matches!(err, ConsoleError::Validation(_)));

        assert!(proxy.recorded_calls().is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn blank_but_non_empty_name_is_submitted() {
        let (proxy, registry) = setup(Duration::ZERO);
        proxy.queue_mutation(Ok(()));
        proxy.queue_list(vec![dialog("d1", "  ")]);

        assert_eq!(registry.create("  ", &xml()).await.unwrap(), 1);
        assert_eq!(
            proxy.recorded_calls()[0],
            ProxyCall::Create {
                name: "  ".to_string(),
                file: xml()
            }
        );
    }

    #[tokio::test]
    async fn registry_is_busy_while_a_call_is_pending() {
        let (proxy, registry) = setup(Duration::ZERO);
        proxy.queue_delayed_mutation(Duration::from_millis(50), Ok(()));
        proxy.queue_list(vec![dialog("d1", "pizza")]);

        let pending = registry.clone();
        let create = tokio::spawn(async move { pending.create("pizza", &xml()).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(registry.is_busy());

        assert_eq!(create.await.unwrap().unwrap(), 1);
        assert!(!registry.is_busy());
    }

    #[tokio::test]
    async fn create_refreshes_and_adds_one_entry() {
        let (proxy, registry) = setup(Duration::ZERO);
        proxy.queue_list(vec![dialog("d1", "weather")]);
        registry.refresh().await.unwrap();

        proxy.queue_mutation(Ok(()));
        proxy.queue_list(vec![dialog("d1", "weather"), dialog("d2", "pizza")]);
        let count = registry.create("pizza", &xml()).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(registry.get(1).unwrap().name, "pizza");
        assert_eq!(
            proxy.recorded_calls()[1],
            ProxyCall::Create {
                name: "pizza".to_string(),
                file: xml()
            }
        );
    }

    #[tokio::test]
    async fn failed_create_surfaces_message_and_skips_refresh() {
        let (proxy, registry) = setup(Duration::ZERO);
        proxy.queue_mutation(Err(ProxyError::server(400, "")));

        let err = registry.create("pizza", &xml()).await.unwrap_err();

        assert_eq!(err.to_string(), "Error creating the dialogs.");
        assert_eq!(proxy.count(|c| matches!(c, ProxyCall::List)), 0);
        assert!(!registry.is_busy());
    }

    #[tokio::test]
    async fn delete_refreshes_after_delay_and_is_issued_once() {
        let (proxy, registry) = setup(Duration::from_millis(50));
        proxy.queue_list(vec![dialog("d1", "pizza"), dialog("d2", "weather")]);
        registry.refresh().await.unwrap();

        proxy.queue_mutation(Ok(()));
        proxy.queue_list(vec![dialog("d2", "weather")]);
        let first = registry.delete("d1").await.unwrap();
        let second = registry.delete("d1").await.unwrap();

        assert!(matches!(second, DeleteOutcome::AlreadyPending));
        // the listing is not trusted until the delay elapses
        assert_eq!(registry.len(), 2);

        let DeleteOutcome::Scheduled(handle) = first else {
            panic!("expected a scheduled refresh");
        };
        assert_eq!(handle.await.unwrap().unwrap(), 1);
        assert_eq!(registry.dialogs(), vec![dialog("d2", "weather")]);
        assert_eq!(proxy.count(|c| matches!(c, ProxyCall::Delete { .. })), 1);
    }

    #[tokio::test]
    async fn failed_delete_keeps_entry_and_allows_retry() {
        let (proxy, registry) = setup(Duration::ZERO);
        proxy.queue_list(vec![dialog("d1", "pizza")]);
        registry.refresh().await.unwrap();

        proxy.queue_mutation(Err(ProxyError::server(404, "Dialog not found")));
        let err = registry.delete("d1").await.unwrap_err();
        assert_eq!(err.to_string(), "Error deleting the dialogs: Dialog not found");
        assert_eq!(registry.len(), 1);

        proxy.queue_mutation(Ok(()));
        proxy.queue_list(Vec::new());
        let outcome = registry.delete("d1").await.unwrap();
        assert!(matches!(outcome, DeleteOutcome::Scheduled(_)));
    }

    #[tokio::test]
    async fn replace_restarts_the_conversation_on_that_dialog() {
        let (proxy, registry) = setup(Duration::ZERO);
        let session = ConversationSession::new(proxy.clone());
        proxy.queue_reply(reply("c1", "u1", &["Hi"]));
        session.start("d1").await.unwrap();

        proxy.queue_mutation(Ok(()));
        proxy.queue_reply(reply("c2", "u2", &["Hi again"]));
        let outcome = registry.replace("d1", &xml(), &session).await.unwrap();

        let ReplaceOutcome::Restarted(turn) = outcome else {
            panic!("expected a restart, got {outcome:?}");
        };
        assert_eq!(turn.lines, vec!["Hi again".to_string()]);
        assert_eq!(session.current().unwrap().conversation_id, "c2");
    }

    #[tokio::test]
    async fn replace_of_another_dialog_leaves_conversation_alone() {
        let (proxy, registry) = setup(Duration::ZERO);
        let session = ConversationSession::new(proxy.clone());
        proxy.queue_reply(reply("c1", "u1", &["Hi"]));
        session.start("d1").await.unwrap();

        proxy.queue_mutation(Ok(()));
        let outcome = registry.replace("d2", &xml(), &session).await.unwrap();

        assert!(matches!(outcome, ReplaceOutcome::Updated));
        assert_eq!(session.current().unwrap().conversation_id, "c1");
        assert_eq!(proxy.count(|c| matches!(c, ProxyCall::List)), 0);
    }

    #[tokio::test]
    async fn failed_replace_uses_update_banner() {
        let (proxy, registry) = setup(Duration::ZERO);
        let session = ConversationSession::new(proxy.clone());
        proxy.queue_mutation(Err(ProxyError::server(400, "Invalid XML")));

        let err = registry.replace("d1", &xml(), &session).await.unwrap_err();
        assert_eq!(err.to_string(), "Error updating the dialogs: Invalid XML");
    }

    #[tokio::test]
    async fn upload_succeeds_even_when_restart_fails() {
        let (proxy, registry) = setup(Duration::ZERO);
        let session = ConversationSession::new(proxy.clone());
        proxy.queue_reply(reply("c1", "u1", &["Hi"]));
        session.start("d1").await.unwrap();

        proxy.queue_mutation(Ok(()));
        proxy.queue_reply_error(ProxyError::server(500, "Dialog unavailable"));
        let outcome = registry.replace("d1", &xml(), &session).await.unwrap();

        let ReplaceOutcome::RestartFailed(err) = outcome else {
            panic!("expected a failed restart, got {outcome:?}");
        };
        assert_eq!(err.to_string(), "Error starting the conversation: Dialog unavailable");
        assert_eq!(session.current().unwrap().conversation_id, "c1");
        assert!(!registry.is_busy());
    }
}
