//! Owns the dashboard and the upload tracker, turns actions and events into [`State`]
use std::sync::Arc;

use color_eyre::eyre;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::broadcast;

use crate::termination::{Interrupted, Terminator};
use volt_tui::model::action::Action;
use volt_tui::model::error::{ApiError, ApiResult, FormErrors};
use volt_tui::model::file_record::{FileRecord, StorageStats};
use volt_tui::model::state::State;
use volt_tui::services::api_client::{FileApi, UploadApi, VoltClient};
use volt_tui::services::batch_debouncer::{sleep_until, Clock, DebounceTimings, SystemClock};
use volt_tui::services::dashboard::{Dashboard, DeletingGuard};
use volt_tui::services::transfer_channel::{UploadOptions, UploadQueue};
use volt_tui::services::upload_tracker::UploadTracker;
use volt_tui::settings::app_config::AppConfig;
use volt_tui::settings::session::SessionStore;

/// Results of API calls running in the background
enum ApiEvent {
    Files(ApiResult<Vec<FileRecord>>),
    Stats(ApiResult<StorageStats>),
    /// The guard is dropped only once the outcome has been applied
    Deleted {
        id: u64,
        result: ApiResult<()>,
        guard: DeletingGuard,
    },
}

pub struct StateStore {
    state_tx: UnboundedSender<State>,
    config: AppConfig,
    session: Arc<dyn SessionStore>,
    client: Arc<VoltClient>,
}

impl StateStore {
    pub fn new(
        config: AppConfig,
        session: Arc<dyn SessionStore>,
        client: Arc<VoltClient>,
    ) -> (Self, UnboundedReceiver<State>) {
        let (state_tx, state_rx) = mpsc::unbounded_channel::<State>();

        (
            StateStore {
                state_tx,
                config,
                session,
                client,
            },
            state_rx,
        )
    }
}

impl StateStore {
    fn fetch_files(&self, api_tx: UnboundedSender<ApiEvent>) {
        let client = self.client.clone();
        let user = self.session.user();
        tokio::spawn(async move {
            let result = match user {
                Some(user) => client.list_files(user.id).await,
                None => Err(ApiError::MissingCredential),
            };
            let _ = api_tx.send(ApiEvent::Files(result));
        });
    }

    fn fetch_stats(&self, api_tx: UnboundedSender<ApiEvent>) {
        let client = self.client.clone();
        tokio::spawn(async move {
            let _ = api_tx.send(ApiEvent::Stats(client.storage_stats().await));
        });
    }

    fn delete_file(&self, guard: DeletingGuard, api_tx: UnboundedSender<ApiEvent>) {
        let client = self.client.clone();
        tokio::spawn(async move {
            let id = guard.id();
            let result = client.delete_file(id).await;
            let _ = api_tx.send(ApiEvent::Deleted { id, result, guard });
        });
    }

    fn publish(
        &self,
        state: &mut State,
        dashboard: &Dashboard,
        tracker: Option<&UploadTracker>,
        active_uploads: usize,
    ) -> eyre::Result<()> {
        state.files = dashboard.files().to_vec();
        state.stats = dashboard.stats().clone();
        state.loading = dashboard.is_loading();
        state.deleting = dashboard.deleting_ids();
        state.dashboard_errors = dashboard.errors().clone();
        state.active_uploads = active_uploads;
        if let Some(tracker) = tracker {
            state.uploads = tracker.progress_items();
            state.upload_errors = tracker.errors();
            state.upload_general_error = tracker
                .general_errors()
                .general_message()
                .map(str::to_string);
        }
        self.state_tx.send(state.clone())?;
        Ok(())
    }

    pub async fn main_loop(
        self,
        mut terminator: Terminator,
        mut action_rx: UnboundedReceiver<Action>,
        mut interrupt_rx: broadcast::Receiver<Interrupted>,
    ) -> eyre::Result<Interrupted> {
        let clock = SystemClock;
        let timings = DebounceTimings {
            quiescence: self.config.quiescence(),
            clear_after: self.config.clear_progress_after(),
        };
        let mut dashboard = Dashboard::new();
        let (mut tracker, upload_blocked) = match UploadTracker::mount(self.session.as_ref(), timings)
        {
            Ok(tracker) => (Some(tracker), None),
            Err(e) => {
                let message = FormErrors::from_api_error(&e)
                    .general_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| e.to_string());
                (None, Some(message))
            }
        };
        let uploader: Arc<dyn UploadApi> = self.client.clone();
        let (queue, mut transfer_rx) = UploadQueue::new(uploader, UploadOptions::from(&self.config));
        let (api_tx, mut api_rx) = mpsc::unbounded_channel::<ApiEvent>();

        let mut state = State {
            user: self.session.user(),
            upload_blocked,
            max_file_size: self.config.max_file_size,
            ..State::default()
        };

        self.fetch_files(api_tx.clone());
        self.fetch_stats(api_tx.clone());

        // the initial state once
        self.publish(&mut state, &dashboard, tracker.as_ref(), 0)?;

        let result = loop {
            let deadline = tracker.as_ref().and_then(UploadTracker::next_deadline);

            tokio::select! {
                Some(action) = action_rx.recv() => match action {
                    Action::Exit => {
                        queue.cancel_all().await;
                        let _ = terminator.terminate(Interrupted::UserInt);

                        break Interrupted::UserInt;
                    },
                    Action::Navigate { page } => state.set_active_page(page),
                    Action::Refresh => {
                        dashboard.set_loading(true);
                        dashboard.clear_errors();
                        self.fetch_files(api_tx.clone());
                        self.fetch_stats(api_tx.clone());
                    },
                    Action::Upload { paths } => {
                        if tracker.is_some() {
                            queue.enqueue(paths).await;
                        } else {
                            tracing::warn!("upload of {} files refused: not logged in", paths.len());
                        }
                    },
                    Action::DeleteFile { id } => match dashboard.begin_delete(id) {
                        Some(guard) => self.delete_file(guard, api_tx.clone()),
                        None => tracing::debug!("ignoring repeated delete of {}", id),
                    },
                    Action::CancelUpload { id } => {
                        queue.cancel(id).await;
                    },
                    Action::CancelAllUploads => {
                        queue.cancel_all().await;
                    },
                    Action::ClearUploadErrors => {
                        if let Some(tracker) = tracker.as_mut() {
                            tracker.clear_errors();
                        }
                    },
                },
                Some(event) = transfer_rx.recv() => {
                    if let Some(tracker) = tracker.as_mut() {
                        tracker.handle(event, clock.now());
                    }
                },
                Some(event) = api_rx.recv() => match event {
                    ApiEvent::Files(result) => dashboard.apply_files(result),
                    ApiEvent::Stats(result) => dashboard.apply_stats(result),
                    ApiEvent::Deleted { id, result, guard } => {
                        if dashboard.apply_delete(id, result) {
                            self.fetch_stats(api_tx.clone());
                        }
                        drop(guard);
                    },
                },
                _ = sleep_until(deadline) => {
                    if let Some(batch) = tracker.as_mut().and_then(|t| t.poll(clock.now())) {
                        dashboard.merge_upload_batch(batch.files, batch.stats);
                    }
                },
                // Catch and handle interrupt signal to gracefully shutdown
                Ok(interrupted) = interrupt_rx.recv() => {
                    queue.cancel_all().await;

                    break interrupted;
                }
            }

            let active_uploads = queue.active_count().await;
            self.publish(&mut state, &dashboard, tracker.as_ref(), active_uploads)?;
        };

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::termination::create_termination;
    use volt_tui::model::state::ActivePage;
    use volt_tui::settings::session::MemorySessionStore;

    fn store_without_session() -> (StateStore, UnboundedReceiver<State>) {
        let session: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let client = Arc::new(VoltClient::new("http://127.0.0.1:9", session.clone()).unwrap());
        StateStore::new(AppConfig::default(), session, client)
    }

    #[tokio::test]
    async fn test_uploads_blocked_without_session() {
        let (store, mut state_rx) = store_without_session();
        let (terminator, interrupt_rx) = create_termination();
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(store.main_loop(terminator, action_rx, interrupt_rx));

        let first = state_rx.recv().await.unwrap();
        assert_eq!(
            first.upload_blocked.as_deref(),
            Some("Authentication required. Please log in again.")
        );
        assert_eq!(first.max_file_size, AppConfig::default().max_file_size);

        action_tx.send(Action::Exit).unwrap();
        assert_eq!(handle.await.unwrap().unwrap(), Interrupted::UserInt);
    }

    #[tokio::test]
    async fn test_navigate_changes_active_page() {
        let (store, mut state_rx) = store_without_session();
        let (terminator, interrupt_rx) = create_termination();
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(store.main_loop(terminator, action_rx, interrupt_rx));

        action_tx
            .send(Action::Navigate {
                page: ActivePage::Help,
            })
            .unwrap();
        loop {
            let state = state_rx.recv().await.unwrap();
            if state.active_page == ActivePage::Help {
                break;
            }
        }

        action_tx.send(Action::Exit).unwrap();
        assert_eq!(handle.await.unwrap().unwrap(), Interrupted::UserInt);
    }

    #[tokio::test]
    async fn test_listing_without_session_reports_error() {
        let (store, mut state_rx) = store_without_session();
        let (terminator, interrupt_rx) = create_termination();
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(store.main_loop(terminator, action_rx, interrupt_rx));

        loop {
            let state = state_rx.recv().await.unwrap();
            if !state.loading {
                assert!(state.files.is_empty());
                assert!(state.dashboard_errors.general_message().is_some());
                break;
            }
        }

        action_tx.send(Action::Exit).unwrap();
        handle.await.unwrap().unwrap();
    }
}
