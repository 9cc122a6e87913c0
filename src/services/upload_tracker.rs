//! Per-upload progress and error tracking
//!
//! The tracker consumes [`TransferEvent`]s from any number of concurrent
//! uploads. It keeps three independent pieces of widget-local state:
//! - the progress map (upload -> percentage) that drives the progress bars
//! - the error map (upload -> last failure message)
//! - the pending results, flushed through a [`BatchDebouncer`]
//!
//! Handlers never return errors. Every failure ends up in the error map or
//! in the general error message, so one broken upload cannot affect another.

use crate::model::error::{ApiError, FormErrors};
use crate::model::file_record::{FileRecord, StorageStats, UploadResponse};
use crate::model::transfer_event::{TransferEvent, UploadReply};
use crate::model::upload_item::{UploadId, UploadItem};
use crate::model::upload_outcome::UploadOutcome;
use crate::model::upload_progress_item::UploadProgressItem;
use crate::services::batch_debouncer::{BatchDebouncer, DebounceSignal, DebounceTimings};
use crate::settings::session::SessionStore;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Successful uploads handed to the dashboard in one go
#[derive(Debug, Clone, PartialEq)]
pub struct UploadBatch {
    pub files: Vec<FileRecord>,
    pub stats: StorageStats,
}

pub struct UploadTracker {
    items: HashMap<UploadId, UploadItem>,
    progress: BTreeMap<UploadId, u8>,
    errors: BTreeMap<UploadId, String>,
    general_errors: FormErrors,
    results: BatchDebouncer<FileRecord, StorageStats>,
}

impl UploadTracker {
    pub fn new(timings: DebounceTimings) -> Self {
        UploadTracker {
            items: HashMap::new(),
            progress: BTreeMap::new(),
            errors: BTreeMap::new(),
            general_errors: FormErrors::new(),
            results: BatchDebouncer::new(timings),
        }
    }

    /// Create a tracker for a logged in user.
    ///
    /// Uploading without a token is refused up front instead of failing
    /// file by file.
    pub fn mount(session: &dyn SessionStore, timings: DebounceTimings) -> Result<Self, ApiError> {
        if session.token().is_none() {
            tracing::warn!("upload tracker not mounted: no session token");
            return Err(ApiError::MissingCredential);
        }
        Ok(Self::new(timings))
    }

    /// Dispatch one transfer event
    pub fn handle(&mut self, event: TransferEvent, now: Instant) {
        match event {
            TransferEvent::Started { id, file_name } => self.on_start(id, file_name),
            TransferEvent::Progress { id, completed } => self.on_progress(id, completed),
            TransferEvent::Finished { id, reply } => self.on_finish(id, reply, now),
            TransferEvent::Failed { id, message } => self.on_error(id, message),
            TransferEvent::Cancelled { id } => self.on_cancel(id),
        }
    }

    pub fn on_start(&mut self, id: UploadId, file_name: impl Into<String>) {
        let file_name = file_name.into();
        tracing::debug!(%id, %file_name, "upload started");
        self.items.insert(id, UploadItem::new(id, file_name));
        self.progress.insert(id, 0);
    }

    /// `completed` is a 0..=100 fraction; stored rounded and never lowered
    pub fn on_progress(&mut self, id: UploadId, completed: f64) {
        let Some(item) = self.live_item(id) else {
            return;
        };
        let pct = if completed.is_finite() {
            completed.clamp(0.0, 100.0).round() as u8
        } else {
            0
        };
        item.progress = item.progress.max(pct);
        let value = item.progress;
        let entry = self.progress.entry(id).or_insert(0);
        *entry = (*entry).max(value);
    }

    pub fn on_finish(&mut self, id: UploadId, reply: UploadReply, now: Instant) {
        let Some(item) = self.live_item(id) else {
            return;
        };
        item.outcome = UploadOutcome::Succeeded;
        item.progress = 100;
        let file_name = item.file_name.clone();

        match serde_json::from_str::<UploadResponse>(&reply.body) {
            Ok(response) => {
                let stats = response.storage_stats;
                let record = if response.success {
                    response.files.into_iter().next().map(FileRecord::from)
                } else {
                    None
                };
                if record.is_none() {
                    tracing::info!(%id, %file_name, "upload finished without a file record");
                }
                // a snapshot only counts when it came with a usable record
                let stats = record.as_ref().and(stats);
                self.results.record(record, stats, now);
            }
            Err(e) => {
                tracing::warn!(%id, %file_name, status = reply.status, "unreadable upload response: {}", e);
                self.general_errors = FormErrors::from_api_error(&ApiError::Decode(e.to_string()));
                self.results.record(None, None, now);
            }
        }

        // transferred bytes are done whatever the body said
        self.progress.insert(id, 100);
    }

    pub fn on_error(&mut self, id: UploadId, message: impl Into<String>) {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "Upload failed".to_string()
        } else {
            message
        };
        let Some(item) = self.live_item(id) else {
            return;
        };
        tracing::warn!(%id, file_name = %item.file_name, "upload failed: {}", message);
        item.outcome = UploadOutcome::Failed(message.clone());
        self.errors.insert(id, message);
        self.progress.remove(&id);
    }

    pub fn on_cancel(&mut self, id: UploadId) {
        let Some(item) = self.live_item(id) else {
            return;
        };
        tracing::debug!(%id, file_name = %item.file_name, "upload cancelled");
        item.outcome = UploadOutcome::Cancelled;
        self.progress.remove(&id);
    }

    /// Run due timers. Returns the batch to merge into the dashboard, if one is ready.
    pub fn poll(&mut self, now: Instant) -> Option<UploadBatch> {
        let mut batch = None;
        for signal in self.results.poll(now) {
            match signal {
                DebounceSignal::Flush(flushed) => {
                    tracing::info!("handing {} uploaded files to the dashboard", flushed.items.len());
                    batch = Some(UploadBatch {
                        files: flushed.items,
                        stats: flushed.snapshot,
                    });
                }
                DebounceSignal::ClearProgress => self.progress.clear(),
            }
        }
        batch
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.results.next_deadline()
    }

    pub fn progress(&self, id: UploadId) -> Option<u8> {
        self.progress.get(&id).copied()
    }

    /// Progress bars to display, in enqueue order
    pub fn progress_items(&self) -> Vec<UploadProgressItem> {
        self.progress
            .iter()
            .map(|(id, progress)| UploadProgressItem {
                id: *id,
                file_name: self.file_name(*id).to_string(),
                progress: *progress,
            })
            .collect()
    }

    pub fn error(&self, id: UploadId) -> Option<&str> {
        self.errors.get(&id).map(String::as_str)
    }

    /// `(file name, message)` for every failed upload
    pub fn errors(&self) -> Vec<(String, String)> {
        self.errors
            .iter()
            .map(|(id, msg)| (self.file_name(*id).to_string(), msg.clone()))
            .collect()
    }

    pub fn general_errors(&self) -> &FormErrors {
        &self.general_errors
    }

    pub fn item(&self, id: UploadId) -> Option<&UploadItem> {
        self.items.get(&id)
    }

    pub fn pending_results(&self) -> &[FileRecord] {
        self.results.pending()
    }

    pub fn has_active_uploads(&self) -> bool {
        self.items.values().any(|item| item.outcome.is_pending())
    }

    /// Drop the error messages, leave running uploads and pending results alone
    pub fn clear_errors(&mut self) {
        self.errors.clear();
        self.general_errors.clear();
    }

    /// Forget every upload, error and pending result
    pub fn reset(&mut self) {
        self.items.clear();
        self.progress.clear();
        self.errors.clear();
        self.general_errors.clear();
        self.results.reset();
    }

    fn file_name(&self, id: UploadId) -> &str {
        self.items
            .get(&id)
            .map(|item| item.file_name.as_str())
            .unwrap_or_default()
    }

    /// The item for `id` if it exists and has not reached a terminal outcome
    fn live_item(&mut self, id: UploadId) -> Option<&mut UploadItem> {
        match self.items.get_mut(&id) {
            Some(item) if !item.outcome.is_terminal() => Some(item),
            Some(item) => {
                tracing::debug!(%id, outcome = %item.outcome, "ignoring event for finished upload");
                None
            }
            None => {
                tracing::debug!(%id, "ignoring event for unknown upload");
                None
            }
        }
    }
}
