//! Dashboard state: the file list, the storage snapshot and in-flight deletes

use crate::model::error::{ApiResult, FormErrors};
use crate::model::file_record::{FileRecord, StorageStats};
use crate::services::api_client::FileApi;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

type DeletingSet = Arc<Mutex<HashSet<u64>>>;

/// Marks one file as being deleted for as long as it is alive
#[derive(Debug)]
pub struct DeletingGuard {
    id: u64,
    deleting: DeletingSet,
}

impl DeletingGuard {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for DeletingGuard {
    fn drop(&mut self) {
        if let Ok(mut deleting) = self.deleting.lock() {
            deleting.remove(&self.id);
        }
    }
}

#[derive(Debug, Default)]
pub struct Dashboard {
    files: Vec<FileRecord>,
    stats: StorageStats,
    errors: FormErrors,
    loading: bool,
    deleting: DeletingSet,
}

impl Dashboard {
    pub fn new() -> Self {
        Dashboard {
            loading: true,
            ..Dashboard::default()
        }
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn stats(&self) -> &StorageStats {
        &self.stats
    }

    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Prepend freshly uploaded files and take over the snapshot that came with them.
    ///
    /// An older row with the same reference id is dropped, the new record wins.
    pub fn merge_upload_batch(&mut self, files: Vec<FileRecord>, stats: StorageStats) {
        let mut seen = HashSet::new();
        // newest upload first, so a re-uploaded id keeps its latest record
        let mut merged: Vec<FileRecord> = files
            .into_iter()
            .rev()
            .filter(|f| seen.insert(f.id))
            .collect();
        merged.reverse();
        let added = merged.len();
        merged.extend(self.files.drain(..).filter(|f| !seen.contains(&f.id)));
        self.files = merged;
        self.stats = stats;
        tracing::info!("merged {} uploaded files, {} rows total", added, self.files.len());
    }

    /// Replace the rows with a fresh listing
    pub fn apply_files(&mut self, result: ApiResult<Vec<FileRecord>>) {
        self.loading = false;
        match result {
            Ok(files) => self.files = files,
            Err(e) => {
                tracing::error!("failed to load files: {}", e);
                self.files.clear();
                self.errors = FormErrors::from_api_error(&e);
            }
        }
    }

    pub fn apply_stats(&mut self, result: ApiResult<StorageStats>) {
        match result {
            Ok(stats) => self.stats = stats,
            Err(e) => {
                tracing::error!("failed to load storage stats: {}", e);
                self.errors = FormErrors::from_api_error(&e);
            }
        }
    }

    pub fn is_deleting(&self, id: u64) -> bool {
        self.deleting
            .lock()
            .map(|deleting| deleting.contains(&id))
            .unwrap_or(false)
    }

    pub fn deleting_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .deleting
            .lock()
            .map(|deleting| deleting.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Mark `id` as being deleted. `None` when a delete for it is already running.
    pub fn begin_delete(&self, id: u64) -> Option<DeletingGuard> {
        let mut deleting = self.deleting.lock().ok()?;
        if !deleting.insert(id) {
            tracing::debug!("delete of {} already in flight", id);
            return None;
        }
        Some(DeletingGuard {
            id,
            deleting: self.deleting.clone(),
        })
    }

    /// Apply the outcome of a delete request. Returns true when stats must be re-fetched.
    pub fn apply_delete(&mut self, id: u64, result: ApiResult<()>) -> bool {
        match result {
            Ok(()) => {
                self.files.retain(|f| f.id != id);
                true
            }
            Err(e) => {
                tracing::error!("failed to delete file {}: {}", id, e);
                self.errors = FormErrors::from_api_error(&e);
                false
            }
        }
    }

    /// Delete `id` on the server, drop its row, then reload the stats.
    ///
    /// Stats always come from the server and are never recomputed locally.
    pub async fn remove_file(&mut self, api: &dyn FileApi, id: u64) {
        let Some(_guard) = self.begin_delete(id) else {
            return;
        };
        let result = api.delete_file(id).await;
        if self.apply_delete(id, result) {
            let stats = api.storage_stats().await;
            self.apply_stats(stats);
        }
    }
}
