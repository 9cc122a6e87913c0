//! This module provides functionality for keeping the application state
use crate::model::error::FormErrors;
use crate::model::file_record::{FileRecord, StorageStats};
use crate::model::upload_progress_item::UploadProgressItem;
use crate::model::user::User;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ActivePage {
    #[default]
    Dashboard,
    Help,
}

/// Represents entire state of the application, each page transforms this information for
/// suitable Props object
#[derive(Debug, Clone, Default)]
pub struct State {
    pub active_page: ActivePage,
    pub user: Option<User>,
    pub files: Vec<FileRecord>,
    pub stats: StorageStats,
    pub loading: bool,
    /// Ids of files with a delete request in flight
    pub deleting: Vec<u64>,
    pub dashboard_errors: FormErrors,
    pub uploads: Vec<UploadProgressItem>,
    /// `(file name, message)` of failed uploads
    pub upload_errors: Vec<(String, String)>,
    pub upload_general_error: Option<String>,
    pub active_uploads: usize,
    /// Set when uploading is unavailable, e.g. without a session token
    pub upload_blocked: Option<String>,
    /// Per-file upload limit in bytes
    pub max_file_size: u64,
}

impl State {
    pub fn set_active_page(&mut self, page: ActivePage) {
        self.active_page = page;
    }

    pub fn is_deleting(&self, id: u64) -> bool {
        self.deleting.contains(&id)
    }
}
