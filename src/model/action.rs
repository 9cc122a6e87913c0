//! This module provides list of all possible actions which can be executed on the UI
use crate::model::state::ActivePage;
use crate::model::upload_item::UploadId;
use std::path::PathBuf;

/// List of all possible actions a user can execute
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Navigate { page: ActivePage },
    /// Reload the file list and the storage stats
    Refresh,
    Upload { paths: Vec<PathBuf> },
    DeleteFile { id: u64 },
    CancelUpload { id: UploadId },
    CancelAllUploads,
    /// Forget finished uploads and their errors
    ClearUploadErrors,
    Exit,
}
