use crate::model::upload_outcome::UploadOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_UPLOAD_ID: AtomicU64 = AtomicU64::new(1);

/// Unique token for one enqueued transfer.
///
/// Two selected files that share a display name still get different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UploadId(u64);

impl UploadId {
    /// Generate a process-wide unique id
    pub fn generate() -> Self {
        UploadId(NEXT_UPLOAD_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for UploadId {
    fn from(id: u64) -> Self {
        UploadId(id)
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upload-{}", self.0)
    }
}

/// One file handed to the uploader
#[derive(Debug, Clone, PartialEq)]
pub struct UploadItem {
    pub id: UploadId,
    pub file_name: String,
    /// Last observed percentage, 0 to 100
    pub progress: u8,
    pub outcome: UploadOutcome,
}

impl UploadItem {
    pub fn new(id: UploadId, file_name: impl Into<String>) -> Self {
        UploadItem {
            id,
            file_name: file_name.into(),
            progress: 0,
            outcome: UploadOutcome::Pending,
        }
    }
}
