//! Lifecycle of a single upload
//!
//! An upload starts `Pending` and ends in exactly one terminal outcome.
//! Once terminal, further transfer events for the same upload are ignored.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum UploadOutcome {
    /// Queued or transferring
    #[default]
    Pending,
    /// Transfer finished and the server answered with a 2xx status
    Succeeded,
    /// Transfer or server rejected the file
    Failed(String),
    /// Cancelled before a terminal answer arrived
    Cancelled,
}

impl UploadOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, UploadOutcome::Pending)
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, UploadOutcome::Succeeded)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, UploadOutcome::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadOutcome::Cancelled)
    }

    /// Returns true once the upload can no longer change
    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            UploadOutcome::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadOutcome::Pending => write!(f, "Pending"),
            UploadOutcome::Succeeded => write!(f, "Succeeded"),
            UploadOutcome::Failed(msg) => write!(f, "Failed: {}", msg),
            UploadOutcome::Cancelled => write!(f, "Cancelled"),
        }
    }
}
