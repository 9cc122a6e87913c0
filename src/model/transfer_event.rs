use crate::model::upload_item::UploadId;

/// Raw answer of a finished transfer, parsed later by the tracker
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReply {
    pub status: u16,
    pub body: String,
}

impl UploadReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        UploadReply {
            status,
            body: body.into(),
        }
    }
}

/// Lifecycle events of one file transfer.
///
/// For every upload the channel emits `Started`, zero or more `Progress`
/// events with non-decreasing values, then exactly one of
/// `Finished`, `Failed` or `Cancelled`.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    Started { id: UploadId, file_name: String },
    /// `completed` is the fraction done scaled to 0..=100
    Progress { id: UploadId, completed: f64 },
    Finished { id: UploadId, reply: UploadReply },
    Failed { id: UploadId, message: String },
    Cancelled { id: UploadId },
}

impl TransferEvent {
    pub fn id(&self) -> UploadId {
        match self {
            TransferEvent::Started { id, .. }
            | TransferEvent::Progress { id, .. }
            | TransferEvent::Finished { id, .. }
            | TransferEvent::Failed { id, .. }
            | TransferEvent::Cancelled { id } => *id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferEvent::Finished { .. } | TransferEvent::Failed { .. } | TransferEvent::Cancelled { .. }
        )
    }
}
