use crate::model::upload_item::UploadId;

/// Keeps the state of a currently displayed upload progress bar
#[derive(Debug, Clone, PartialEq)]
pub struct UploadProgressItem {
    pub id: UploadId,
    pub file_name: String,
    pub progress: u8,
}

impl UploadProgressItem {
    pub fn ratio(&self) -> f64 {
        f64::from(self.progress.min(100)) / 100.0
    }

    pub fn label(&self) -> String {
        format!("{} {}%", self.file_name, self.progress)
    }
}
