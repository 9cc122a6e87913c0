use chrono::{DateTime, Utc};
use humansize::{file_size_opts as options, FileSize};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Content-addressed blob as reported by the file service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub original_name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub storage_path: String,
    #[serde(default)]
    pub reference_count: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A file as shown on the dashboard: the user's reference plus the blob behind it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: u64,
    #[serde(default)]
    pub user_id: u64,
    #[serde(default)]
    pub file_id: u64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub is_duplicate: bool,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file: StoredFile,
}

impl FileRecord {
    pub fn to_columns(&self) -> Vec<String> {
        let created = self
            .created_at
            .map(|d| d.format("%b %d, %Y %H:%M").to_string())
            .unwrap_or_default();
        let flags = match (self.is_duplicate, self.is_private) {
            (true, true) => "duplicate, private",
            (true, false) => "duplicate",
            (false, true) => "private",
            (false, false) => "",
        };
        vec![
            self.display_name.clone(),
            format_size(self.file.size),
            self.file.mime_type.clone(),
            created,
            flags.to_string(),
        ]
    }
}

/// One entry of the `files` array returned by the upload endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub file_reference: FileRecord,
    #[serde(default)]
    pub file: StoredFile,
    #[serde(default)]
    pub was_duplicate: bool,
    #[serde(default)]
    pub saved_bytes: i64,
}

impl From<UploadedFile> for FileRecord {
    fn from(uploaded: UploadedFile) -> Self {
        // the reference's nested blob is empty in upload responses
        let file = if uploaded.file.id != 0 || uploaded.file_reference.file.id == 0 {
            uploaded.file
        } else {
            uploaded.file_reference.file.clone()
        };
        FileRecord {
            file,
            ..uploaded.file_reference
        }
    }
}

/// Aggregate storage usage for the logged in user. Always replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
    #[serde(default)]
    pub user_id: u64,
    #[serde(default)]
    pub total_files: u64,
    #[serde(default)]
    pub unique_files: u64,
    #[serde(default)]
    pub duplicate_files: u64,
    #[serde(default)]
    pub total_size_bytes: i64,
    #[serde(default)]
    pub actual_storage_bytes: i64,
    #[serde(default)]
    pub saved_bytes: i64,
    #[serde(default)]
    pub savings_percentage: f64,
    #[serde(default)]
    pub total_storage_used: i64,
    #[serde(default)]
    pub total_duplicates: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub storage_by_file_type: HashMap<String, i64>,
}

impl StorageStats {
    /// Duplicate count, whichever of the two fields the server filled in
    pub fn duplicates(&self) -> u64 {
        self.duplicate_files.max(self.total_duplicates)
    }

    pub fn storage_used(&self) -> String {
        format_size(self.total_storage_used)
    }
}

/// Body of a successful `POST /files/upload`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<UploadedFile>,
    #[serde(default)]
    pub storage_stats: Option<StorageStats>,
}

/// The file service encodes empty maps and slices as `null`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn format_size(bytes: i64) -> String {
    let bytes = bytes.max(0) as u64;
    bytes
        .file_size(options::CONVENTIONAL)
        .unwrap_or_else(|_| format!("{} B", bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPLOAD_BODY: &str = r#"{
        "success": true,
        "message": "File uploaded successfully",
        "files": [{
            "file_reference": {
                "id": 7, "user_id": 1, "file_id": 3, "display_name": "a.txt",
                "is_duplicate": false, "is_private": true,
                "created_at": "2024-05-01T10:00:00.123456+02:00",
                "updated_at": "2024-05-01T10:00:00.123456+02:00",
                "file": {"id": 0, "hash": "", "original_name": "", "mime_type": "", "size": 0,
                         "storage_path": "", "reference_count": 0, "created_at": "0001-01-01T00:00:00Z"}
            },
            "file": {"id": 3, "hash": "abc", "original_name": "a.txt", "mime_type": "text/plain",
                     "size": 12, "storage_path": "/data/abc", "reference_count": 1,
                     "created_at": "2024-05-01T08:00:00Z"},
            "was_duplicate": false,
            "saved_bytes": 0
        }],
        "storage_stats": {"user_id": 1, "total_files": 4, "duplicate_files": 1,
                          "total_storage_used": 2048, "storage_by_file_type": {"text/plain": 12}}
    }"#;

    #[test]
    fn test_parse_upload_response() {
        let resp: UploadResponse = serde_json::from_str(UPLOAD_BODY).unwrap();
        assert!(resp.success);
        assert_eq!(resp.files.len(), 1);
        let stats = resp.storage_stats.unwrap();
        assert_eq!(stats.total_files, 4);
        assert_eq!(stats.storage_by_file_type.get("text/plain"), Some(&12));
    }

    #[test]
    fn test_uploaded_file_into_record_takes_outer_blob() {
        let resp: UploadResponse = serde_json::from_str(UPLOAD_BODY).unwrap();
        let record: FileRecord = resp.files[0].clone().into();
        assert_eq!(record.id, 7);
        assert_eq!(record.display_name, "a.txt");
        assert_eq!(record.file.id, 3);
        assert_eq!(record.file.hash, "abc");
    }

    #[test]
    fn test_parse_listing_record() {
        let body = r#"[{"id": 42, "user_id": 1, "file_id": 9, "display_name": "b.png",
                        "is_duplicate": true, "is_private": false,
                        "file": {"id": 9, "mime_type": "image/png", "size": 2048}}]"#;
        let files: Vec<FileRecord> = serde_json::from_str(body).unwrap();
        assert_eq!(files[0].id, 42);
        assert!(files[0].is_duplicate);
        assert_eq!(files[0].to_columns()[4], "duplicate");
    }

    #[test]
    fn test_stats_defaults_when_fields_missing() {
        let stats: StorageStats = serde_json::from_str("{}").unwrap();
        assert_eq!(stats, StorageStats::default());
        let stats: StorageStats = serde_json::from_str(r#"{"total_duplicates": 3}"#).unwrap();
        assert_eq!(stats.duplicates(), 3);
    }

    #[test]
    fn test_null_map_and_slice_read_as_empty() {
        let stats: StorageStats =
            serde_json::from_str(r#"{"user_id": 1, "storage_by_file_type": null}"#).unwrap();
        assert_eq!(stats.user_id, 1);
        assert!(stats.storage_by_file_type.is_empty());

        let resp: UploadResponse =
            serde_json::from_str(r#"{"success": false, "files": null}"#).unwrap();
        assert!(resp.files.is_empty());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(-5), format_size(0));
        assert!(format_size(2048).contains("KB"));
    }
}
