use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Characters left unescaped in a download path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// One uploaded file in the shared folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedFile {
    pub name: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

impl SharedFile {
    /// Path clients use to download this file
    pub fn download_url(&self) -> String {
        download_url(&self.name)
    }
}

/// Entry in the polled file list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub url: String,
}

impl From<&SharedFile> for FileEntry {
    fn from(file: &SharedFile) -> Self {
        Self {
            name: file.name.clone(),
            url: file.download_url(),
        }
    }
}

pub fn download_url(name: &str) -> String {
    format!("/uploads/{}", utf8_percent_encode(name, PATH_SEGMENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_url_plain_name() {
        assert_eq!(download_url("note.txt"), "/uploads/note.txt");
    }

    #[test]
    fn test_download_url_escapes_unicode_and_reserved() {
        assert_eq!(download_url("a#b.txt"), "/uploads/a%23b.txt");
        assert_eq!(download_url("文.txt"), "/uploads/%E6%96%87.txt");
    }

    #[test]
    fn test_file_entry_serializes_name_and_url() {
        let file = SharedFile {
            name: "note.txt".to_string(),
            size: 4,
            modified_at: Utc::now(),
        };
        let json = serde_json::to_value(FileEntry::from(&file)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "note.txt", "url": "/uploads/note.txt"})
        );
    }
}
