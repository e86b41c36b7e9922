//! Document ingestion: turns uploaded files into the text handed to an agent.
//!
//! PDFs go through `pdf-extract`; plain-text uploads are taken as-is.
//! Extraction is CPU-bound: call `extract_documents` inside `spawn_blocking`.

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

/// Upload body limit: room for a batch of resume PDFs.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    fn is_plain_text(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("text/"))
            || self.name.to_lowercase().ends_with(".txt")
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No files were uploaded")]
    NoFiles,

    #[error("'{name}' could not be read: {reason}")]
    Unreadable { name: String, reason: String },

    #[error("'{name}' contains no extractable text")]
    Empty { name: String },
}

/// Extracts the text of every uploaded file and joins them into one message.
/// Each document is preceded by a `--- name ---` header so agents can tell them apart.
pub fn extract_documents(files: &[UploadedFile]) -> Result<String, IngestError> {
    if files.is_empty() {
        return Err(IngestError::NoFiles);
    }

    let mut sections = Vec::with_capacity(files.len());
    for file in files {
        let text = extract_text(file)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(IngestError::Empty {
                name: file.name.clone(),
            });
        }
        debug!("Extracted {} chars from '{}'", text.len(), file.name);
        sections.push(format!("--- {} ---\n{}", file.name, text));
    }
    Ok(sections.join("\n\n"))
}

fn extract_text(file: &UploadedFile) -> Result<String, IngestError> {
    if file.is_plain_text() {
        return String::from_utf8(file.data.to_vec()).map_err(|e| IngestError::Unreadable {
            name: file.name.clone(),
            reason: e.to_string(),
        });
    }
    pdf_extract::extract_text_from_mem(&file.data).map_err(|e| IngestError::Unreadable {
        name: file.name.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_file(name: &str, body: &str) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            content_type: Some("text/plain".to_string()),
            data: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_plain_text_files_are_joined_with_headers() {
        let files = vec![
            text_file("jane.txt", "Jane Doe, jane@x.com, 5 years Python\n"),
            text_file("john.txt", "  John Roe, john@x.com, 2 years Java"),
        ];
        let message = extract_documents(&files).unwrap();
        assert_eq!(
            message,
            "--- jane.txt ---\nJane Doe, jane@x.com, 5 years Python\n\n--- john.txt ---\nJohn Roe, john@x.com, 2 years Java"
        );
    }

    #[test]
    fn test_txt_extension_is_plain_text_without_content_type() {
        let file = UploadedFile {
            name: "JD.TXT".to_string(),
            content_type: None,
            data: Bytes::from_static(b"Looking for a Python engineer"),
        };
        assert!(file.is_plain_text());
    }

    #[test]
    fn test_no_files_is_an_error() {
        assert!(matches!(extract_documents(&[]), Err(IngestError::NoFiles)));
    }

    #[test]
    fn test_blank_file_is_rejected() {
        let err = extract_documents(&[text_file("blank.txt", "   \n")]).unwrap_err();
        assert!(matches!(err, IngestError::Empty { name } if name == "blank.txt"));
    }

    #[test]
    fn test_invalid_utf8_text_is_unreadable() {
        let file = UploadedFile {
            name: "bad.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            data: Bytes::from_static(&[0xff, 0xfe, 0xfd]),
        };
        assert!(matches!(
            extract_documents(&[file]),
            Err(IngestError::Unreadable { .. })
        ));
    }
}
