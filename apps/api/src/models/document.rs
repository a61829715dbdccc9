use bytes::Bytes;
use thiserror::Error;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
const PDF_SIGNATURE: &[u8] = b"%PDF-";
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("no resume document was provided")]
    Missing,

    #[error("resume document is empty")]
    Empty,

    #[error("only PDF resumes are supported (got '{0}')")]
    UnsupportedType(String),

    #[error("resume document is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}

/// A resume as uploaded by the user, before it is sent to the engine.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ResumeDocument {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, bytes: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Client-side checks performed before any network call: non-empty,
    /// within `max_bytes`, declared as PDF (if declared at all) and carrying
    /// the PDF signature.
    pub fn validate(&self, max_bytes: usize) -> Result<(), DocumentError> {
        if self.is_empty() {
            return Err(DocumentError::Empty);
        }
        if self.len() > max_bytes {
            return Err(DocumentError::TooLarge {
                size: self.len(),
                limit: max_bytes,
            });
        }
        if let Some(declared) = self.content_type.as_deref() {
            let essence = declared.split(';').next().unwrap_or_default().trim();
            if !essence.eq_ignore_ascii_case(PDF_CONTENT_TYPE) {
                return Err(DocumentError::UnsupportedType(essence.to_string()));
            }
        }
        if !self.bytes.starts_with(PDF_SIGNATURE) {
            let shown = self
                .file_name
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_lowercase())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(DocumentError::UnsupportedType(shown));
        }
        Ok(())
    }
}
