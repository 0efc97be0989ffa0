//! Source and transformed document value types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoverError, Result};

/// How far into a PDF the `%PDF-` header may appear. Some producers emit a
/// few bytes of junk before it and readers are required to tolerate that.
const PDF_HEADER_WINDOW: usize = 1024;

const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";

/// The two container formats a cover can be inserted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Epub,
}

impl DocumentFormat {
    /// Detect format from a bare tag or a file extension (with or without dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "epub" => Some(DocumentFormat::Epub),
            _ => None,
        }
    }

    /// Detect format from a MIME type, as delivered by chat attachments.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "application/pdf" => Some(DocumentFormat::Pdf),
            "application/epub+zip" => Some(DocumentFormat::Epub),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Epub => "epub",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Epub => "application/epub+zip",
        }
    }

    /// Check the container signature of `bytes` against this format.
    pub fn matches_signature(&self, bytes: &[u8]) -> bool {
        match self {
            DocumentFormat::Pdf => {
                let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
                window.windows(5).any(|w| w == b"%PDF-")
            }
            DocumentFormat::Epub => bytes.starts_with(ZIP_LOCAL_HEADER),
        }
    }

    /// The parse error this format reports for unreadable input.
    pub(crate) fn parse_error(&self, detail: impl Into<String>) -> CoverError {
        match self {
            DocumentFormat::Pdf => CoverError::PdfParse(detail.into()),
            DocumentFormat::Epub => CoverError::EpubParse(detail.into()),
        }
    }
}

impl FromStr for DocumentFormat {
    type Err = CoverError;

    fn from_str(s: &str) -> Result<Self> {
        DocumentFormat::from_extension(s)
            .or_else(|| DocumentFormat::from_mime(s))
            .ok_or_else(|| CoverError::UnsupportedInputFormat(s.to_string()))
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Pdf => write!(f, "PDF"),
            DocumentFormat::Epub => write!(f, "EPUB"),
        }
    }
}

/// An incoming document: raw bytes plus the format the caller declared.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    bytes: Vec<u8>,
    format: DocumentFormat,
    file_name: Option<String>,
}

impl SourceDocument {
    pub fn new(bytes: Vec<u8>, format: DocumentFormat) -> Self {
        Self {
            bytes,
            format,
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Fail with the format's parse error when the bytes do not carry the
    /// declared container signature.
    pub fn verify_signature(&self) -> Result<()> {
        if self.bytes.is_empty() {
            return Err(self.format.parse_error("document is empty"));
        }
        if !self.format.matches_signature(&self.bytes) {
            return Err(self.format.parse_error(format!(
                "content does not look like a {} container",
                self.format
            )));
        }
        Ok(())
    }
}

/// The result of a successful insertion.
#[derive(Debug, Clone)]
pub struct TransformedDocument {
    pub bytes: Vec<u8>,
    pub format: DocumentFormat,
    pub file_name: String,
}

/// Build the reply filename: `<prefix><original>`, or a generic name with the
/// format's extension when the original name is unknown.
pub fn suggested_file_name(original: Option<&str>, prefix: &str, format: DocumentFormat) -> String {
    let base = original
        .map(|name| name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name))
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("document.{}", format.extension()));
    format!("{}{}", prefix, base)
}
