use thiserror::Error;

/// Every way a cover insertion can fail.
///
/// Each variant is a distinct kind so the caller can pick a user-facing
/// message per kind; see [`CoverError::kind`].
#[derive(Error, Debug)]
pub enum CoverError {
    #[error("Cover asset not found: {0}")]
    AssetNotFound(String),

    #[error("Cover asset is corrupt: {0}")]
    AssetCorrupt(String),

    #[error("Cover asset format not supported: {0} (expected JPEG or PNG)")]
    AssetUnsupportedFormat(String),

    #[error("Unsupported input format: {0}")]
    UnsupportedInputFormat(String),

    #[error("PDF parse error: {0}")]
    PdfParse(String),

    #[error("EPUB parse error: {0}")]
    EpubParse(String),

    #[error("PDF write error: {0}")]
    PdfWrite(String),

    #[error("EPUB write error: {0}")]
    EpubWrite(String),

    #[error("Transformation timed out after {0} ms")]
    TransformTimeout(u128),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable tag for a [`CoverError`], independent of its detail text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AssetNotFound,
    AssetCorrupt,
    AssetUnsupportedFormat,
    UnsupportedInputFormat,
    PdfParseError,
    EpubParseError,
    PdfWriteError,
    EpubWriteError,
    TransformTimeout,
    Io,
    Internal,
}

impl CoverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoverError::AssetNotFound(_) => ErrorKind::AssetNotFound,
            CoverError::AssetCorrupt(_) => ErrorKind::AssetCorrupt,
            CoverError::AssetUnsupportedFormat(_) => ErrorKind::AssetUnsupportedFormat,
            CoverError::UnsupportedInputFormat(_) => ErrorKind::UnsupportedInputFormat,
            CoverError::PdfParse(_) => ErrorKind::PdfParseError,
            CoverError::EpubParse(_) => ErrorKind::EpubParseError,
            CoverError::PdfWrite(_) => ErrorKind::PdfWriteError,
            CoverError::EpubWrite(_) => ErrorKind::EpubWriteError,
            CoverError::TransformTimeout(_) => ErrorKind::TransformTimeout,
            CoverError::Io(_) => ErrorKind::Io,
            CoverError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the failure points at our side (log-worthy) rather than at
    /// the document the user sent.
    pub fn is_internal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::PdfWriteError
                | ErrorKind::EpubWriteError
                | ErrorKind::Io
                | ErrorKind::Internal
                | ErrorKind::AssetNotFound
                | ErrorKind::AssetCorrupt
                | ErrorKind::AssetUnsupportedFormat
        )
    }

    /// Display text capped at `max_chars` characters, for showing to an end user.
    /// Truncates on a char boundary and marks the cut with an ellipsis.
    pub fn user_message(&self, max_chars: usize) -> String {
        truncate_chars(&self.to_string(), max_chars)
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

pub type Result<T> = std::result::Result<T, CoverError>;
