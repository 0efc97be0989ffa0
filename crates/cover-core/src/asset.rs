//! Cover asset loading and validation.
//!
//! The asset is decoded in full once, so a truncated or otherwise damaged
//! image is rejected up front instead of surfacing as an obscure failure
//! inside a PDF or EPUB writer later.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::ImageFormat;

use crate::error::{CoverError, Result};

/// Pixel formats accepted for the cover image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoverFormat {
    Jpeg,
    Png,
}

impl CoverFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            CoverFormat::Jpeg => "image/jpeg",
            CoverFormat::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            CoverFormat::Jpeg => "jpg",
            CoverFormat::Png => "png",
        }
    }
}

impl fmt::Display for CoverFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverFormat::Jpeg => write!(f, "JPEG"),
            CoverFormat::Png => write!(f, "PNG"),
        }
    }
}

/// The fixed image prepended to every document. Immutable once validated;
/// clones share the underlying bytes.
#[derive(Clone)]
pub struct CoverAsset {
    bytes: Arc<[u8]>,
    format: CoverFormat,
    width: u32,
    height: u32,
}

impl CoverAsset {
    /// Read and validate the cover image at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| CoverError::AssetNotFound(format!("{}: {}", path.display(), e)))?;
        log::info!("Loaded cover asset {} ({} bytes)", path.display(), bytes.len());
        Self::from_bytes(bytes)
    }

    /// Validate an in-memory cover image.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes: Vec<u8> = bytes.into();
        if bytes.is_empty() {
            return Err(CoverError::AssetCorrupt("image is empty".to_string()));
        }

        let detected = image::guess_format(&bytes)
            .map_err(|e| CoverError::AssetCorrupt(format!("unrecognized image data: {}", e)))?;

        // Decode fully: header sniffing alone accepts truncated files.
        let decoded = image::load_from_memory_with_format(&bytes, detected)
            .map_err(|e| CoverError::AssetCorrupt(format!("failed to decode {:?}: {}", detected, e)))?;

        let format = match detected {
            ImageFormat::Jpeg => CoverFormat::Jpeg,
            ImageFormat::Png => CoverFormat::Png,
            other => {
                return Err(CoverError::AssetUnsupportedFormat(format!("{:?}", other)));
            }
        };

        let (width, height) = (decoded.width(), decoded.height());
        if width == 0 || height == 0 {
            return Err(CoverError::AssetCorrupt(format!(
                "image has no pixels ({}x{})",
                width, height
            )));
        }

        log::debug!("Cover asset validated: {} {}x{}", format, width, height);

        Ok(Self {
            bytes: Arc::from(bytes),
            format,
            width,
            height,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> CoverFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

impl fmt::Debug for CoverAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverAsset")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.bytes.len())
            .finish()
    }
}
