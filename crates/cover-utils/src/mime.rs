//! MIME type constants and helpers.

/// MIME type of EPUB 2 navigation control files.
pub const NCX: &str = "application/x-dtbncx+xml";

/// MIME type of XHTML content documents.
pub const XHTML: &str = "application/xhtml+xml";

/// Check if a media type is already compressed (deflating would waste CPU).
pub fn is_precompressed_media(media_type: &str) -> bool {
    matches!(
        media_type,
        "image/png"
            | "image/jpeg"
            | "image/gif"
            | "image/webp"
            | "image/avif"
            | "audio/mpeg"
            | "audio/ogg"
            | "video/mp4"
            | "font/woff"
            | "font/woff2"
    )
}
