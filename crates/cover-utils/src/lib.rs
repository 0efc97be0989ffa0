//! Shared helpers for the cover inserters: ZIP, XML, MIME and href paths.

pub mod archive;
pub mod mime;
pub mod path;
pub mod xml;
