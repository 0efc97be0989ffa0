//! Writes the modified book as a fresh OCF container.

use std::collections::{HashMap, HashSet};

use cover_core::error::{CoverError, Result};
use cover_utils::archive::{ArchiveEntry, ZipBuilder};
use cover_utils::mime;

const MIMETYPE_PATH: &str = "mimetype";
const EPUB_MIMETYPE: &[u8] = b"application/epub+zip";

/// A file that did not exist in the source archive.
pub(crate) struct NewEntry {
    pub path: String,
    pub data: Vec<u8>,
    pub media_type: &'static str,
}

/// `mimetype` first and stored, then every original entry in its original
/// order (with `replaced` contents substituted), then `added`.
pub(crate) fn write_archive(
    entries: &[ArchiveEntry],
    replaced: &HashMap<String, Vec<u8>>,
    added: &[NewEntry],
) -> Result<Vec<u8>> {
    let write_err = |e: std::io::Error| CoverError::EpubWrite(format!("Failed to write EPUB: {}", e));

    let mimetype = entries
        .iter()
        .find(|e| e.name == MIMETYPE_PATH && !e.data.is_empty())
        .map(|e| e.data.as_slice())
        .unwrap_or(EPUB_MIMETYPE);

    let mut zip = ZipBuilder::in_memory();
    zip.add_stored(MIMETYPE_PATH, mimetype).map_err(write_err)?;

    let mut written: HashSet<&str> = HashSet::new();
    written.insert(MIMETYPE_PATH);

    for entry in entries {
        if !written.insert(entry.name.as_str()) {
            log::debug!("Dropping duplicate archive entry {}", entry.name);
            continue;
        }
        if entry.is_dir {
            zip.add_directory(&entry.name).map_err(write_err)?;
            continue;
        }
        let data = replaced
            .get(&entry.name)
            .map(|d| d.as_slice())
            .unwrap_or(&entry.data);
        if entry.stored {
            zip.add_stored(&entry.name, data).map_err(write_err)?;
        } else {
            zip.add_file(&entry.name, data).map_err(write_err)?;
        }
    }

    for entry in added {
        if mime::is_precompressed_media(entry.media_type) {
            zip.add_stored(&entry.path, &entry.data).map_err(write_err)?;
        } else {
            zip.add_file(&entry.path, &entry.data).map_err(write_err)?;
        }
    }

    zip.into_bytes().map_err(write_err)
}
