//! In-memory ZIP utilities for reading and rewriting EPUB containers.

use std::io::{self, Cursor, Read, Seek, Write};

use zip::read::ZipArchive;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One entry of a ZIP archive, fully read into memory.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub is_dir: bool,
    /// Whether the entry was stored without compression.
    pub stored: bool,
}

/// Read every entry of a ZIP archive held in memory, in archive order.
pub fn read_entries(bytes: &[u8]) -> io::Result<Vec<ArchiveEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        let is_dir = entry.is_dir();
        let stored = entry.compression() == CompressionMethod::Stored;
        let mut data = Vec::new();
        if !is_dir {
            entry.read_to_end(&mut data)?;
        }
        entries.push(ArchiveEntry {
            name,
            data,
            is_dir,
            stored,
        });
    }

    Ok(entries)
}

/// Find an entry by exact name.
pub fn find_entry<'a>(entries: &'a [ArchiveEntry], name: &str) -> Option<&'a ArchiveEntry> {
    entries.iter().find(|e| !e.is_dir && e.name == name)
}

/// Builder for creating ZIP archives (used for EPUB output).
pub struct ZipBuilder<W: Write + Seek> {
    writer: ZipWriter<W>,
}

impl ZipBuilder<Cursor<Vec<u8>>> {
    /// Start an archive backed by a growable buffer.
    pub fn in_memory() -> Self {
        Self::new(Cursor::new(Vec::new()))
    }

    /// Finish the archive and return its bytes.
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        Ok(self.finish()?.into_inner())
    }
}

impl<W: Write + Seek> ZipBuilder<W> {
    pub fn new(target: W) -> Self {
        Self {
            writer: ZipWriter::new(target),
        }
    }

    /// Add a file entry with the given content.
    pub fn add_file(&mut self, name: &str, content: &[u8]) -> io::Result<()> {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer.start_file(name, options)?;
        self.writer.write_all(content)?;
        Ok(())
    }

    /// Add a file entry stored without compression (used for mimetype in EPUB).
    pub fn add_stored(&mut self, name: &str, content: &[u8]) -> io::Result<()> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        self.writer.start_file(name, options)?;
        self.writer.write_all(content)?;
        Ok(())
    }

    /// Add a directory entry.
    pub fn add_directory(&mut self, name: &str) -> io::Result<()> {
        let options = SimpleFileOptions::default();
        self.writer.add_directory(name, options)?;
        Ok(())
    }

    /// Finish writing the ZIP archive.
    pub fn finish(self) -> io::Result<W> {
        Ok(self.writer.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zip_roundtrip() {
        let mut builder = ZipBuilder::in_memory();
        builder
            .add_stored("mimetype", b"application/epub+zip")
            .unwrap();
        builder.add_directory("META-INF/").unwrap();
        builder.add_file("content.xml", b"<root/>").unwrap();
        let bytes = builder.into_bytes().unwrap();

        let entries = read_entries(&bytes).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "mimetype");
        assert!(entries[0].stored);
        assert!(entries[1].is_dir);
        assert!(!entries[2].stored);

        let content = find_entry(&entries, "content.xml").unwrap();
        assert_eq!(content.data, b"<root/>");
        assert!(find_entry(&entries, "META-INF/").is_none());
    }

    #[test]
    fn test_read_entries_rejects_garbage() {
        assert!(read_entries(b"not a zip at all").is_err());
    }
}
