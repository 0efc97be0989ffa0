//! Container and package document parsing.
//!
//! Only what the cover splice needs is read: the rootfile path, the
//! manifest, the spine, and every `id` already in use.

use std::collections::HashSet;

use quick_xml::events::Event;
use quick_xml::Reader;

use cover_core::error::{CoverError, Result};
use cover_utils::archive::{find_entry, ArchiveEntry};
use cover_utils::mime;
use cover_utils::path::resolve_href;
use cover_utils::xml::{attr, collect_ids, extract_attributes, local_name};

pub(crate) const CONTAINER_PATH: &str = "META-INF/container.xml";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

impl ManifestItem {
    pub fn has_property(&self, name: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|p| p.split_whitespace().any(|token| token == name))
    }
}

/// The parts of an OPF package document the splice depends on.
#[derive(Debug, Clone, Default)]
pub(crate) struct Package {
    pub version: String,
    pub items: Vec<ManifestItem>,
    pub spine: Vec<String>,
    pub spine_toc: Option<String>,
    pub has_cover_meta: bool,
    pub ids: HashSet<String>,
}

impl Package {
    pub fn parse(opf: &str) -> Result<Self> {
        let mut reader = Reader::from_str(opf);
        let mut package = Package::default();
        let mut saw_manifest = false;
        let mut saw_spine = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match local_name(e).as_str() {
                    "package" => package.version = attr(e, "version").unwrap_or_default(),
                    "manifest" => saw_manifest = true,
                    "item" => {
                        if let (Some(id), Some(href)) = (attr(e, "id"), attr(e, "href")) {
                            package.items.push(ManifestItem {
                                id,
                                href,
                                media_type: attr(e, "media-type").unwrap_or_default(),
                                properties: attr(e, "properties"),
                            });
                        }
                    }
                    "spine" => {
                        saw_spine = true;
                        package.spine_toc = attr(e, "toc");
                    }
                    "itemref" => {
                        if let Some(idref) = attr(e, "idref") {
                            package.spine.push(idref);
                        }
                    }
                    "meta" => {
                        if attr(e, "name").as_deref() == Some("cover") {
                            package.has_cover_meta = true;
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(CoverError::EpubParse(format!(
                        "Malformed OPF near byte {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
        }

        if !saw_manifest {
            return Err(CoverError::EpubParse("OPF has no manifest".to_string()));
        }
        if !saw_spine {
            return Err(CoverError::EpubParse("OPF has no spine".to_string()));
        }
        package.ids = collect_ids(opf)
            .ok_or_else(|| CoverError::EpubParse("Malformed OPF".to_string()))?;
        Ok(package)
    }

    pub fn is_epub3(&self) -> bool {
        self.version.trim_start().starts_with('3')
    }

    pub fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// The NCX named by the spine's `toc` attribute, else any NCX in the manifest.
    pub fn ncx(&self) -> Option<&ManifestItem> {
        self.spine_toc
            .as_deref()
            .and_then(|id| self.item(id))
            .or_else(|| self.items.iter().find(|i| i.media_type == mime::NCX))
    }

    /// The EPUB 3 navigation document.
    pub fn nav(&self) -> Option<&ManifestItem> {
        self.items.iter().find(|i| i.has_property("nav"))
    }

    pub fn has_cover_image_property(&self) -> bool {
        self.items.iter().any(|i| i.has_property("cover-image"))
    }
}

/// Archive path of the package document named by `META-INF/container.xml`.
pub(crate) fn locate_opf(entries: &[ArchiveEntry]) -> Result<String> {
    let container = find_entry(entries, CONTAINER_PATH)
        .ok_or_else(|| CoverError::EpubParse(format!("{} is missing", CONTAINER_PATH)))?;
    let xml = std::str::from_utf8(&container.data)
        .map_err(|e| CoverError::EpubParse(format!("{} is not UTF-8: {}", CONTAINER_PATH, e)))?;

    let path = extract_attributes(xml, "rootfile")
        .and_then(|attrs| attrs.get("full-path").cloned())
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| CoverError::EpubParse("No rootfile found in container.xml".to_string()))?;

    Ok(resolve_href("", path.trim()))
}

/// Text of the archive entry at `path`.
pub(crate) fn read_text<'a>(entries: &'a [ArchiveEntry], path: &str) -> Result<&'a str> {
    let entry = find_entry(entries, path)
        .ok_or_else(|| CoverError::EpubParse(format!("{} is missing from the archive", path)))?;
    std::str::from_utf8(&entry.data)
        .map_err(|e| CoverError::EpubParse(format!("{} is not UTF-8: {}", path, e)))
}
