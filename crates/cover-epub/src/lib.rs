//! EPUB cover inserter: adds the cover image and a wrapper page, and makes
//! that page the first spine and table-of-contents entry.
//!
//! The book is edited in place rather than rebuilt: untouched entries are
//! copied byte for byte, and the package and TOC documents are streamed
//! through quick-xml with the new elements injected.

mod cover_page;
mod opf;
mod package;
mod plan;
mod toc;
mod writer;

use std::collections::HashMap;

use log::{info, warn};

use cover_core::asset::CoverAsset;
use cover_core::document::DocumentFormat;
use cover_core::error::{CoverError, Result};
use cover_core::pipeline::{Stage, StageTracker};
use cover_core::plugin::CoverInserter;
use cover_utils::archive::{read_entries, ArchiveEntry};
use cover_utils::mime;
use cover_utils::path::{parent_dir, resolve_href};

use crate::package::{locate_opf, read_text, Package};
use crate::plan::CoverPlan;
use crate::writer::NewEntry;

pub struct EpubCoverInserter {
    title: String,
}

impl EpubCoverInserter {
    /// `title` labels the cover page and its table-of-contents entry.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Insert `cover` at the front of the EPUB in `source`.
    pub fn insert_cover(&self, source: &[u8], cover: &CoverAsset) -> Result<Vec<u8>> {
        self.insert(source, cover, &mut StageTracker::new())
    }

    /// Add the cover entry to the NCX and nav documents, whichever exist.
    /// A TOC that cannot be updated is left as it was.
    fn update_tocs(
        &self,
        entries: &[ArchiveEntry],
        opf_path: &str,
        package: &Package,
        plan: &CoverPlan,
        replaced: &mut HashMap<String, Vec<u8>>,
    ) {
        let opf_dir = parent_dir(opf_path);

        match package.ncx() {
            Some(item) => {
                let path = resolve_href(opf_dir, &item.href);
                let result = read_text(entries, &path).and_then(|ncx| {
                    toc::rewrite_ncx(ncx, &plan.page_href_from(&path), &self.title)
                });
                match result {
                    Ok(ncx) => {
                        replaced.insert(path, ncx.into_bytes());
                    }
                    Err(e) => warn!("Skipping NCX update for {}: {}", path, e),
                }
            }
            None => log::debug!("No NCX in package"),
        }

        if let Some(item) = package.nav() {
            let path = resolve_href(opf_dir, &item.href);
            let result = read_text(entries, &path).and_then(|nav| {
                toc::rewrite_nav(nav, &plan.page_href_from(&path), &self.title)
            });
            match result {
                Ok(nav) => {
                    replaced.insert(path, nav.into_bytes());
                }
                Err(e) => warn!("Skipping navigation document update for {}: {}", path, e),
            }
        }
    }
}

impl Default for EpubCoverInserter {
    fn default() -> Self {
        Self::new("Cover")
    }
}

impl CoverInserter for EpubCoverInserter {
    fn name(&self) -> &str {
        "EPUB Cover"
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Epub
    }

    fn insert(
        &self,
        source: &[u8],
        cover: &CoverAsset,
        stages: &mut StageTracker<'_>,
    ) -> Result<Vec<u8>> {
        stages.enter(Stage::ParsingSource);
        if !DocumentFormat::Epub.matches_signature(source) {
            return Err(CoverError::EpubParse("not a ZIP container".to_string()));
        }
        let entries = read_entries(source)
            .map_err(|e| CoverError::EpubParse(format!("Invalid ZIP: {}", e)))?;
        let opf_path = locate_opf(&entries)?;
        let opf = read_text(&entries, &opf_path)?;
        let package = Package::parse(opf)?;
        info!(
            "EPUB {} package {}: {} manifest items, {} spine items",
            if package.is_epub3() { "3" } else { "2" },
            opf_path,
            package.items.len(),
            package.spine.len()
        );

        stages.enter(Stage::BuildingCover);
        let plan = CoverPlan::new(&opf_path, &package, &entries, cover.format());
        let page = cover_page::cover_xhtml(
            &self.title,
            &plan.image_href_from(&plan.page_path),
            cover,
            package.is_epub3(),
        );

        stages.enter(Stage::Splicing);
        let mut replaced = HashMap::new();
        let new_opf = opf::rewrite_opf(opf, &opf_path, &package, &plan, cover.mime_type())?;
        replaced.insert(opf_path.clone(), new_opf.into_bytes());
        self.update_tocs(&entries, &opf_path, &package, &plan, &mut replaced);

        stages.enter(Stage::Serializing);
        let added = [
            NewEntry {
                path: plan.image_path.clone(),
                data: cover.bytes().to_vec(),
                media_type: cover.mime_type(),
            },
            NewEntry {
                path: plan.page_path.clone(),
                data: page.into_bytes(),
                media_type: mime::XHTML,
            },
        ];
        writer::write_archive(&entries, &replaced, &added)
    }
}
