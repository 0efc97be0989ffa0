//! PDF cover inserter: prepends a full-page cover image to a PDF.
//!
//! The cover page is rendered with printpdf, then grafted into the parsed
//! source with lopdf so the original pages are carried over as-is.

mod cover_page;
mod splice;

use lopdf::Document;

use cover_core::asset::CoverAsset;
use cover_core::document::DocumentFormat;
use cover_core::error::{CoverError, Result};
use cover_core::pipeline::{Stage, StageTracker};
use cover_core::plugin::CoverInserter;

pub use cover_page::{build_cover_page, CoverPlacement, PAGE_HEIGHT_PT, PAGE_WIDTH_PT};

pub struct PdfCoverInserter;

impl CoverInserter for PdfCoverInserter {
    fn name(&self) -> &str {
        "PDF Cover"
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn insert(
        &self,
        source: &[u8],
        cover: &CoverAsset,
        stages: &mut StageTracker<'_>,
    ) -> Result<Vec<u8>> {
        stages.enter(Stage::ParsingSource);
        if !DocumentFormat::Pdf.matches_signature(source) {
            return Err(CoverError::PdfParse("missing %PDF- header".to_string()));
        }
        let mut doc = splice::load_source(source)?;
        log::info!("Source PDF has {} pages", doc.get_pages().len());

        stages.enter(Stage::BuildingCover);
        let cover_bytes = build_cover_page(cover)?;
        let mut cover_doc = Document::load_mem(&cover_bytes)
            .map_err(|e| CoverError::PdfWrite(format!("Rendered cover is unreadable: {}", e)))?;
        cover_page::pin_placement(&mut cover_doc, CoverPlacement::for_letter(cover))?;

        stages.enter(Stage::Splicing);
        splice::prepend_page(&mut doc, cover_doc)?;

        stages.enter(Stage::Serializing);
        let mut out = Vec::with_capacity(source.len() + cover_bytes.len());
        doc.save_to(&mut out)
            .map_err(|e| CoverError::PdfWrite(format!("Failed to write PDF: {}", e)))?;
        Ok(out)
    }
}

impl PdfCoverInserter {
    /// Prepend `cover` to the PDF in `source`.
    pub fn insert_cover(&self, source: &[u8], cover: &CoverAsset) -> Result<Vec<u8>> {
        self.insert(source, cover, &mut StageTracker::new())
    }
}
