//! Renders the cover image onto a single US Letter page with printpdf.

use cover_core::asset::CoverAsset;
use cover_core::error::{CoverError, Result};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use printpdf::*;

/// US Letter in points.
pub const PAGE_WIDTH_PT: f32 = 612.0;
pub const PAGE_HEIGHT_PT: f32 = 792.0;

/// US Letter in mm, as printpdf wants it.
const PAGE_W: Mm = Mm(215.9);
const PAGE_H: Mm = Mm(279.4);

/// At 72 dpi one image pixel is one point before scaling.
const IMAGE_DPI: f32 = 72.0;

/// Resource name the cover image is drawn under.
const COVER_XOBJECT: &[u8] = b"Cover";

/// Page-tree levels searched for inherited `/Resources`.
const MAX_TREE_DEPTH: usize = 32;

/// Where the cover image lands on the page, in points from the bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverPlacement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CoverPlacement {
    /// Largest aspect-preserving rectangle that fits the page, centered.
    pub fn fit(image_width: u32, image_height: u32, page_width: f32, page_height: f32) -> Self {
        let iw = image_width.max(1) as f32;
        let ih = image_height.max(1) as f32;
        let scale = (page_width / iw).min(page_height / ih);
        // f32 rounding can push the bound side a hair past the page.
        let width = (iw * scale).min(page_width);
        let height = (ih * scale).min(page_height);
        Self {
            x: ((page_width - width) / 2.0).max(0.0),
            y: ((page_height - height) / 2.0).max(0.0),
            width,
            height,
        }
    }

    /// Placement of `cover` on a US Letter page.
    pub fn for_letter(cover: &CoverAsset) -> Self {
        Self::fit(cover.width(), cover.height(), PAGE_WIDTH_PT, PAGE_HEIGHT_PT)
    }
}

/// Build a one-page PDF holding only the cover, as bytes.
pub fn build_cover_page(cover: &CoverAsset) -> Result<Vec<u8>> {
    let mut warnings = Vec::new();
    let image = RawImage::decode_from_bytes(cover.bytes(), &mut warnings)
        .map_err(|e| CoverError::PdfWrite(format!("Cover decode: {}", e)))?;

    let placement = CoverPlacement::for_letter(cover);
    let scale_x = placement.width / image.width as f32;
    let scale_y = placement.height / image.height as f32;

    let mut doc = PdfDocument::new("Cover");
    let image_id = doc.add_image(&image);

    let ops = vec![Op::UseXobject {
        id: image_id,
        transform: XObjectTransform {
            translate_x: Some(Pt(placement.x)),
            translate_y: Some(Pt(placement.y)),
            scale_x: Some(scale_x),
            scale_y: Some(scale_y),
            dpi: Some(IMAGE_DPI),
            ..Default::default()
        },
    }];

    let page = PdfPage::new(PAGE_W, PAGE_H, ops);
    let pdf_bytes = doc
        .with_pages(vec![page])
        .save(&PdfSaveOptions::default(), &mut warnings);

    if pdf_bytes.is_empty() {
        return Err(CoverError::PdfWrite("cover page rendered to zero bytes".to_string()));
    }
    log::debug!(
        "Cover page built: image {}x{} at ({:.1}, {:.1}) size {:.1}x{:.1} pt",
        cover.width(),
        cover.height(),
        placement.x,
        placement.y,
        placement.width,
        placement.height
    );
    Ok(pdf_bytes)
}

/// Redraw the single page of a rendered cover at exactly `placement`.
///
/// printpdf names image XObjects randomly and derives the `cm` matrix from
/// a dpi round trip. This replaces the page content with one `cm` taken
/// straight from `placement` and a fixed `/Cover` resource name, so the
/// same asset always yields the same page.
pub(crate) fn pin_placement(doc: &mut Document, placement: CoverPlacement) -> Result<()> {
    let write_err = |e: lopdf::Error| CoverError::PdfWrite(format!("Rendered cover: {}", e));

    let page_id = doc
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| CoverError::PdfWrite("rendered cover has no page".to_string()))?;
    let image = find_image(doc, page_id)
        .ok_or_else(|| CoverError::PdfWrite("rendered cover has no image".to_string()))?;

    let name = || Object::Name(COVER_XOBJECT.to_vec());
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(placement.width),
                    Object::Real(0.0),
                    Object::Real(0.0),
                    Object::Real(placement.height),
                    Object::Real(placement.x),
                    Object::Real(placement.y),
                ],
            ),
            Operation::new("Do", vec![name()]),
            Operation::new("Q", vec![]),
        ],
    };
    let data = content.encode().map_err(write_err)?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, data));

    let mut xobjects = Dictionary::new();
    xobjects.set(COVER_XOBJECT.to_vec(), image);

    let page = doc.get_dictionary_mut(page_id).map_err(write_err)?;
    page.set("Contents", content_id);
    page.set("Resources", dictionary! { "XObject" => xobjects });
    Ok(())
}

/// The first image XObject visible to `page_id`, looking up the page tree
/// for inherited resources.
fn find_image(doc: &Document, page_id: lopdf::ObjectId) -> Option<Object> {
    let resolve = |obj: &Object| -> Option<Dictionary> {
        match obj {
            Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
            Object::Dictionary(d) => Some(d.clone()),
            _ => None,
        }
    };

    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Some(xobjects) = node
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve(r))
            .and_then(|r| r.get(b"XObject").ok().and_then(|x| resolve(x)))
        {
            if let Some((_, image)) = xobjects.iter().next() {
                return Some(image.clone());
            }
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}
