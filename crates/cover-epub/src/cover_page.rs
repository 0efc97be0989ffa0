//! XHTML wrapper page that shows the cover image on its own.

use cover_core::asset::CoverAsset;
use cover_utils::xml::{escape_xml_attr, xhtml_document};

/// Fills the viewport without scrolling; the image keeps its aspect ratio.
pub(crate) const COVER_STYLE: &str = "    html, body { margin: 0; padding: 0; height: 100%; overflow: hidden; }
    div.cover { display: flex; align-items: center; justify-content: center; width: 100%; height: 100%; text-align: center; }
    div.cover img { max-width: 100%; max-height: 100%; width: auto; height: auto; }";

/// The cover page document. `image_href` is relative to the page itself.
pub(crate) fn cover_xhtml(title: &str, image_href: &str, cover: &CoverAsset, epub3: bool) -> String {
    let body = format!(
        "  <div class=\"cover\">\n    <img src=\"{}\" alt=\"{}\" width=\"{}\" height=\"{}\"/>\n  </div>",
        escape_xml_attr(image_href),
        escape_xml_attr(title),
        cover.width(),
        cover.height()
    );
    xhtml_document(title, Some(COVER_STYLE), &body, epub3)
}
