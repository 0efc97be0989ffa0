//! OPF rewrite: registers the cover items and puts the cover page first in
//! the spine.
//!
//! The package document is streamed event by event and written back as read;
//! only the new elements are injected. Everything else in the file (comments,
//! attribute order, vendor metadata) survives unchanged.

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use cover_core::error::{CoverError, Result};
use cover_utils::mime;
use cover_utils::xml::{local_name, XmlBuilder};

use crate::package::Package;
use crate::plan::CoverPlan;

/// Returns the rewritten package document at `opf_path`.
pub(crate) fn rewrite_opf(
    opf: &str,
    opf_path: &str,
    package: &Package,
    plan: &CoverPlan,
    image_mime: &str,
) -> Result<String> {
    let mut reader = Reader::from_str(opf);
    let mut writer = Writer::new(Vec::with_capacity(opf.len() + 512));

    let mut metadata_pending = !package.has_cover_meta;
    let mut manifest_pending = true;
    let mut spine_pending = true;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| CoverError::EpubParse(format!("Malformed OPF: {}", e)))?;

        match event {
            Event::Start(e) => {
                let fragment = match local_name(&e).as_str() {
                    "metadata" if metadata_pending => {
                        metadata_pending = false;
                        Some(metadata_fragment(prefix(&e).as_deref(), plan))
                    }
                    "manifest" if manifest_pending => {
                        manifest_pending = false;
                        Some(manifest_fragment(
                            prefix(&e).as_deref(),
                            opf_path,
                            package,
                            plan,
                            image_mime,
                        ))
                    }
                    "spine" if spine_pending => {
                        spine_pending = false;
                        Some(spine_fragment(prefix(&e).as_deref(), plan))
                    }
                    _ => None,
                };
                write(&mut writer, Event::Start(e))?;
                if let Some(fragment) = fragment {
                    inject(&mut writer, &fragment);
                }
            }
            Event::Empty(e) => {
                let fragment = match local_name(&e).as_str() {
                    "metadata" if metadata_pending => {
                        metadata_pending = false;
                        Some(metadata_fragment(prefix(&e).as_deref(), plan))
                    }
                    "manifest" if manifest_pending => {
                        manifest_pending = false;
                        Some(manifest_fragment(
                            prefix(&e).as_deref(),
                            opf_path,
                            package,
                            plan,
                            image_mime,
                        ))
                    }
                    "spine" if spine_pending => {
                        spine_pending = false;
                        Some(spine_fragment(prefix(&e).as_deref(), plan))
                    }
                    _ => None,
                };
                match fragment {
                    // `<spine/>` becomes `<spine>…</spine>` around the new entry.
                    Some(fragment) => {
                        write(&mut writer, Event::Start(e.borrow()))?;
                        inject(&mut writer, &fragment);
                        writer.get_mut().extend_from_slice(b"\n  ");
                        write(&mut writer, Event::End(e.to_end()))?;
                    }
                    None => write(&mut writer, Event::Empty(e))?,
                }
            }
            Event::Eof => break,
            other => write(&mut writer, other)?,
        }
    }

    if manifest_pending || spine_pending {
        return Err(CoverError::EpubParse(
            "OPF manifest or spine could not be located".to_string(),
        ));
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| CoverError::EpubWrite(format!("Rewritten OPF is not UTF-8: {}", e)))
}

fn manifest_fragment(
    prefix: Option<&str>,
    opf_path: &str,
    package: &Package,
    plan: &CoverPlan,
    image_mime: &str,
) -> String {
    let item = qualify(prefix, "item");
    let image_href = plan.image_href_from(opf_path);
    let page_href = plan.page_href_from(opf_path);

    let mut image_attrs = vec![
        ("id", plan.image_id.as_str()),
        ("href", image_href.as_str()),
        ("media-type", image_mime),
    ];
    if package.is_epub3() && !package.has_cover_image_property() {
        image_attrs.push(("properties", "cover-image"));
    }

    let mut builder = XmlBuilder::fragment(2);
    builder.empty_tag(&item, &image_attrs).empty_tag(
        &item,
        &[
            ("id", plan.page_id.as_str()),
            ("href", page_href.as_str()),
            ("media-type", mime::XHTML),
        ],
    );
    builder.build()
}

fn spine_fragment(prefix: Option<&str>, plan: &CoverPlan) -> String {
    let mut builder = XmlBuilder::fragment(2);
    builder.empty_tag(
        &qualify(prefix, "itemref"),
        &[("idref", plan.page_id.as_str())],
    );
    builder.build()
}

fn metadata_fragment(prefix: Option<&str>, plan: &CoverPlan) -> String {
    let mut builder = XmlBuilder::fragment(2);
    builder.empty_tag(
        &qualify(prefix, "meta"),
        &[("name", "cover"), ("content", plan.image_id.as_str())],
    );
    builder.build()
}

fn prefix(e: &BytesStart<'_>) -> Option<String> {
    e.name()
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned())
}

fn qualify(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    }
}

/// Append `fragment` on fresh lines right after the element just written.
pub(crate) fn inject(writer: &mut Writer<Vec<u8>>, fragment: &str) {
    let out = writer.get_mut();
    out.push(b'\n');
    out.extend_from_slice(fragment.trim_end().as_bytes());
}

pub(crate) fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| CoverError::EpubWrite(format!("XML write failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cover_core::asset::CoverFormat;

    fn plan_for(opf: &str) -> (Package, CoverPlan) {
        let package = Package::parse(opf).unwrap();
        let plan = CoverPlan::new("OEBPS/content.opf", &package, &[], CoverFormat::Jpeg);
        (package, plan)
    }

    #[test]
    fn test_rewrite_epub2() {
        let opf = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata>
    <!-- keep me -->
    <dc:title xmlns:dc="http://purl.org/dc/elements/1.1/">T &amp; U</dc:title>
  </metadata>
  <manifest>
    <item id="c1" href="c1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="c1"/>
  </spine>
</package>"#;
        let (package, plan) = plan_for(opf);
        let out = rewrite_opf(opf, "OEBPS/content.opf", &package, &plan, "image/jpeg").unwrap();

        assert!(out.contains("<!-- keep me -->"));
        assert!(out.contains("T &amp; U"));
        assert!(out.contains(
            r#"<item id="cover-image" href="cover.jpg" media-type="image/jpeg"/>"#
        ));
        assert!(out.contains(
            r#"<item id="cover-page" href="cover.xhtml" media-type="application/xhtml+xml"/>"#
        ));
        assert!(out.contains(r#"<meta name="cover" content="cover-image"/>"#));
        assert!(!out.contains("properties"));

        let reparsed = Package::parse(&out).unwrap();
        assert_eq!(reparsed.spine, vec!["cover-page", "c1"]);
        assert_eq!(reparsed.spine_toc.as_deref(), Some("ncx"));
    }

    #[test]
    fn test_rewrite_epub3_adds_cover_property() {
        let opf = r#"<package version="3.0"><metadata/><manifest><item id="c1" href="c1.xhtml" media-type="application/xhtml+xml"/></manifest><spine><itemref idref="c1"/></spine></package>"#;
        let (package, plan) = plan_for(opf);
        let out = rewrite_opf(opf, "OEBPS/content.opf", &package, &plan, "image/jpeg").unwrap();
        let reparsed = Package::parse(&out).unwrap();
        assert!(reparsed.item("cover-image").unwrap().has_property("cover-image"));
        assert!(reparsed.has_cover_meta);
    }

    #[test]
    fn test_empty_spine_is_expanded() {
        let opf = r#"<package version="2.0"><metadata/><manifest/><spine/></package>"#;
        let (package, plan) = plan_for(opf);
        let out = rewrite_opf(opf, "OEBPS/content.opf", &package, &plan, "image/png").unwrap();
        let reparsed = Package::parse(&out).unwrap();
        assert_eq!(reparsed.spine, vec!["cover-page"]);
        assert_eq!(reparsed.items.len(), 2);
    }

    #[test]
    fn test_prefixed_package() {
        let opf = r#"<opf:package xmlns:opf="http://www.idpf.org/2007/opf" version="2.0"><opf:metadata/><opf:manifest><opf:item id="a" href="a.xhtml" media-type="application/xhtml+xml"/></opf:manifest><opf:spine><opf:itemref idref="a"/></opf:spine></opf:package>"#;
        let (package, plan) = plan_for(opf);
        let out = rewrite_opf(opf, "OEBPS/content.opf", &package, &plan, "image/jpeg").unwrap();
        assert!(out.contains(r#"<opf:itemref idref="cover-page"/>"#));
        assert!(out.contains(r#"<opf:item id="cover-page""#));
    }

    #[test]
    fn test_existing_cover_meta_kept() {
        let opf = r#"<package version="2.0"><metadata><meta name="cover" content="old"/></metadata><manifest/><spine/></package>"#;
        let (package, plan) = plan_for(opf);
        let out = rewrite_opf(opf, "OEBPS/content.opf", &package, &plan, "image/jpeg").unwrap();
        assert_eq!(out.matches(r#"name="cover""#).count(), 1);
        assert!(out.contains(r#"content="old""#));
    }
}
