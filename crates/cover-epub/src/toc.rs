//! Table-of-contents updates for the NCX (EPUB 2) and the navigation
//! document (EPUB 3).
//!
//! Both rewrites stream the document and inject one entry at the front of
//! the table of contents. An error here means the document was left alone.

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use cover_core::error::{CoverError, Result};
use cover_utils::xml::{attr, attr_local, collect_ids, local_name, XmlBuilder};

use crate::opf::{inject, write};

/// Prepend a `navPoint` for the cover to the `navMap` and shift every
/// existing `playOrder` up by one.
pub(crate) fn rewrite_ncx(ncx: &str, href: &str, label: &str) -> Result<String> {
    let ids = collect_ids(ncx)
        .ok_or_else(|| CoverError::EpubParse("Malformed NCX".to_string()))?;
    let nav_point_id = (0..)
        .map(|n| match n {
            0 => "navpoint-cover".to_string(),
            n => format!("navpoint-cover-{}", n),
        })
        .find(|id| !ids.contains(id))
        .unwrap_or_else(|| "navpoint-cover".to_string());

    let mut reader = Reader::from_str(ncx);
    let mut writer = Writer::new(Vec::with_capacity(ncx.len() + 256));
    let mut inserted = false;
    let mut shifted = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| CoverError::EpubParse(format!("Malformed NCX: {}", e)))?;

        match event {
            Event::Start(e) => {
                let is_nav_map = !inserted && local_name(&e) == "navMap";
                match shift_play_order(&e) {
                    Some(moved) => {
                        shifted += 1;
                        write(&mut writer, Event::Start(moved))?;
                    }
                    None => write(&mut writer, Event::Start(e))?,
                }
                if is_nav_map {
                    inject(&mut writer, &nav_point(&nav_point_id, href, label));
                    inserted = true;
                }
            }
            Event::Empty(e) => {
                if !inserted && local_name(&e) == "navMap" {
                    write(&mut writer, Event::Start(e.borrow()))?;
                    inject(&mut writer, &nav_point(&nav_point_id, href, label));
                    writer.get_mut().extend_from_slice(b"\n  ");
                    write(&mut writer, Event::End(e.to_end()))?;
                    inserted = true;
                    continue;
                }
                match shift_play_order(&e) {
                    Some(moved) => {
                        shifted += 1;
                        write(&mut writer, Event::Empty(moved))?;
                    }
                    None => write(&mut writer, Event::Empty(e))?,
                }
            }
            Event::Eof => break,
            other => write(&mut writer, other)?,
        }
    }

    if !inserted {
        return Err(CoverError::EpubParse("NCX has no navMap".to_string()));
    }
    log::debug!("NCX: cover navPoint added, {} playOrder values shifted", shifted);

    String::from_utf8(writer.into_inner())
        .map_err(|e| CoverError::EpubWrite(format!("Rewritten NCX is not UTF-8: {}", e)))
}

fn nav_point(id: &str, href: &str, label: &str) -> String {
    let mut builder = XmlBuilder::fragment(2);
    builder
        .open_tag("navPoint", &[("id", id), ("playOrder", "1")])
        .open_tag("navLabel", &[])
        .text_element("text", label, &[])
        .close_tag("navLabel")
        .empty_tag("content", &[("src", href)])
        .close_tag("navPoint");
    builder.build()
}

/// Copy of `e` with a numeric `playOrder` incremented, or `None` when it
/// has none.
fn shift_play_order(e: &BytesStart<'_>) -> Option<BytesStart<'static>> {
    let current: u64 = attr(e, "playOrder")?.trim().parse().ok()?;
    let next = (current + 1).to_string();

    let mut moved = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for a in e.attributes().flatten() {
        if a.key.as_ref() == b"playOrder" {
            moved.push_attribute(("playOrder", next.as_str()));
        } else {
            moved.push_attribute(a);
        }
    }
    Some(moved)
}

/// Prepend a list item for the cover to the `toc` nav's top-level list.
/// Other navs (landmarks, page-list) are left alone.
pub(crate) fn rewrite_nav(nav: &str, href: &str, label: &str) -> Result<String> {
    let mut reader = Reader::from_str(nav);
    let mut writer = Writer::new(Vec::with_capacity(nav.len() + 128));
    let mut in_toc_nav = false;
    let mut inserted = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| CoverError::EpubParse(format!("Malformed navigation document: {}", e)))?;

        match event {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "nav" && is_toc_nav(&e) {
                    in_toc_nav = true;
                }
                let is_list = in_toc_nav && !inserted && name == "ol";
                write(&mut writer, Event::Start(e))?;
                if is_list {
                    inject(&mut writer, &list_item(href, label));
                    inserted = true;
                }
            }
            Event::Empty(e) if in_toc_nav && !inserted && local_name(&e) == "ol" => {
                write(&mut writer, Event::Start(e.borrow()))?;
                inject(&mut writer, &list_item(href, label));
                writer.get_mut().push(b'\n');
                write(&mut writer, Event::End(e.to_end()))?;
                inserted = true;
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"nav" {
                    in_toc_nav = false;
                }
                write(&mut writer, Event::End(e))?;
            }
            Event::Eof => break,
            other => write(&mut writer, other)?,
        }
    }

    if !inserted {
        return Err(CoverError::EpubParse(
            "navigation document has no toc list".to_string(),
        ));
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| CoverError::EpubWrite(format!("Rewritten nav is not UTF-8: {}", e)))
}

fn is_toc_nav(e: &BytesStart<'_>) -> bool {
    attr_local(e, "type").is_some_and(|t| t.split_whitespace().any(|token| token == "toc"))
}

fn list_item(href: &str, label: &str) -> String {
    let mut builder = XmlBuilder::fragment(0);
    builder
        .open_tag("li", &[])
        .text_element("a", label, &[("href", href)])
        .close_tag("li");
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="x"/></head>
  <docTitle><text>Book</text></docTitle>
  <navMap>
    <navPoint id="np1" playOrder="1">
      <navLabel><text>One</text></navLabel>
      <content src="text/c1.xhtml"/>
      <navPoint id="np2" playOrder="2">
        <navLabel><text>One.A</text></navLabel>
        <content src="text/c1.xhtml#a"/>
      </navPoint>
    </navPoint>
    <navPoint id="np3" playOrder="3">
      <navLabel><text>Two</text></navLabel>
      <content src="text/c2.xhtml"/>
    </navPoint>
  </navMap>
  <pageList>
    <pageTarget id="p1" type="normal" value="1" playOrder="4"><navLabel><text>1</text></navLabel><content src="text/c1.xhtml#p1"/></pageTarget>
  </pageList>
</ncx>"#;

    fn play_orders(xml: &str) -> Vec<(String, u64)> {
        let mut reader = Reader::from_str(xml);
        let mut out = Vec::new();
        loop {
            match reader.read_event().unwrap() {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    if let Some(order) = attr(e, "playOrder") {
                        out.push((attr(e, "id").unwrap(), order.parse().unwrap()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        out
    }

    #[test]
    fn test_ncx_cover_first_and_orders_shifted() {
        let out = rewrite_ncx(NCX, "cover.xhtml", "Cover").unwrap();
        assert_eq!(
            play_orders(&out),
            vec![
                ("navpoint-cover".to_string(), 1),
                ("np1".to_string(), 2),
                ("np2".to_string(), 3),
                ("np3".to_string(), 4),
                ("p1".to_string(), 5),
            ]
        );
        assert!(out.contains(r#"<content src="cover.xhtml"/>"#));
        assert!(out.contains("<text>Cover</text>"));
        assert!(out.contains(r#"<content src="text/c1.xhtml#a"/>"#));
    }

    #[test]
    fn test_ncx_navpoint_id_is_unique() {
        let ncx = NCX.replace(r#"id="np3""#, r#"id="navpoint-cover""#);
        let out = rewrite_ncx(&ncx, "cover.xhtml", "Cover").unwrap();
        assert!(out.contains(r#"id="navpoint-cover-1""#));
    }

    #[test]
    fn test_ncx_empty_nav_map() {
        let ncx = r#"<ncx><navMap/></ncx>"#;
        let out = rewrite_ncx(ncx, "c.xhtml", "Cover").unwrap();
        assert_eq!(play_orders(&out), vec![("navpoint-cover".to_string(), 1)]);
    }

    #[test]
    fn test_ncx_without_nav_map_is_an_error() {
        assert!(rewrite_ncx("<ncx><head/></ncx>", "c.xhtml", "Cover").is_err());
        assert!(rewrite_ncx("<ncx><navMap></ncx>", "c.xhtml", "Cover").is_err());
    }

    const NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Nav</title></head>
<body>
  <nav epub:type="landmarks"><ol><li><a epub:type="bodymatter" href="../text/c1.xhtml">Start</a></li></ol></nav>
  <nav epub:type="toc" id="toc">
    <h1>Contents</h1>
    <ol>
      <li><a href="../text/c1.xhtml">One</a>
        <ol><li><a href="../text/c1.xhtml#a">One.A</a></li></ol>
      </li>
    </ol>
  </nav>
</body>
</html>"#;

    #[test]
    fn test_nav_cover_is_first_toc_entry() {
        let out = rewrite_nav(NAV, "../cover.xhtml", "Cover").unwrap();
        let toc_start = out.find(r#"epub:type="toc""#).unwrap();
        let cover = out.find(r#"<a href="../cover.xhtml">Cover</a>"#).unwrap();
        let first_chapter = out.find(r#"<a href="../text/c1.xhtml">One</a>"#).unwrap();
        assert!(toc_start < cover && cover < first_chapter);
        assert_eq!(out.matches("../cover.xhtml").count(), 1);
        assert!(out.contains("<!DOCTYPE html>"));
    }

    #[test]
    fn test_nav_without_toc_is_an_error() {
        let nav = r#"<html><body><nav epub:type="landmarks"><ol/></nav></body></html>"#;
        assert!(rewrite_nav(nav, "cover.xhtml", "Cover").is_err());
    }

    #[test]
    fn test_nav_label_is_escaped() {
        let nav = r#"<html><body><nav epub:type="toc"><ol/></nav></body></html>"#;
        let out = rewrite_nav(nav, "cover.xhtml", "Cover & Title").unwrap();
        assert!(out.contains("Cover &amp; Title"));
    }
}
