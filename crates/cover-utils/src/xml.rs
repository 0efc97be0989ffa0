//! XML parsing and building helpers using quick-xml.

use std::collections::{HashMap, HashSet};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Extract attributes (keyed by local name) from the first occurrence of a tag.
pub fn extract_attributes(xml: &str, tag_name: &str) -> Option<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local_name == tag_name {
                    let mut attrs = HashMap::new();
                    for attr in e.attributes().flatten() {
                        let key =
                            String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
                        let value = attr
                            .unescape_value()
                            .map(|v| v.into_owned())
                            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
                        attrs.insert(key, value);
                    }
                    return Some(attrs);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }
    None
}

/// Value of the attribute whose qualified name is exactly `name`
/// (e.g. `"id"`, `"epub:type"`).
pub fn attr(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name.as_bytes())
        .map(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).to_string())
        })
}

/// Value of the first attribute whose local name is `local`, ignoring any prefix.
pub fn attr_local(e: &BytesStart<'_>, local: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local.as_bytes())
        .map(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).to_string())
        })
}

/// Local name of an element as an owned string.
pub fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

/// Every `id` attribute value in a document. Returns `None` if the
/// document is not well-formed.
pub fn collect_ids(xml: &str) -> Option<HashSet<String>> {
    let mut reader = Reader::from_str(xml);
    let mut ids = HashSet::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if let Some(id) = attr(e, "id") {
                    ids.insert(id);
                }
            }
            Ok(Event::Eof) => return Some(ids),
            Err(_) => return None,
            _ => {}
        }
    }
}

/// Simple XML builder for generating OPF, NCX, and XHTML snippets.
pub struct XmlBuilder {
    content: String,
    indent_level: usize,
}

impl XmlBuilder {
    /// Start a standalone document with an XML declaration.
    pub fn new() -> Self {
        Self {
            content: String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"),
            indent_level: 0,
        }
    }

    /// Start a fragment meant to be spliced into an existing document,
    /// indented to `indent_level`.
    pub fn fragment(indent_level: usize) -> Self {
        Self {
            content: String::new(),
            indent_level,
        }
    }

    pub fn open_tag(&mut self, name: &str, attrs: &[(&str, &str)]) -> &mut Self {
        self.indent();
        self.content.push('<');
        self.content.push_str(name);
        self.push_attrs(attrs);
        self.content.push_str(">\n");
        self.indent_level += 1;
        self
    }

    pub fn close_tag(&mut self, name: &str) -> &mut Self {
        self.indent_level = self.indent_level.saturating_sub(1);
        self.indent();
        self.content.push_str("</");
        self.content.push_str(name);
        self.content.push_str(">\n");
        self
    }

    pub fn empty_tag(&mut self, name: &str, attrs: &[(&str, &str)]) -> &mut Self {
        self.indent();
        self.content.push('<');
        self.content.push_str(name);
        self.push_attrs(attrs);
        self.content.push_str("/>\n");
        self
    }

    pub fn text_element(&mut self, name: &str, text: &str, attrs: &[(&str, &str)]) -> &mut Self {
        self.indent();
        self.content.push('<');
        self.content.push_str(name);
        self.push_attrs(attrs);
        self.content.push('>');
        self.content.push_str(&escape_xml_text(text));
        self.content.push_str("</");
        self.content.push_str(name);
        self.content.push_str(">\n");
        self
    }

    pub fn build(self) -> String {
        self.content
    }

    fn push_attrs(&mut self, attrs: &[(&str, &str)]) {
        for (key, value) in attrs {
            self.content.push(' ');
            self.content.push_str(key);
            self.content.push_str("=\"");
            self.content.push_str(&escape_xml_attr(value));
            self.content.push('"');
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.indent_level {
            self.content.push_str("  ");
        }
    }
}

impl Default for XmlBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// XHTML 1.1 DOCTYPE for EPUB 2 compliance.
pub const XHTML11_DOCTYPE: &str =
    "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\" \"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd\">";

/// HTML5 DOCTYPE used by EPUB 3 content documents.
pub const HTML5_DOCTYPE: &str = "<!DOCTYPE html>";

/// XML declaration for XHTML files.
pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

/// Build a complete XHTML content document.
///
/// `style` is inlined in a `<style>` element when given. `epub3` selects the
/// HTML5 doctype instead of XHTML 1.1.
pub fn xhtml_document(title: &str, style: Option<&str>, body: &str, epub3: bool) -> String {
    let mut s = String::with_capacity(512 + body.len());
    s.push_str(XML_DECLARATION);
    s.push('\n');
    s.push_str(if epub3 { HTML5_DOCTYPE } else { XHTML11_DOCTYPE });
    s.push('\n');
    s.push_str("<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head>\n  <title>");
    s.push_str(&escape_xml_text(title));
    s.push_str("</title>\n");
    if let Some(css) = style {
        s.push_str("  <style type=\"text/css\">\n");
        s.push_str(css);
        s.push_str("\n  </style>\n");
    }
    s.push_str("</head>\n<body>\n");
    s.push_str(body);
    s.push_str("\n</body>\n</html>\n");
    s
}

/// Escape special characters in XML text content.
pub fn escape_xml_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape special characters in XML attribute values.
pub fn escape_xml_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
