//! Href arithmetic for paths inside an EPUB container.
//!
//! Archive paths always use `/` and are relative to the archive root.
//! Hrefs inside OPF, NCX and nav documents are relative to the directory of
//! the document that contains them.

/// Directory part of an archive path, including the trailing slash
/// (`"OEBPS/content.opf"` → `"OEBPS/"`, `"content.opf"` → `""`).
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..=i]).unwrap_or("")
}

/// Resolve `href` (relative to `base_dir`) to a normalized archive path.
/// Fragments and `..` segments are handled; percent-escapes are decoded.
pub fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let joined = format!("{}{}", base_dir, percent_decode(href));
    let mut parts: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Href that reaches archive path `target` from a document at archive path `from_doc`.
pub fn relative_href(from_doc: &str, target: &str) -> String {
    let from_dirs: Vec<&str> = parent_dir(from_doc)
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let target_parts: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
    let (target_dirs, file) = match target_parts.split_last() {
        Some((file, dirs)) => (dirs, *file),
        None => return String::new(),
    };

    let common = from_dirs
        .iter()
        .zip(target_dirs.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<&str> = Vec::new();
    for _ in common..from_dirs.len() {
        segments.push("..");
    }
    segments.extend_from_slice(&target_dirs[common..]);
    segments.push(file);
    segments.join("/")
}

/// Simple percent-decoding for EPUB hrefs.
pub fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("OEBPS/content.opf"), "OEBPS/");
        assert_eq!(parent_dir("content.opf"), "");
        assert_eq!(parent_dir("a/b/c.xhtml"), "a/b/");
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("OEBPS/", "text/ch1.xhtml"), "OEBPS/text/ch1.xhtml");
        assert_eq!(resolve_href("OEBPS/text/", "../images/a.png"), "OEBPS/images/a.png");
        assert_eq!(resolve_href("", "toc.ncx#top"), "toc.ncx");
        assert_eq!(resolve_href("OEBPS/", "my%20file.xhtml"), "OEBPS/my file.xhtml");
    }

    #[test]
    fn test_relative_href() {
        assert_eq!(relative_href("OEBPS/toc.ncx", "OEBPS/cover.xhtml"), "cover.xhtml");
        assert_eq!(
            relative_href("OEBPS/nav/nav.xhtml", "OEBPS/cover.xhtml"),
            "../cover.xhtml"
        );
        assert_eq!(
            relative_href("toc.ncx", "OEBPS/text/cover.xhtml"),
            "OEBPS/text/cover.xhtml"
        );
        assert_eq!(relative_href("a/b/nav.xhtml", "c/cover.xhtml"), "../../c/cover.xhtml");
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("hello%20world"), "hello world");
        assert_eq!(percent_decode("caf%C3%A9"), "café");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("normal"), "normal");
    }
}
